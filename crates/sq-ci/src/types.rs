//! Build-system result types

use serde::{Deserialize, Serialize};

/// Outcome of one completed build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildResult {
    Success,
    Failure,
}

impl BuildResult {
    /// Map a Jenkins/bucket result string
    ///
    /// Only `SUCCESS` is a success; `FAILURE`, `UNSTABLE`, `ABORTED` and
    /// anything unrecognized count as failure.
    pub fn from_api(result: &str) -> Self {
        if result.eq_ignore_ascii_case("success") {
            BuildResult::Success
        } else {
            BuildResult::Failure
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildResult::Success)
    }
}

/// Last completed build of a CI job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobBuild {
    /// Build number, when the CI reports it
    pub number: Option<u64>,
    pub result: BuildResult,
}

/// Contents of a build's `finished.json` in the artifact bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedResult {
    pub result: BuildResult,
    /// Unix seconds
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_result_from_api() {
        assert_eq!(BuildResult::from_api("SUCCESS"), BuildResult::Success);
        assert_eq!(BuildResult::from_api("success"), BuildResult::Success);
        assert_eq!(BuildResult::from_api("FAILURE"), BuildResult::Failure);
        assert_eq!(BuildResult::from_api("FAILED"), BuildResult::Failure);
        assert_eq!(BuildResult::from_api("UNSTABLE"), BuildResult::Failure);
        assert_eq!(BuildResult::from_api(""), BuildResult::Failure);
    }
}
