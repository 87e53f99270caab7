//! Reason codes and their externally visible states

use serde::{Deserialize, Serialize};
use sq_github::CheckState;
use std::fmt;

/// Why a pull request is (or is not) moving through the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    Unmergeable,
    UndeterminedMergeability,
    NoMerge,
    NoCla,
    NeedsOk,
    NoLgtm,
    Unknown,
    LgtmEarly,
    CiFailure,
    E2eQueued,
    E2eRunning,
    E2eFailed,
    MergeFailed,
    Merged,
}

impl Reason {
    pub const ALL: [Reason; 14] = [
        Reason::Unmergeable,
        Reason::UndeterminedMergeability,
        Reason::NoMerge,
        Reason::NoCla,
        Reason::NeedsOk,
        Reason::NoLgtm,
        Reason::Unknown,
        Reason::LgtmEarly,
        Reason::CiFailure,
        Reason::E2eQueued,
        Reason::E2eRunning,
        Reason::E2eFailed,
        Reason::MergeFailed,
        Reason::Merged,
    ];

    /// State written to the submit queue's own commit status
    pub fn external_state(&self) -> CheckState {
        match self {
            Reason::Merged => CheckState::Success,
            Reason::Unknown => CheckState::Failure,
            Reason::Unmergeable
            | Reason::UndeterminedMergeability
            | Reason::NoMerge
            | Reason::NoCla
            | Reason::NeedsOk
            | Reason::NoLgtm
            | Reason::LgtmEarly
            | Reason::CiFailure
            | Reason::E2eQueued
            | Reason::E2eRunning
            | Reason::E2eFailed
            | Reason::MergeFailed => CheckState::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Unmergeable => "unmergeable",
            Reason::UndeterminedMergeability => "undetermined-mergeability",
            Reason::NoMerge => "no-merge",
            Reason::NoCla => "no-cla",
            Reason::NeedsOk => "needs-ok",
            Reason::NoLgtm => "no-lgtm",
            Reason::Unknown => "unknown",
            Reason::LgtmEarly => "lgtm-early",
            Reason::CiFailure => "ci-failure",
            Reason::E2eQueued => "e2e-queued",
            Reason::E2eRunning => "e2e-running",
            Reason::E2eFailed => "e2e-failed",
            Reason::MergeFailed => "merge-failed",
            Reason::Merged => "merged",
        }
    }

    /// Human-readable status description
    pub fn description(&self) -> &'static str {
        match self {
            Reason::Unmergeable => "PR is unable to be automatically merged. Needs rebase.",
            Reason::UndeterminedMergeability => "Unable to determine if PR is mergeable",
            Reason::NoMerge => "Will not auto merge because do-not-merge label is present",
            Reason::NoCla => "PR does not have cla: yes",
            Reason::NeedsOk => "PR does not have ok-to-merge and author is not whitelisted",
            Reason::NoLgtm => "PR does not have LGTM.",
            Reason::Unknown => "Unknown failure determining LGTM or last modification time",
            Reason::LgtmEarly => "The PR was changed after the LGTM label was added.",
            Reason::CiFailure => "Required Github CI test is not green",
            Reason::E2eQueued => "Queued to run github e2e tests a second time.",
            Reason::E2eRunning => "Running github e2e tests a second time.",
            Reason::E2eFailed => "Second github e2e run failed.",
            Reason::MergeFailed => "Merge was rejected by github; will retry.",
            Reason::Merged => "MERGED!",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
