//! Merge eligibility
//!
//! [`evaluate`] is a pure function over a snapshot of a pull request. The
//! checks run in a fixed order and the first failing one decides the reason.

use crate::labels;
use crate::reason::Reason;
use chrono::{DateTime, Utc};
use sq_github::{CombinedStatus, Mergeability, PullRequest};
use std::collections::HashSet;

/// Everything the gate looks at for one pull request
#[derive(Debug, Clone)]
pub struct GateInput<'a> {
    pub pr: &'a PullRequest,
    /// Most recent addition of the `lgtm` label
    pub approved_at: Option<DateTime<Utc>>,
    /// Most recent commit or force push
    pub last_modified: Option<DateTime<Utc>>,
    pub status: &'a CombinedStatus,
}

/// Operator-controlled inputs to the gate
#[derive(Debug, Clone, Default)]
pub struct GatePolicy {
    pub whitelist: HashSet<String>,
    pub required_contexts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Blocked(Reason),
    /// All checks passed; `e2e_required` is false for `e2e-not-required`
    Eligible { e2e_required: bool },
}

pub fn evaluate(input: &GateInput<'_>, policy: &GatePolicy) -> Verdict {
    let pr = input.pr;

    match pr.mergeability() {
        Mergeability::Unmergeable => return Verdict::Blocked(Reason::Unmergeable),
        Mergeability::Unknown => return Verdict::Blocked(Reason::UndeterminedMergeability),
        Mergeability::Mergeable => {}
    }

    if pr.has_label(labels::DO_NOT_MERGE) {
        return Verdict::Blocked(Reason::NoMerge);
    }

    if !pr.has_label(labels::CLA_YES) {
        return Verdict::Blocked(Reason::NoCla);
    }

    if !policy.whitelist.contains(&pr.author) && !pr.has_label(labels::OK_TO_MERGE) {
        return Verdict::Blocked(Reason::NeedsOk);
    }

    if !pr.has_label(labels::LGTM) {
        return Verdict::Blocked(Reason::NoLgtm);
    }

    let (Some(approved_at), Some(last_modified)) = (input.approved_at, input.last_modified) else {
        return Verdict::Blocked(Reason::Unknown);
    };

    // Ties are stale: the approval must come strictly after the code
    if approved_at <= last_modified {
        return Verdict::Blocked(Reason::LgtmEarly);
    }

    let e2e_required = !pr.has_label(labels::E2E_NOT_REQUIRED);

    if e2e_required && !input.status.is_success(&policy.required_contexts) {
        return Verdict::Blocked(Reason::CiFailure);
    }

    Verdict::Eligible { e2e_required }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, pull_request, status_with};
    use sq_github::CheckState;

    const UNIT: &str = "Jenkins unit/integration";

    fn policy() -> GatePolicy {
        GatePolicy {
            whitelist: ["alice".to_string()].into_iter().collect(),
            required_contexts: vec![UNIT.to_string()],
        }
    }

    fn green() -> CombinedStatus {
        status_with(&[(UNIT, CheckState::Success)])
    }

    fn eligible_pr() -> PullRequest {
        pull_request(1, "alice", &[labels::CLA_YES, labels::LGTM])
    }

    fn eval(pr: &PullRequest, approved: Option<i64>, modified: Option<i64>, status: &CombinedStatus) -> Verdict {
        evaluate(
            &GateInput {
                pr,
                approved_at: approved.map(at),
                last_modified: modified.map(at),
                status,
            },
            &policy(),
        )
    }

    #[test]
    fn test_eligible() {
        let pr = eligible_pr();
        assert_eq!(
            eval(&pr, Some(10), Some(8), &green()),
            Verdict::Eligible { e2e_required: true }
        );
    }

    #[test]
    fn test_unmergeable_wins_over_everything() {
        let mut pr = pull_request(1, "mallory", &[labels::DO_NOT_MERGE]);
        pr.mergeable = Some(false);
        assert_eq!(
            eval(&pr, None, None, &CombinedStatus::default()),
            Verdict::Blocked(Reason::Unmergeable)
        );

        pr.mergeable = None;
        assert_eq!(
            eval(&pr, None, None, &CombinedStatus::default()),
            Verdict::Blocked(Reason::UndeterminedMergeability)
        );
    }

    #[test]
    fn test_do_not_merge_regardless_of_approval_and_ci() {
        let mut pr = eligible_pr();
        pr.labels.push(labels::DO_NOT_MERGE.to_string());
        assert_eq!(eval(&pr, Some(10), Some(8), &green()), Verdict::Blocked(Reason::NoMerge));
    }

    #[test]
    fn test_no_cla() {
        let pr = pull_request(1, "alice", &[labels::LGTM]);
        assert_eq!(eval(&pr, Some(10), Some(8), &green()), Verdict::Blocked(Reason::NoCla));
    }

    #[test]
    fn test_needs_ok_unless_labelled() {
        let mut pr = pull_request(1, "mallory", &[labels::CLA_YES, labels::LGTM]);
        assert_eq!(eval(&pr, Some(10), Some(8), &green()), Verdict::Blocked(Reason::NeedsOk));

        pr.labels.push(labels::OK_TO_MERGE.to_string());
        assert_eq!(
            eval(&pr, Some(10), Some(8), &green()),
            Verdict::Eligible { e2e_required: true }
        );
    }

    #[test]
    fn test_no_lgtm() {
        let pr = pull_request(1, "alice", &[labels::CLA_YES]);
        assert_eq!(eval(&pr, None, Some(8), &green()), Verdict::Blocked(Reason::NoLgtm));
    }

    #[test]
    fn test_unknown_times() {
        let pr = eligible_pr();
        assert_eq!(eval(&pr, None, Some(8), &green()), Verdict::Blocked(Reason::Unknown));
        assert_eq!(eval(&pr, Some(10), None, &green()), Verdict::Blocked(Reason::Unknown));
    }

    #[test]
    fn test_approval_must_be_strictly_after_modification() {
        let pr = eligible_pr();
        for (approved, modified) in [(6, 8), (7, 9), (8, 8)] {
            assert_eq!(
                eval(&pr, Some(approved), Some(modified), &green()),
                Verdict::Blocked(Reason::LgtmEarly),
                "approved at {} modified at {}",
                approved,
                modified
            );
        }
        for (approved, modified) in [(9, 8), (10, 7), (12, 9)] {
            assert_eq!(
                eval(&pr, Some(approved), Some(modified), &green()),
                Verdict::Eligible { e2e_required: true }
            );
        }
    }

    #[test]
    fn test_ci_failure() {
        let pr = eligible_pr();
        for state in [CheckState::Failure, CheckState::Error, CheckState::Pending] {
            let status = status_with(&[(UNIT, state)]);
            assert_eq!(eval(&pr, Some(10), Some(8), &status), Verdict::Blocked(Reason::CiFailure));
        }
        // A context that never reported is not green
        assert_eq!(
            eval(&pr, Some(10), Some(8), &CombinedStatus::default()),
            Verdict::Blocked(Reason::CiFailure)
        );
    }

    #[test]
    fn test_e2e_not_required_bypasses_ci() {
        let mut pr = eligible_pr();
        pr.labels.push(labels::E2E_NOT_REQUIRED.to_string());
        let red = status_with(&[(UNIT, CheckState::Failure)]);
        let verdict = eval(&pr, Some(10), Some(8), &red);
        assert_eq!(verdict, Verdict::Eligible { e2e_required: false });
    }

    #[test]
    fn test_e2e_not_required_does_not_bypass_approval() {
        let mut pr = pull_request(1, "alice", &[labels::CLA_YES, labels::E2E_NOT_REQUIRED]);
        assert_eq!(eval(&pr, None, Some(8), &green()), Verdict::Blocked(Reason::NoLgtm));

        pr.labels.push(labels::LGTM.to_string());
        assert_eq!(eval(&pr, Some(6), Some(8), &green()), Verdict::Blocked(Reason::LgtmEarly));
    }
}
