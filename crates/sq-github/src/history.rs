//! Timeline helpers derived from commits and issue events

use crate::types::{Commit, IssueEvent, IssueEventKind};
use chrono::{DateTime, Utc};

/// Most recent time `label` was added to the PR
///
/// Returns None if the label was never added according to the timeline.
pub fn label_time(events: &[IssueEvent], label: &str) -> Option<DateTime<Utc>> {
    events
        .iter()
        .filter(|e| e.kind == IssueEventKind::Labeled)
        .filter(|e| e.label.as_deref() == Some(label))
        .map(|e| e.created_at)
        .max()
}

/// Most recent time the code on the PR changed
///
/// Considers commit dates and force pushes of the head branch. Returns None
/// if neither source carries a timestamp.
pub fn last_modified_time(commits: &[Commit], events: &[IssueEvent]) -> Option<DateTime<Utc>> {
    let last_commit = commits.iter().filter_map(|c| c.committed_at).max();
    let last_push = events
        .iter()
        .filter(|e| e.kind == IssueEventKind::HeadRefForcePushed)
        .map(|e| e.created_at)
        .max();
    last_commit.max(last_push)
}

/// Approval and modification times from one timeline snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalTimeline {
    pub approved_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ApprovalTimeline {
    pub fn new(commits: &[Commit], events: &[IssueEvent], label: &str) -> Self {
        Self {
            approved_at: label_time(events, label),
            last_modified: last_modified_time(commits, events),
        }
    }
}
