//! GitHub API data transfer objects
//!
//! These types represent the slice of GitHub data the submit queue reads.
//! They are intentionally separate from the submit-queue domain (reasons,
//! queue entries) to keep this crate a plain collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pull request as seen by the submit queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number (e.g., 123)
    pub number: u64,

    /// PR title
    pub title: String,

    /// Author's GitHub username
    pub author: String,

    /// HEAD commit SHA
    pub head_sha: String,

    /// Base branch name (e.g., "master")
    pub base_branch: String,

    /// Whether the PR is mergeable (None while GitHub is still computing it)
    pub mergeable: Option<bool>,

    /// Whether the PR has already been merged
    pub merged: bool,

    /// Labels currently applied to the PR
    pub labels: Vec<String>,

    /// PR URL for linking from statuses and comments
    pub html_url: String,
}

impl PullRequest {
    /// Whether a label with exactly this name is applied
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l == name)
    }

    /// Mergeability as a closed tri-state
    pub fn mergeability(&self) -> Mergeability {
        match self.mergeable {
            Some(true) => Mergeability::Mergeable,
            Some(false) => Mergeability::Unmergeable,
            None => Mergeability::Unknown,
        }
    }
}

/// GitHub's own answer to "can this PR be merged without conflicts"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mergeability {
    Mergeable,
    Unmergeable,
    /// Not computed yet; GitHub computes it lazily after a fetch
    Unknown,
}

/// A commit on a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Commit SHA
    pub sha: String,

    /// Committer date (None if GitHub omitted it)
    pub committed_at: Option<DateTime<Utc>>,
}

/// An entry of a PR's issue event timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueEvent {
    /// What happened
    pub kind: IssueEventKind,

    /// Who did it
    pub actor: Option<String>,

    /// Label name for label events
    pub label: Option<String>,

    /// When it happened
    pub created_at: DateTime<Utc>,
}

/// Issue event kinds the submit queue distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueEventKind {
    /// A label was added
    Labeled,
    /// A label was removed
    Unlabeled,
    /// The head branch was force pushed
    HeadRefForcePushed,
    /// Any other timeline event
    #[serde(other)]
    Other,
}

impl IssueEventKind {
    /// Map GitHub's `event` field
    pub fn from_api(event: &str) -> Self {
        match event {
            "labeled" => IssueEventKind::Labeled,
            "unlabeled" => IssueEventKind::Unlabeled,
            "head_ref_force_pushed" => IssueEventKind::HeadRefForcePushed,
            _ => IssueEventKind::Other,
        }
    }
}

/// Combined commit status from the Status API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedStatus {
    /// Overall state combining all statuses
    pub state: CheckState,

    /// Individual statuses, one per context
    pub statuses: Vec<CommitStatus>,
}

impl CombinedStatus {
    /// State reported for one context, if any status exists for it
    pub fn context_state(&self, context: &str) -> Option<CheckState> {
        self.statuses
            .iter()
            .find(|s| s.context == context)
            .map(|s| s.state)
    }

    /// Whether every listed context reported success
    ///
    /// A context that has not reported at all counts as not successful.
    pub fn is_success(&self, contexts: &[String]) -> bool {
        contexts
            .iter()
            .all(|c| self.context_state(c) == Some(CheckState::Success))
    }
}

/// State of a commit status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    /// Check passed
    Success,
    /// Check is running or has not reported
    #[default]
    Pending,
    /// Check failed
    Failure,
    /// Check errored
    Error,
}

impl CheckState {
    /// Map GitHub's `state` string
    pub fn from_api(state: &str) -> Self {
        match state.to_lowercase().as_str() {
            "success" => CheckState::Success,
            "failure" => CheckState::Failure,
            "error" => CheckState::Error,
            _ => CheckState::Pending,
        }
    }

    /// Wire form expected by the Status API
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckState::Success => "success",
            CheckState::Pending => "pending",
            CheckState::Failure => "failure",
            CheckState::Error => "error",
        }
    }
}

/// Individual commit status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    /// Status context (e.g., "Jenkins GCE e2e")
    pub context: String,

    /// Current state
    pub state: CheckState,

    /// Description of the status
    pub description: Option<String>,

    /// URL for more details
    pub target_url: Option<String>,
}

/// A status to write onto a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommitStatus {
    /// Status context the submit queue owns
    pub context: String,

    /// Externally visible state
    pub state: CheckState,

    /// Human-readable reason
    pub description: String,

    /// Optional link (e.g., to the queue dashboard)
    pub target_url: Option<String>,
}

/// Merge method for pull requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMethod {
    /// Create a merge commit
    Merge,
    /// Squash all commits into one
    #[default]
    Squash,
    /// Rebase commits onto the base branch
    Rebase,
}

impl MergeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }
}

/// Result of a merge operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    /// Whether the merge was successful
    pub merged: bool,
    /// Commit SHA of the merge commit (if successful)
    pub sha: Option<String>,
    /// Message from the merge operation
    pub message: String,
}
