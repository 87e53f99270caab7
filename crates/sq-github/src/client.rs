//! GitHub client trait
//!
//! This module defines the `GitHubClient` trait that the submit queue talks
//! to. Every call is scoped to the single repository the client was built
//! for.

use crate::history;
use crate::types::{
    CombinedStatus, Commit, IssueEvent, MergeMethod, MergeResult, NewCommitStatus, PullRequest,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// GitHub API client trait
///
/// Defines the interface for interacting with the repository hosting the
/// pull requests. Implementations can hit the API directly or be test
/// doubles.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow sharing across
/// async tasks and threads.
///
/// # Example
///
/// ```rust,ignore
/// use sq_github::{GitHubClient, PullRequest};
///
/// async fn head_of(client: &dyn GitHubClient, number: u64) -> anyhow::Result<String> {
///     Ok(client.fetch_pull_request(number).await?.head_sha)
/// }
/// ```
#[async_trait]
pub trait GitHubClient: Send + Sync {
    /// Fetch all open pull requests of the repository
    ///
    /// The list endpoint does not compute mergeability, so `mergeable` is
    /// None on the returned entries.
    async fn fetch_open_pull_requests(&self) -> anyhow::Result<Vec<PullRequest>>;

    /// Fetch a single pull request by number, with fresh mergeability
    async fn fetch_pull_request(&self, number: u64) -> anyhow::Result<PullRequest>;

    /// Fetch the commits of a pull request, oldest first
    async fn fetch_commits(&self, number: u64) -> anyhow::Result<Vec<Commit>>;

    /// Fetch the issue event timeline of a pull request, oldest first
    async fn fetch_events(&self, number: u64) -> anyhow::Result<Vec<IssueEvent>>;

    /// Fetch the combined commit status for a SHA
    async fn fetch_combined_status(&self, sha: &str) -> anyhow::Result<CombinedStatus>;

    /// Post an issue comment on a pull request
    async fn post_comment(&self, number: u64, body: &str) -> anyhow::Result<()>;

    /// Create or replace the status for `status.context` on a commit
    async fn set_commit_status(&self, sha: &str, status: &NewCommitStatus) -> anyhow::Result<()>;

    /// Merge a pull request
    ///
    /// # Arguments
    ///
    /// * `number` - Pull request number
    /// * `merge_method` - How to merge (merge commit, squash, or rebase)
    /// * `commit_title` - Optional custom commit title
    async fn merge_pull_request(
        &self,
        number: u64,
        merge_method: MergeMethod,
        commit_title: Option<&str>,
    ) -> anyhow::Result<MergeResult>;

    /// Most recent time `label` was added, from the event timeline
    async fn label_time(&self, number: u64, label: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        let events = self.fetch_events(number).await?;
        Ok(history::label_time(&events, label))
    }

    /// Most recent commit or force push on the pull request
    async fn last_modified_time(&self, number: u64) -> anyhow::Result<Option<DateTime<Utc>>> {
        let commits = self.fetch_commits(number).await?;
        let events = self.fetch_events(number).await?;
        Ok(history::last_modified_time(&commits, &events))
    }

    /// Approval time of `label` and last modification, fetching the event
    /// timeline once
    async fn approval_timeline(
        &self,
        number: u64,
        label: &str,
    ) -> anyhow::Result<history::ApprovalTimeline> {
        let commits = self.fetch_commits(number).await?;
        let events = self.fetch_events(number).await?;
        Ok(history::ApprovalTimeline::new(&commits, &events, label))
    }
}
