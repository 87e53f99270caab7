//! GitHub collaborator for the submit queue
//!
//! This crate provides a trait-based GitHub API client scoped to a single
//! repository, exposing exactly what merge admission needs: pull request
//! snapshots, commit and event timelines, combined statuses, comments,
//! commit statuses and merges.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              GitHubClient trait                  │
//! │  - fetch_pull_request()                          │
//! │  - fetch_combined_status()                       │
//! │  - merge_pull_request()                          │
//! │  - approval_timeline()                           │
//! └─────────────────────────────────────────────────┘
//!                        │
//!                        ▼
//!              ┌─────────────────┐
//!              │ OctocrabClient  │
//!              │ (direct API)    │
//!              └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use sq_github::{GitHubClient, OctocrabClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let token = sq_github::resolve_token(None)?;
//! let octocrab = sq_github::build_octocrab(None, token)?;
//! let client = OctocrabClient::new(Arc::new(octocrab), "kubernetes", "kubernetes");
//!
//! let pr = client.fetch_pull_request(42).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod history;
pub mod octocrab_client;
pub mod types;

/// Default GitHub host (public GitHub)
pub const DEFAULT_HOST: &str = "github.com";

pub use auth::{build_octocrab, resolve_token};
pub use client::GitHubClient;
pub use history::ApprovalTimeline;
pub use octocrab_client::OctocrabClient;
pub use types::{
    CheckState, CombinedStatus, Commit, CommitStatus, IssueEvent, IssueEventKind, Mergeability,
    MergeMethod, MergeResult, NewCommitStatus, PullRequest,
};
