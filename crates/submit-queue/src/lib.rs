//! Merge-admission controller
//!
//! Decides for every open pull request whether it may be merged
//! automatically, and serializes eligible ones through a single shared E2E
//! run before merging them.
//!
//! - [`gate`]: eligibility checks in fixed order, first failure wins
//! - [`scheduler`]: priority-ordered waiting queue and the single E2E slot
//! - [`poller`]: CI job stability, including weak-stability analysis
//! - [`merge_rate`] and [`health`]: rolling throughput and stability stats
//! - [`publisher`]: reason to commit status mapping and transition history
//! - [`SubmitQueue`]: owns all of the above and drives them
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use submit_queue::{SubmitQueue, SystemClock};
//!
//! # async fn example(
//! #     github: Arc<dyn sq_github::GitHubClient>,
//! #     jobs: Arc<dyn sq_ci::JobClient>,
//! #     artifacts: Arc<dyn sq_ci::ArtifactStore>,
//! # ) {
//! let config = sq_config::SubmitQueueConfig::default();
//! let queue = Arc::new(SubmitQueue::new(config, github, jobs, artifacts, Arc::new(SystemClock)));
//! queue.sync().await;
//! # }
//! ```

pub mod clock;
pub mod gate;
pub mod health;
pub mod labels;
pub mod merge_rate;
pub mod poller;
pub mod priority;
pub mod publisher;
pub mod reason;
pub mod report;
pub mod scheduler;
pub mod submit_queue;
mod sync;

#[cfg(test)]
mod testing;

pub use clock::{Clock, SystemClock};
pub use reason::Reason;
pub use report::QueueReport;
pub use submit_queue::SubmitQueue;
