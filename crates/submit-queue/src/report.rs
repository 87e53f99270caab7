//! Read-only snapshot of the queue for a status endpoint

use crate::health::Health;
use crate::poller::InfraStatus;
use crate::publisher::{StatusChange, SubmitStatus};
use crate::scheduler::QueueEntry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct QueueReport {
    pub generated_at: DateTime<Utc>,
    /// Latest reason per pull request
    pub current: BTreeMap<u64, SubmitStatus>,
    /// Recent transitions, oldest first
    pub history: Vec<StatusChange>,
    /// Waiting and active pull requests in E2E order
    pub queue: Vec<QueueEntry>,
    /// Pull request holding the E2E slot
    pub active: Option<u64>,
    /// Tracked jobs as of the last check
    pub infrastructure: InfraStatus,
    pub health: Health,
    /// Share of retained cycles with stable CI, None before the first cycle
    pub stable_ratio: Option<f64>,
    /// Merges per day
    pub merge_rate: f64,
    pub last_merge: DateTime<Utc>,
}
