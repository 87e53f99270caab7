//! Submit queue status bookkeeping and publishing
//!
//! The commit status is written on every publish. The local `current` map and
//! the bounded history only change when a pull request's reason changes.

use crate::clock::Clock;
use crate::reason::Reason;
use crate::sync::lock;
use anyhow::Context;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use sq_github::{GitHubClient, NewCommitStatus, PullRequest};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Latest reason of one pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmitStatus {
    pub time: DateTime<Utc>,
    pub reason: Reason,
}

/// One observed transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub number: u64,
    pub title: String,
    pub time: DateTime<Utc>,
    pub reason: Reason,
}

#[derive(Debug, Default)]
struct StatusLog {
    current: BTreeMap<u64, SubmitStatus>,
    history: VecDeque<StatusChange>,
}

pub struct StatusPublisher {
    github: Arc<dyn GitHubClient>,
    clock: Arc<dyn Clock>,
    context: String,
    target_url: Option<String>,
    history_limit: usize,
    log: Mutex<StatusLog>,
}

impl StatusPublisher {
    pub fn new(
        github: Arc<dyn GitHubClient>,
        clock: Arc<dyn Clock>,
        context: impl Into<String>,
        target_url: Option<String>,
        history_limit: usize,
    ) -> Self {
        Self {
            github,
            clock,
            context: context.into(),
            target_url,
            history_limit: history_limit.max(1),
            log: Mutex::new(StatusLog::default()),
        }
    }

    /// Record `reason` for `pr` and write it as the head commit's status
    pub async fn publish(&self, pr: &PullRequest, reason: Reason) -> anyhow::Result<()> {
        if self.record(pr, reason) {
            debug!("PR #{} is now {}", pr.number, reason);
        }

        let status = NewCommitStatus {
            context: self.context.clone(),
            state: reason.external_state(),
            description: reason.description().to_string(),
            target_url: self.target_url.clone(),
        };
        self.github
            .set_commit_status(&pr.head_sha, &status)
            .await
            .with_context(|| format!("Failed to set status {} on PR #{}", reason, pr.number))
    }

    /// Returns true if the reason changed
    fn record(&self, pr: &PullRequest, reason: Reason) -> bool {
        let now = self.clock.now();
        let mut log = lock(&self.log);

        if log.current.get(&pr.number).map(|s| s.reason) == Some(reason) {
            return false;
        }

        log.current.insert(pr.number, SubmitStatus { time: now, reason });
        log.history.push_back(StatusChange {
            number: pr.number,
            title: pr.title.clone(),
            time: now,
            reason,
        });
        while log.history.len() > self.history_limit {
            log.history.pop_front();
        }
        true
    }

    pub fn current(&self, number: u64) -> Option<SubmitStatus> {
        lock(&self.log).current.get(&number).copied()
    }

    pub fn current_all(&self) -> BTreeMap<u64, SubmitStatus> {
        lock(&self.log).current.clone()
    }

    /// Transitions, oldest first
    pub fn history(&self) -> Vec<StatusChange> {
        lock(&self.log).history.iter().cloned().collect()
    }

    /// Reasons `number` went through that are still in the history
    pub fn reasons_seen(&self, number: u64) -> Vec<Reason> {
        lock(&self.log)
            .history
            .iter()
            .filter(|change| change.number == number)
            .map(|change| change.reason)
            .collect()
    }
}
