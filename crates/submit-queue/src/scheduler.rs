//! E2E queue
//!
//! Pull requests waiting for the shared E2E slot plus the one holding it.
//! Only the cycle task moves entries in and out of the active slot; request
//! evaluation only adds or removes waiting entries.

use crate::priority::{ordered_queue, priority_of};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sq_github::{CheckState, PullRequest};
use std::collections::{BTreeMap, BTreeSet};

/// The pull request holding the E2E slot
#[derive(Debug, Clone)]
pub struct ActiveRun {
    pub pr: PullRequest,
    pub started_at: DateTime<Utc>,
    /// Contexts observed pending since the retest was requested
    seen_pending: BTreeSet<String>,
    /// Number of polls so far
    pub check_count: usize,
}

impl ActiveRun {
    pub fn new(pr: PullRequest, started_at: DateTime<Utc>) -> Self {
        Self {
            pr,
            started_at,
            seen_pending: BTreeSet::new(),
            check_count: 0,
        }
    }

    /// Note a polled state; returns it once the context has settled
    ///
    /// A context settles when it has been seen pending since the retest and
    /// now reports anything else. Results from before the retest are ignored.
    pub fn observe(&mut self, context: &str, state: Option<CheckState>) -> Option<CheckState> {
        match state {
            None => None,
            Some(CheckState::Pending) => {
                self.seen_pending.insert(context.to_string());
                None
            }
            Some(settled) if self.seen_pending.contains(context) => Some(settled),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueEntry {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub priority: i32,
}

#[derive(Debug, Default)]
pub struct E2eQueue {
    waiting: BTreeMap<u64, PullRequest>,
    active: Option<ActiveRun>,
}

impl E2eQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or refresh a waiting entry; the active request is left alone
    ///
    /// Returns false if `pr` holds the active slot.
    pub fn enqueue(&mut self, pr: PullRequest) -> bool {
        if self.active_number() == Some(pr.number) {
            return false;
        }
        self.waiting.insert(pr.number, pr);
        true
    }

    /// Drop a waiting entry; returns whether it was waiting
    pub fn remove_waiting(&mut self, number: u64) -> bool {
        self.waiting.remove(&number).is_some()
    }

    pub fn is_waiting(&self, number: u64) -> bool {
        self.waiting.contains_key(&number)
    }

    pub fn active_number(&self) -> Option<u64> {
        self.active.as_ref().map(|run| run.pr.number)
    }

    pub fn is_active(&self, number: u64) -> bool {
        self.active_number() == Some(number)
    }

    pub fn active(&self) -> Option<&ActiveRun> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveRun> {
        self.active.as_mut()
    }

    /// Take the highest-priority waiting entry out of the queue
    pub fn pop_head(&mut self) -> Option<PullRequest> {
        let head = ordered_queue(self.waiting.values()).into_iter().next()?;
        self.waiting.remove(&head)
    }

    pub fn activate(&mut self, run: ActiveRun) {
        self.waiting.remove(&run.pr.number);
        self.active = Some(run);
    }

    /// Release the slot
    pub fn finish_active(&mut self) -> Option<ActiveRun> {
        self.active.take()
    }

    /// Release the slot and put its request back among the waiting ones
    pub fn requeue_active(&mut self) -> Option<u64> {
        let run = self.active.take()?;
        let number = run.pr.number;
        self.waiting.insert(number, run.pr);
        Some(number)
    }

    /// Waiting and active entries in E2E order
    pub fn ordered(&self) -> Vec<QueueEntry> {
        let prs: BTreeMap<u64, &PullRequest> = self
            .waiting
            .values()
            .chain(self.active.as_ref().map(|run| &run.pr))
            .map(|pr| (pr.number, pr))
            .collect();

        ordered_queue(prs.values().copied())
            .into_iter()
            .filter_map(|number| prs.get(&number))
            .map(|pr| QueueEntry {
                number: pr.number,
                title: pr.title.clone(),
                author: pr.author.clone(),
                priority: priority_of(pr),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.waiting.len() + usize::from(self.active.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
