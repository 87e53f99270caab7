//! The submit queue
//!
//! [`SubmitQueue::munge`] evaluates one pull request and queues it for E2E
//! when it is eligible. [`SubmitQueue::each_loop`] is the periodic cycle: it
//! refreshes the whitelist, records CI health and, while the CI
//! infrastructure is stable, moves the E2E slot forward.
//!
//! ```text
//!  munge(pr) ──► gate ──► blocked: publish reason
//!                  │
//!                  ├──► e2e-not-required: merge
//!                  ▼
//!             waiting ──(each_loop)──► active ──► merged
//!                  ▲                     │  └───► e2e-failed
//!                  └──── CI unstable ────┘
//! ```

use crate::clock::Clock;
use crate::gate::{self, GateInput, GatePolicy, Verdict};
use crate::health::{Health, HealthRecord};
use crate::merge_rate::MergeRate;
use crate::poller::{all_stable, InfraStatus, StatusPoller};
use crate::publisher::StatusPublisher;
use crate::reason::Reason;
use crate::report::QueueReport;
use crate::scheduler::{ActiveRun, E2eQueue};
use crate::sync::lock;
use anyhow::Context;
use log::{debug, error, info, warn};
use sq_ci::{ArtifactStore, JobClient};
use sq_config::{load_whitelist_file, SubmitQueueConfig};
use sq_github::{CheckState, CombinedStatus, GitHubClient, MergeMethod, PullRequest};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Outcome of trying to hand the E2E slot to a waiting pull request
enum Start {
    Started,
    /// Left the queue (merged, blocked or merged directly)
    Dropped,
    /// Put back; try again next cycle
    Deferred,
}

/// One poll of the active run
enum Poll {
    Running,
    Merged(PullRequest),
    Settled {
        pr: PullRequest,
        e2e: CheckState,
        unit: CheckState,
    },
}

pub struct SubmitQueue {
    config: SubmitQueueConfig,
    merge_method: MergeMethod,
    github: Arc<dyn GitHubClient>,
    poller: StatusPoller,
    publisher: StatusPublisher,
    clock: Arc<dyn Clock>,
    policy: Mutex<Arc<GatePolicy>>,
    queue: Mutex<E2eQueue>,
    infra: Mutex<InfraStatus>,
    merge_rate: Mutex<MergeRate>,
    health: Mutex<Health>,
    /// Held for the whole cycle; only the cycle moves the active slot
    cycle: tokio::sync::Mutex<()>,
}

fn merge_method(name: &str) -> MergeMethod {
    match name {
        "merge" => MergeMethod::Merge,
        "rebase" => MergeMethod::Rebase,
        _ => MergeMethod::Squash,
    }
}

impl SubmitQueue {
    pub fn new(
        config: SubmitQueueConfig,
        github: Arc<dyn GitHubClient>,
        jobs: Arc<dyn JobClient>,
        artifacts: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let poller = StatusPoller::new(
            jobs,
            artifacts,
            config.retry_interval(),
            config.retry_timeout(),
            config.weak_stable_window,
        );
        let publisher = StatusPublisher::new(
            github.clone(),
            clock.clone(),
            config.submit_status_context.clone(),
            config.status_url.clone(),
            config.status_history_limit,
        );

        let queue = Self {
            merge_method: merge_method(&config.merge_method),
            merge_rate: Mutex::new(MergeRate::new(now, config.merge_rate_time_constant())),
            health: Mutex::new(Health::new(now, config.health_retention())),
            policy: Mutex::new(Arc::new(GatePolicy::default())),
            queue: Mutex::new(E2eQueue::new()),
            infra: Mutex::new(InfraStatus::new()),
            cycle: tokio::sync::Mutex::new(()),
            config,
            github,
            poller,
            publisher,
            clock,
        };
        queue.refresh_whitelist();
        queue
    }

    pub fn config(&self) -> &SubmitQueueConfig {
        &self.config
    }

    pub fn publisher(&self) -> &StatusPublisher {
        &self.publisher
    }

    /// Re-read the whitelist file and rebuild the gate policy
    pub fn refresh_whitelist(&self) {
        let mut whitelist: HashSet<String> = self.config.whitelist.iter().cloned().collect();
        if let Some(path) = &self.config.whitelist_file {
            match load_whitelist_file(path) {
                Ok(users) => whitelist.extend(users),
                Err(e) => warn!("Keeping configured whitelist only: {}", e),
            }
        }

        *lock(&self.policy) = Arc::new(GatePolicy {
            whitelist,
            required_contexts: self.config.required_status_contexts.clone(),
        });
    }

    fn policy(&self) -> Arc<GatePolicy> {
        lock(&self.policy).clone()
    }

    /// Run the gate on a fresh snapshot of `pr`
    ///
    /// Timelines and statuses are only fetched once the label checks pass.
    async fn evaluate(&self, pr: &PullRequest) -> anyhow::Result<Verdict> {
        let policy = self.policy();

        let label_only = gate::evaluate(
            &GateInput {
                pr,
                approved_at: None,
                last_modified: None,
                status: &CombinedStatus::default(),
            },
            &policy,
        );
        if label_only != Verdict::Blocked(Reason::Unknown) {
            return Ok(label_only);
        }

        let timeline = self
            .github
            .approval_timeline(pr.number, crate::labels::LGTM)
            .await
            .with_context(|| format!("Failed to fetch timeline of PR #{}", pr.number))?;
        let status = self
            .github
            .fetch_combined_status(&pr.head_sha)
            .await
            .with_context(|| format!("Failed to fetch status of PR #{}", pr.number))?;

        Ok(gate::evaluate(
            &GateInput {
                pr,
                approved_at: timeline.approved_at,
                last_modified: timeline.last_modified,
                status: &status,
            },
            &policy,
        ))
    }

    async fn publish(&self, pr: &PullRequest, reason: Reason) {
        if let Err(e) = self.publisher.publish(pr, reason).await {
            warn!("{:#}", e);
        }
    }

    /// Evaluate one pull request
    ///
    /// A failed fetch skips the pull request for this round and leaves its
    /// status untouched.
    pub async fn munge(&self, number: u64) {
        if let Err(e) = self.try_munge(number).await {
            warn!("Skipping PR #{} this round: {:#}", number, e);
        }
    }

    async fn try_munge(&self, number: u64) -> anyhow::Result<()> {
        let pr = self
            .github
            .fetch_pull_request(number)
            .await
            .with_context(|| format!("Failed to fetch PR #{}", number))?;

        if pr.base_branch != self.config.target_branch {
            debug!(
                "PR #{} targets {}, not {}",
                number, pr.base_branch, self.config.target_branch
            );
            return Ok(());
        }

        if lock(&self.queue).is_active(number) {
            debug!("PR #{} holds the E2E slot", number);
            return Ok(());
        }

        if pr.merged {
            let was_waiting = lock(&self.queue).remove_waiting(number);
            if was_waiting {
                self.publish(&pr, Reason::Merged).await;
            }
            return Ok(());
        }

        match self.evaluate(&pr).await? {
            Verdict::Blocked(reason) => {
                let was_waiting = lock(&self.queue).remove_waiting(number);
                if was_waiting {
                    info!("PR #{} left the E2E queue: {}", number, reason);
                }
                self.publish(&pr, reason).await;
            }
            Verdict::Eligible { e2e_required: true } => {
                let queued = lock(&self.queue).enqueue(pr.clone());
                if queued {
                    self.publish(&pr, Reason::E2eQueued).await;
                }
            }
            Verdict::Eligible { e2e_required: false } => {
                lock(&self.queue).remove_waiting(number);
                self.merge(&pr).await;
            }
        }
        Ok(())
    }

    /// Merge `pr` and publish the outcome
    async fn merge(&self, pr: &PullRequest) -> Reason {
        let merged = match self
            .github
            .merge_pull_request(pr.number, self.merge_method, None)
            .await
        {
            Ok(result) if result.merged => true,
            Ok(result) => {
                warn!("Merge of PR #{} rejected: {}", pr.number, result.message);
                false
            }
            Err(e) => {
                warn!("Merge of PR #{} failed: {:#}", pr.number, e);
                false
            }
        };

        let reason = if merged {
            let now = self.clock.now();
            lock(&self.merge_rate).record_merge(now);
            info!("Merged PR #{}: {}", pr.number, pr.title);
            Reason::Merged
        } else if self.merged_elsewhere(pr.number).await {
            Reason::Merged
        } else {
            Reason::MergeFailed
        };

        self.publish(pr, reason).await;
        reason
    }

    async fn merged_elsewhere(&self, number: u64) -> bool {
        match self.github.fetch_pull_request(number).await {
            Ok(pr) => pr.merged,
            Err(e) => {
                warn!("Failed to re-check merged state of PR #{}: {:#}", number, e);
                false
            }
        }
    }

    /// One periodic cycle
    pub async fn each_loop(&self) {
        let _cycle = self.cycle.lock().await;

        self.refresh_whitelist();

        let infra = self.check_infrastructure().await;
        self.record_health(&infra);
        if !all_stable(&infra) {
            info!("CI infrastructure is not stable, E2E queue is blocked: {:?}", infra);
            self.release_if_merged().await;
            return;
        }

        self.advance_e2e().await;
    }

    /// Free the slot if the active pull request was merged by someone else
    async fn release_if_merged(&self) {
        let Some(number) = lock(&self.queue).active_number() else {
            return;
        };
        match self.github.fetch_pull_request(number).await {
            Ok(pr) if pr.merged => {
                info!("PR #{} was merged while the E2E queue was blocked", number);
                lock(&self.queue).finish_active();
                self.publish(&pr, Reason::Merged).await;
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to refresh active PR #{}: {:#}", number, e),
        }
    }

    async fn check_infrastructure(&self) -> InfraStatus {
        let infra = self
            .poller
            .check(&self.config.job_names, &self.config.weak_stable_job_names)
            .await;
        *lock(&self.infra) = infra.clone();
        infra
    }

    fn record_health(&self, infra: &InfraStatus) {
        let now = self.clock.now();
        let jobs = infra
            .iter()
            .map(|(job, status)| (job.clone(), status.is_stable()))
            .collect();
        lock(&self.health).update(HealthRecord::new(now, jobs), now);
    }

    async fn advance_e2e(&self) {
        let idle = lock(&self.queue).active().is_none();
        if idle {
            loop {
                let Some(pr) = lock(&self.queue).pop_head() else {
                    return;
                };
                match self.start_e2e(pr).await {
                    Start::Started => break,
                    Start::Dropped => continue,
                    Start::Deferred => return,
                }
            }
        }

        self.poll_active().await;
    }

    async fn start_e2e(&self, pr: PullRequest) -> Start {
        let number = pr.number;

        let fresh = match self.github.fetch_pull_request(number).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!("Failed to refresh PR #{}: {:#}", number, e);
                lock(&self.queue).enqueue(pr);
                return Start::Deferred;
            }
        };

        if fresh.merged {
            info!("PR #{} was merged while waiting for E2E", number);
            self.publish(&fresh, Reason::Merged).await;
            return Start::Dropped;
        }

        let verdict = match self.evaluate(&fresh).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("{:#}", e);
                lock(&self.queue).enqueue(fresh);
                return Start::Deferred;
            }
        };

        match verdict {
            Verdict::Blocked(reason) => {
                info!("PR #{} is no longer eligible: {}", number, reason);
                self.publish(&fresh, reason).await;
                Start::Dropped
            }
            Verdict::Eligible { e2e_required: false } => {
                self.merge(&fresh).await;
                Start::Dropped
            }
            Verdict::Eligible { e2e_required: true } => {
                let body = format!(
                    "@{} test this [submit-queue is verifying that this PR is safe to merge]",
                    self.config.ci_bot_name
                );
                if let Err(e) = self.github.post_comment(number, &body).await {
                    warn!("Failed to request E2E for PR #{}: {:#}", number, e);
                    lock(&self.queue).enqueue(fresh);
                    return Start::Deferred;
                }

                info!("Running E2E for PR #{}", number);
                let now = self.clock.now();
                lock(&self.queue).activate(ActiveRun::new(fresh.clone(), now));
                self.publish(&fresh, Reason::E2eRunning).await;
                Start::Started
            }
        }
    }

    /// Poll the active run until it settles or the pending wait runs out
    async fn poll_active(&self) {
        let Some(number) = lock(&self.queue).active_number() else {
            return;
        };

        let deadline = Instant::now() + self.config.pending_wait();
        loop {
            match self.poll_once(number).await {
                Poll::Running => {}
                Poll::Merged(pr) => {
                    info!("PR #{} was merged during its E2E run", number);
                    lock(&self.queue).finish_active();
                    self.publish(&pr, Reason::Merged).await;
                    return;
                }
                Poll::Settled { pr, e2e, unit } => {
                    self.finish_e2e(pr, e2e, unit).await;
                    return;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                let pr = lock(&self.queue).active().map(|run| run.pr.clone());
                if let Some(pr) = pr {
                    info!("E2E for PR #{} still running, checking again next cycle", number);
                    self.publish(&pr, Reason::E2eQueued).await;
                }
                return;
            }
            let wake = (now + self.config.e2e_poll_interval()).min(deadline);
            tokio::time::sleep_until(wake).await;
        }
    }

    async fn poll_once(&self, number: u64) -> Poll {
        let pr = match self.github.fetch_pull_request(number).await {
            Ok(pr) => pr,
            Err(e) => {
                warn!("Failed to poll PR #{}: {:#}", number, e);
                return Poll::Running;
            }
        };
        if pr.merged {
            return Poll::Merged(pr);
        }

        let status = match self.github.fetch_combined_status(&pr.head_sha).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to poll status of PR #{}: {:#}", number, e);
                return Poll::Running;
            }
        };

        let e2e_context = &self.config.e2e_status_context;
        let unit_context = &self.config.unit_status_context;
        let settled = {
            let mut queue = lock(&self.queue);
            let Some(run) = queue.active_mut() else {
                return Poll::Running;
            };
            run.pr = pr.clone();
            run.check_count += 1;
            let e2e = run.observe(e2e_context, status.context_state(e2e_context));
            let unit = run.observe(unit_context, status.context_state(unit_context));
            e2e.zip(unit)
        };

        match settled {
            Some((e2e, unit)) => Poll::Settled { pr, e2e, unit },
            None => Poll::Running,
        }
    }

    async fn finish_e2e(&self, pr: PullRequest, e2e: CheckState, unit: CheckState) {
        let number = pr.number;

        // Results from a run on unstable infrastructure are not trusted
        let infra = self.check_infrastructure().await;
        if !all_stable(&infra) {
            info!("CI became unstable during the E2E run of PR #{}, requeueing", number);
            lock(&self.queue).requeue_active();
            self.publish(&pr, Reason::E2eQueued).await;
            return;
        }

        if e2e != CheckState::Success || unit != CheckState::Success {
            lock(&self.queue).finish_active();
            if self.merged_elsewhere(number).await {
                self.publish(&pr, Reason::Merged).await;
                return;
            }
            info!("E2E for PR #{} failed (e2e: {:?}, unit: {:?})", number, e2e, unit);
            self.publish(&pr, Reason::E2eFailed).await;
            return;
        }

        match self.evaluate(&pr).await {
            Ok(Verdict::Eligible { .. }) => {
                lock(&self.queue).finish_active();
                self.merge(&pr).await;
            }
            Ok(Verdict::Blocked(reason)) => {
                info!("PR #{} passed E2E but is no longer eligible: {}", number, reason);
                lock(&self.queue).finish_active();
                self.publish(&pr, reason).await;
            }
            Err(e) => {
                warn!("{:#}", e);
                lock(&self.queue).requeue_active();
            }
        }
    }

    /// Evaluate every open pull request and run one cycle
    ///
    /// Evaluations run concurrently with the cycle.
    pub async fn sync(self: &Arc<Self>) {
        let prs = match self.github.fetch_open_pull_requests().await {
            Ok(prs) => prs,
            Err(e) => {
                error!("Failed to list open pull requests: {:#}", e);
                Vec::new()
            }
        };

        let mut tasks = JoinSet::new();
        for pr in prs
            .into_iter()
            .filter(|pr| pr.base_branch == self.config.target_branch)
        {
            let queue = Arc::clone(self);
            tasks.spawn(async move { queue.munge(pr.number).await });
        }

        self.each_loop().await;

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Evaluation task panicked: {}", e);
            }
        }
    }

    /// Current merges-per-day estimate
    pub fn merge_rate(&self) -> f64 {
        let now = self.clock.now();
        lock(&self.merge_rate).rate_at(now)
    }

    pub fn report(&self) -> QueueReport {
        let now = self.clock.now();
        let (queue, active) = {
            let queue = lock(&self.queue);
            (queue.ordered(), queue.active_number())
        };
        let merge_rate = lock(&self.merge_rate).clone();
        let health = lock(&self.health).clone();
        let stable_ratio = health.stable_ratio();

        QueueReport {
            generated_at: now,
            current: self.publisher.current_all(),
            history: self.publisher.history(),
            queue,
            active,
            infrastructure: lock(&self.infra).clone(),
            health,
            stable_ratio,
            merge_rate: merge_rate.rate_at(now),
            last_merge: merge_rate.last_merge(),
        }
    }
}
