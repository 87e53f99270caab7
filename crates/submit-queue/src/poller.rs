//! CI infrastructure stability checks
//!
//! Every remote call is retried at a fixed interval until a deadline. Running
//! out of retries makes the answer [`JobStatus::Undetermined`], never a
//! failure.

use log::{debug, info, warn};
use serde::Serialize;
use sq_ci::{junit, ArtifactStore, CiResult, JobClient};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Highest `junit_NN.xml` index read for one build
pub const MAX_JUNIT_FILES: usize = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Stable,
    Unstable,
    /// The build system could not be reached in time
    Undetermined,
}

impl JobStatus {
    pub fn is_stable(&self) -> bool {
        matches!(self, JobStatus::Stable)
    }
}

/// Status of every tracked job for one check
pub type InfraStatus = BTreeMap<String, JobStatus>;

pub struct StatusPoller {
    jobs: Arc<dyn JobClient>,
    artifacts: Arc<dyn ArtifactStore>,
    retry_interval: Duration,
    retry_timeout: Duration,
    weak_stable_window: usize,
}

impl StatusPoller {
    pub fn new(
        jobs: Arc<dyn JobClient>,
        artifacts: Arc<dyn ArtifactStore>,
        retry_interval: Duration,
        retry_timeout: Duration,
        weak_stable_window: usize,
    ) -> Self {
        Self {
            jobs,
            artifacts,
            retry_interval,
            retry_timeout,
            weak_stable_window: weak_stable_window.max(1),
        }
    }

    async fn retry<T, F, Fut>(&self, what: &str, mut call: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CiResult<T>>,
    {
        let deadline = Instant::now() + self.retry_timeout;
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Some(value),
                Err(e) => {
                    warn!("{} failed (attempt {}): {}", what, attempt, e);
                    if Instant::now() + self.retry_interval > deadline {
                        warn!("Giving up on {} after {} attempts", what, attempt);
                        return None;
                    }
                }
            }
            attempt += 1;
            tokio::time::sleep(self.retry_interval).await;
        }
    }

    /// Whether the last completed run of `job` succeeded
    pub async fn job_stable(&self, job: &str) -> JobStatus {
        let what = format!("fetching last completed build of {}", job);
        match self.retry(&what, || self.jobs.last_completed_build(job)).await {
            Some(build) if build.result.is_success() => JobStatus::Stable,
            Some(build) => {
                info!("Job {} build {:?} is not stable", job, build.number);
                JobStatus::Unstable
            }
            None => JobStatus::Undetermined,
        }
    }

    /// Stability of a job whose failures may be flakes
    ///
    /// A failed latest run still counts as stable when its test results show
    /// no failing test and the runs before it in the window all succeeded.
    pub async fn weak_stable(&self, job: &str) -> JobStatus {
        let what = format!("fetching latest build of {}", job);
        let Some(latest) = self
            .retry(&what, || self.artifacts.latest_build_number(job))
            .await
        else {
            return JobStatus::Undetermined;
        };

        let Some(finished) = self.finished(job, latest).await else {
            return JobStatus::Undetermined;
        };
        if finished.is_success() {
            return JobStatus::Stable;
        }

        let Some(failures) = self.junit_failures(job, latest).await else {
            return JobStatus::Undetermined;
        };
        if failures > 0 {
            info!("Job {} build {} has {} failing tests", job, latest, failures);
            return JobStatus::Unstable;
        }

        for back in 1..self.weak_stable_window as u64 {
            let Some(build) = latest.checked_sub(back) else {
                debug!("Job {} has no build {} runs before {}", job, back, latest);
                return JobStatus::Unstable;
            };
            match self.finished(job, build).await {
                Some(result) if result.is_success() => {}
                Some(_) => {
                    info!("Job {} build {} failed before weak build {}", job, build, latest);
                    return JobStatus::Unstable;
                }
                None => return JobStatus::Undetermined,
            }
        }

        info!("Job {} build {} failed without failing tests; treating as stable", job, latest);
        JobStatus::Stable
    }

    async fn finished(&self, job: &str, build: u64) -> Option<sq_ci::BuildResult> {
        let what = format!("fetching finished.json of {} build {}", job, build);
        self.retry(&what, || self.artifacts.finished_result(job, build))
            .await
            .map(|finished| finished.result)
    }

    /// Sum of failures over `junit_01.xml`, `junit_02.xml`, ... until one is missing
    ///
    /// A build that fills all [`MAX_JUNIT_FILES`] slots counts as failing.
    async fn junit_failures(&self, job: &str, build: u64) -> Option<u64> {
        let mut total = 0;
        for n in 1..=MAX_JUNIT_FILES {
            let file = junit::junit_file_name(n);
            let what = format!("fetching {} of {} build {}", file, job, build);
            match self.retry(&what, || self.artifacts.artifact(job, build, &file)).await? {
                Some(body) => match junit::count_failures(&body) {
                    Some(failures) => total += failures,
                    None => {
                        warn!("{} of {} build {} is not a test report", file, job, build);
                        total += 1;
                    }
                },
                None => return Some(total),
            }
        }
        warn!(
            "{} build {} reached the limit of {} test reports",
            job, build, MAX_JUNIT_FILES
        );
        Some(total.max(1))
    }

    /// Check every tracked job
    pub async fn check(&self, strong_jobs: &[String], weak_jobs: &[String]) -> InfraStatus {
        let mut status = InfraStatus::new();
        for job in strong_jobs {
            status.insert(job.clone(), self.job_stable(job).await);
        }
        for job in weak_jobs {
            status.insert(job.clone(), self.weak_stable(job).await);
        }
        status
    }
}

/// All tracked jobs are stable
pub fn all_stable(status: &InfraStatus) -> bool {
    status.values().all(JobStatus::is_stable)
}
