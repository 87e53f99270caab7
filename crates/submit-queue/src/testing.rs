//! In-memory collaborators for tests

use crate::labels;
use crate::sync::lock;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sq_ci::{
    ArtifactStore, BuildResult, CiError, CiResult, FinishedResult, JobBuild, JobClient,
};
use sq_github::{
    CheckState, CombinedStatus, Commit, CommitStatus, GitHubClient, IssueEvent, IssueEventKind,
    MergeMethod, MergeResult, NewCommitStatus, PullRequest,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

pub const E2E_CONTEXT: &str = "Jenkins GCE e2e";
pub const UNIT_CONTEXT: &str = "Jenkins unit/integration";

/// Test time `t` (minutes after a fixed origin)
pub fn at(t: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(t)
}

pub fn pull_request(number: u64, author: &str, labels: &[&str]) -> PullRequest {
    PullRequest {
        number,
        title: format!("PR {}", number),
        author: author.to_string(),
        head_sha: format!("sha{}", number),
        base_branch: "master".to_string(),
        mergeable: Some(true),
        merged: false,
        labels: labels.iter().map(|l| l.to_string()).collect(),
        html_url: format!("https://github.com/kubernetes/kubernetes/pull/{}", number),
    }
}

pub fn status_with(states: &[(&str, CheckState)]) -> CombinedStatus {
    CombinedStatus {
        state: CheckState::Pending,
        statuses: states
            .iter()
            .map(|(context, state)| CommitStatus {
                context: context.to_string(),
                state: *state,
                description: None,
                target_url: None,
            })
            .collect(),
    }
}

/// CI run started by a retest comment
#[derive(Debug, Clone)]
struct ScriptedRun {
    /// Status polls that still see both contexts pending
    polls_left: usize,
    e2e: CheckState,
    unit: CheckState,
}

#[derive(Default)]
struct FakeRepo {
    prs: BTreeMap<u64, PullRequest>,
    commits: HashMap<u64, Vec<Commit>>,
    events: HashMap<u64, Vec<IssueEvent>>,
    statuses: HashMap<String, Vec<CommitStatus>>,
    statuses_set: HashMap<String, Vec<NewCommitStatus>>,
    comments: Vec<(u64, String)>,
    scripted: HashMap<u64, ScriptedRun>,
    running: HashMap<u64, ScriptedRun>,
    merge_on_retest: HashSet<u64>,
    fail_fetch: HashSet<u64>,
    fail_status_writes: bool,
    reject_merges: bool,
    merged: Vec<u64>,
    event_fetches: usize,
}

/// Repository fake; a retest comment starts the scripted CI run of that PR
#[derive(Default)]
pub struct FakeGitHub {
    repo: Mutex<FakeRepo>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pr(&self, pr: PullRequest) {
        lock(&self.repo).prs.insert(pr.number, pr);
    }

    /// A PR that passes every gate check: whitelisted author, commits at
    /// 7..=9, lgtm added at 10..=12, unit tests green
    pub fn add_eligible_pr(&self, number: u64, extra_labels: &[&str]) -> PullRequest {
        let mut names = vec![labels::CLA_YES, labels::LGTM];
        names.extend_from_slice(extra_labels);
        let pr = pull_request(number, "alice", &names);
        self.add_pr(pr.clone());
        self.set_commit_times(number, &[7, 8, 9]);
        self.set_label_times(number, labels::LGTM, &[10, 11, 12]);
        self.set_status(&pr.head_sha, UNIT_CONTEXT, CheckState::Success);
        pr
    }

    pub fn update_pr(&self, number: u64, update: impl FnOnce(&mut PullRequest)) {
        if let Some(pr) = lock(&self.repo).prs.get_mut(&number) {
            update(pr);
        }
    }

    pub fn set_commit_times(&self, number: u64, times: &[i64]) {
        let commits = times
            .iter()
            .map(|t| Commit {
                sha: format!("commit-{}-{}", number, t),
                committed_at: Some(at(*t)),
            })
            .collect();
        lock(&self.repo).commits.insert(number, commits);
    }

    pub fn set_label_times(&self, number: u64, label: &str, times: &[i64]) {
        let events = times
            .iter()
            .map(|t| IssueEvent {
                kind: IssueEventKind::Labeled,
                actor: Some("reviewer".to_string()),
                label: Some(label.to_string()),
                created_at: at(*t),
            })
            .collect();
        lock(&self.repo).events.insert(number, events);
    }

    pub fn add_force_push(&self, number: u64, t: i64) {
        lock(&self.repo)
            .events
            .entry(number)
            .or_default()
            .push(IssueEvent {
                kind: IssueEventKind::HeadRefForcePushed,
                actor: Some("alice".to_string()),
                label: None,
                created_at: at(t),
            });
    }

    pub fn set_status(&self, sha: &str, context: &str, state: CheckState) {
        let mut repo = lock(&self.repo);
        let statuses = repo.statuses.entry(sha.to_string()).or_default();
        statuses.retain(|s| s.context != context);
        statuses.push(CommitStatus {
            context: context.to_string(),
            state,
            description: None,
            target_url: None,
        });
    }

    /// Outcome of the CI run the next retest comment on `number` starts
    pub fn on_retest(&self, number: u64, e2e: CheckState, unit: CheckState, polls: usize) {
        lock(&self.repo).scripted.insert(
            number,
            ScriptedRun {
                polls_left: polls,
                e2e,
                unit,
            },
        );
    }

    /// Let a running CI run report its results on the next poll
    pub fn complete_ci(&self, number: u64) {
        if let Some(run) = lock(&self.repo).running.get_mut(&number) {
            run.polls_left = 0;
        }
    }

    /// Someone merges `number` by hand right after the retest is requested
    pub fn merge_on_retest(&self, number: u64) {
        lock(&self.repo).merge_on_retest.insert(number);
    }

    pub fn event_fetches(&self) -> usize {
        lock(&self.repo).event_fetches
    }

    pub fn fail_fetch(&self, number: u64) {
        lock(&self.repo).fail_fetch.insert(number);
    }

    pub fn fail_status_writes(&self, fail: bool) {
        lock(&self.repo).fail_status_writes = fail;
    }

    pub fn reject_merges(&self, reject: bool) {
        lock(&self.repo).reject_merges = reject;
    }

    pub fn statuses_set(&self, sha: &str) -> Vec<NewCommitStatus> {
        lock(&self.repo)
            .statuses_set
            .get(sha)
            .cloned()
            .unwrap_or_default()
    }

    pub fn comments(&self) -> Vec<(u64, String)> {
        lock(&self.repo).comments.clone()
    }

    pub fn merged(&self) -> Vec<u64> {
        lock(&self.repo).merged.clone()
    }
}

#[async_trait]
impl GitHubClient for FakeGitHub {
    async fn fetch_open_pull_requests(&self) -> anyhow::Result<Vec<PullRequest>> {
        Ok(lock(&self.repo)
            .prs
            .values()
            .filter(|pr| !pr.merged)
            .cloned()
            .collect())
    }

    async fn fetch_pull_request(&self, number: u64) -> anyhow::Result<PullRequest> {
        let repo = lock(&self.repo);
        if repo.fail_fetch.contains(&number) {
            anyhow::bail!("connection reset fetching PR #{}", number);
        }
        repo.prs
            .get(&number)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("PR #{} not found", number))
    }

    async fn fetch_commits(&self, number: u64) -> anyhow::Result<Vec<Commit>> {
        Ok(lock(&self.repo).commits.get(&number).cloned().unwrap_or_default())
    }

    async fn fetch_events(&self, number: u64) -> anyhow::Result<Vec<IssueEvent>> {
        let mut repo = lock(&self.repo);
        repo.event_fetches += 1;
        Ok(repo.events.get(&number).cloned().unwrap_or_default())
    }

    async fn fetch_combined_status(&self, sha: &str) -> anyhow::Result<CombinedStatus> {
        let mut repo = lock(&self.repo);

        let number = repo
            .prs
            .values()
            .find(|pr| pr.head_sha == sha)
            .map(|pr| pr.number);
        if let Some(number) = number {
            let finished = match repo.running.get_mut(&number) {
                Some(run) if run.polls_left == 0 => Some(run.clone()),
                Some(run) => {
                    run.polls_left -= 1;
                    None
                }
                None => None,
            };
            if let Some(run) = finished {
                repo.running.remove(&number);
                drop(repo);
                self.set_status(sha, E2E_CONTEXT, run.e2e);
                self.set_status(sha, UNIT_CONTEXT, run.unit);
                repo = lock(&self.repo);
            }
        }

        Ok(CombinedStatus {
            state: CheckState::Pending,
            statuses: repo.statuses.get(sha).cloned().unwrap_or_default(),
        })
    }

    async fn post_comment(&self, number: u64, body: &str) -> anyhow::Result<()> {
        let (sha, run, merge) = {
            let mut repo = lock(&self.repo);
            repo.comments.push((number, body.to_string()));
            if !body.contains("test this") {
                return Ok(());
            }
            let sha = repo.prs.get(&number).map(|pr| pr.head_sha.clone());
            let run = repo.scripted.remove(&number);
            let merge = repo.merge_on_retest.remove(&number);
            (sha, run, merge)
        };

        let Some(sha) = sha else { return Ok(()) };
        if let Some(run) = run {
            self.set_status(&sha, E2E_CONTEXT, CheckState::Pending);
            self.set_status(&sha, UNIT_CONTEXT, CheckState::Pending);
            lock(&self.repo).running.insert(number, run);
        }
        if merge {
            self.update_pr(number, |pr| pr.merged = true);
        }
        Ok(())
    }

    async fn set_commit_status(&self, sha: &str, status: &NewCommitStatus) -> anyhow::Result<()> {
        let mut repo = lock(&self.repo);
        if repo.fail_status_writes {
            anyhow::bail!("status API unavailable");
        }
        repo.statuses_set
            .entry(sha.to_string())
            .or_default()
            .push(status.clone());
        Ok(())
    }

    async fn merge_pull_request(
        &self,
        number: u64,
        _merge_method: MergeMethod,
        _commit_title: Option<&str>,
    ) -> anyhow::Result<MergeResult> {
        let mut repo = lock(&self.repo);
        if repo.reject_merges {
            return Ok(MergeResult {
                merged: false,
                sha: None,
                message: "Base branch was modified".to_string(),
            });
        }
        let Some(pr) = repo.prs.get_mut(&number) else {
            anyhow::bail!("PR #{} not found", number);
        };
        pr.merged = true;
        repo.merged.push(number);
        Ok(MergeResult {
            merged: true,
            sha: Some(format!("merge-{}", number)),
            message: "Pull Request successfully merged".to_string(),
        })
    }
}

/// Jenkins fake; a job answers its scripted results in order, repeating the last
#[derive(Default)]
pub struct FakeJobClient {
    results: Mutex<HashMap<String, VecDeque<BuildResult>>>,
    fail_next: Mutex<usize>,
    call_count: Mutex<usize>,
}

impl FakeJobClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, job: &str, result: BuildResult) {
        self.script(job, &[result]);
    }

    pub fn script(&self, job: &str, results: &[BuildResult]) {
        lock(&self.results).insert(job.to_string(), results.iter().copied().collect());
    }

    /// Fail the next `n` calls with a server error
    pub fn fail_next(&self, n: usize) {
        *lock(&self.fail_next) = n;
    }

    pub fn call_count(&self) -> usize {
        *lock(&self.call_count)
    }
}

#[async_trait]
impl JobClient for FakeJobClient {
    async fn last_completed_build(&self, job: &str) -> CiResult<JobBuild> {
        *lock(&self.call_count) += 1;

        let url = format!("http://jenkins/job/{}/lastCompletedBuild/api/json", job);
        {
            let mut fail_next = lock(&self.fail_next);
            if *fail_next > 0 {
                *fail_next -= 1;
                return Err(CiError::Status { url, status: 503 });
            }
        }

        let mut results = lock(&self.results);
        let Some(queue) = results.get_mut(job) else {
            return Err(CiError::Status { url, status: 404 });
        };
        let result = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        };
        match result {
            Some(result) => Ok(JobBuild {
                number: Some(1),
                result,
            }),
            None => Err(CiError::Status { url, status: 404 }),
        }
    }
}

/// Artifact bucket fake
#[derive(Default)]
pub struct FakeArtifactStore {
    builds: Mutex<HashMap<String, BTreeMap<u64, BuildResult>>>,
    artifacts: Mutex<HashMap<(String, u64, String), Bytes>>,
    /// Body served for any path not added explicitly
    fallback: Mutex<Option<Bytes>>,
}

impl FakeArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_build(&self, job: &str, build: u64, result: BuildResult) {
        lock(&self.builds)
            .entry(job.to_string())
            .or_default()
            .insert(build, result);
    }

    /// Answer every artifact path, like a bucket proxy serving an error page
    pub fn serve_any_path(&self, content: &str) {
        *lock(&self.fallback) = Some(Bytes::from(content.to_string()));
    }

    pub fn add_artifact(&self, job: &str, build: u64, file: &str, content: &str) {
        lock(&self.artifacts).insert(
            (job.to_string(), build, file.to_string()),
            Bytes::from(content.to_string()),
        );
    }
}

fn not_found(path: String) -> CiError {
    CiError::Status {
        url: format!("https://storage.example.com/{}", path),
        status: 404,
    }
}

#[async_trait]
impl ArtifactStore for FakeArtifactStore {
    async fn latest_build_number(&self, job: &str) -> CiResult<u64> {
        lock(&self.builds)
            .get(job)
            .and_then(|builds| builds.keys().next_back().copied())
            .ok_or_else(|| not_found(format!("{}/latest-build.txt", job)))
    }

    async fn finished_result(&self, job: &str, build: u64) -> CiResult<FinishedResult> {
        lock(&self.builds)
            .get(job)
            .and_then(|builds| builds.get(&build).copied())
            .map(|result| FinishedResult {
                result,
                timestamp: 1_451_606_400 + build,
            })
            .ok_or_else(|| not_found(format!("{}/{}/finished.json", job, build)))
    }

    async fn artifact(&self, job: &str, build: u64, file: &str) -> CiResult<Option<Bytes>> {
        let found = lock(&self.artifacts)
            .get(&(job.to_string(), build, file.to_string()))
            .cloned();
        Ok(found.or_else(|| lock(&self.fallback).clone()))
    }
}
