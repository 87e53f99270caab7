//! Octocrab-based GitHub API client
//!
//! Direct implementation of the `GitHubClient` trait using the octocrab library.
//! Routes are requested raw and decoded into local wire structs, so only the
//! fields the submit queue reads have to be present.

use crate::client::GitHubClient;
use crate::types::{
    CheckState, CombinedStatus, Commit, CommitStatus, IssueEvent, IssueEventKind, MergeMethod,
    MergeResult, NewCommitStatus, PullRequest,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PER_PAGE: u8 = 100;
const MAX_PAGES: u32 = 20;

/// Direct GitHub API client using octocrab
///
/// Bound to one repository at construction time.
#[derive(Debug, Clone)]
pub struct OctocrabClient {
    octocrab: Arc<Octocrab>,
    owner: String,
    repo: String,
}

impl OctocrabClient {
    /// Create a new client for `owner/repo`
    pub fn new(octocrab: Arc<Octocrab>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            octocrab,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    fn route(&self, suffix: &str) -> String {
        format!("/repos/{}/{}/{}", self.owner, self.repo, suffix)
    }

    /// GET every page of a list endpoint
    async fn get_all_pages<T>(&self, route: &str, state: Option<&'static str>) -> anyhow::Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let params = PageParams {
                state,
                per_page: PER_PAGE,
                page,
            };
            let batch: Vec<T> = self
                .octocrab
                .get(route, Some(&params))
                .await
                .with_context(|| format!("GET {} (page {})", route, page))?;
            let batch_len = batch.len();
            items.extend(batch);

            if batch_len < PER_PAGE as usize || page >= MAX_PAGES {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

#[derive(Serialize)]
struct PageParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'static str>,
    per_page: u8,
    page: u32,
}

#[derive(Deserialize)]
struct UserDto {
    login: String,
}

#[derive(Deserialize)]
struct LabelDto {
    name: String,
}

#[derive(Deserialize)]
struct RefDto {
    sha: String,
    #[serde(rename = "ref")]
    ref_field: String,
}

#[derive(Deserialize)]
struct PullDto {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    user: Option<UserDto>,
    head: RefDto,
    base: RefDto,
    #[serde(default)]
    mergeable: Option<bool>,
    #[serde(default)]
    merged: Option<bool>,
    #[serde(default)]
    labels: Vec<LabelDto>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Deserialize)]
struct CommitDateDto {
    #[serde(default)]
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct CommitDetailDto {
    #[serde(default)]
    committer: Option<CommitDateDto>,
    #[serde(default)]
    author: Option<CommitDateDto>,
}

#[derive(Deserialize)]
struct CommitDto {
    sha: String,
    commit: CommitDetailDto,
}

#[derive(Deserialize)]
struct EventDto {
    event: String,
    #[serde(default)]
    actor: Option<UserDto>,
    #[serde(default)]
    label: Option<LabelDto>,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct StatusDto {
    #[serde(default)]
    context: Option<String>,
    state: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    target_url: Option<String>,
}

#[derive(Deserialize)]
struct CombinedStatusDto {
    state: String,
    #[serde(default)]
    statuses: Vec<StatusDto>,
}

#[derive(Deserialize)]
struct MergeDto {
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct StatusBody<'a> {
    state: &'static str,
    context: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_url: Option<&'a str>,
}

#[derive(Serialize)]
struct MergeBody<'a> {
    merge_method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit_title: Option<&'a str>,
}

#[async_trait]
impl GitHubClient for OctocrabClient {
    async fn fetch_open_pull_requests(&self) -> anyhow::Result<Vec<PullRequest>> {
        debug!("Fetching open PRs for {}/{}", self.owner, self.repo);

        let route = self.route("pulls");
        let pulls: Vec<PullDto> = self.get_all_pages(&route, Some("open")).await?;
        let mut prs: Vec<PullRequest> = pulls.into_iter().map(convert_pull_request).collect();

        // Sort by PR number for stable ordering
        prs.sort_by_key(|pr| pr.number);

        debug!("Fetched {} PRs for {}/{}", prs.len(), self.owner, self.repo);
        Ok(prs)
    }

    async fn fetch_pull_request(&self, number: u64) -> anyhow::Result<PullRequest> {
        debug!("Fetching PR #{} for {}/{}", number, self.owner, self.repo);

        let route = self.route(&format!("pulls/{}", number));
        let pull: PullDto = self
            .octocrab
            .get(&route, None::<&()>)
            .await
            .with_context(|| format!("GET {}", route))?;

        Ok(convert_pull_request(pull))
    }

    async fn fetch_commits(&self, number: u64) -> anyhow::Result<Vec<Commit>> {
        let route = self.route(&format!("pulls/{}/commits", number));
        let commits: Vec<CommitDto> = self.get_all_pages(&route, None).await?;

        Ok(commits
            .into_iter()
            .map(|c| Commit {
                sha: c.sha,
                committed_at: c
                    .commit
                    .committer
                    .and_then(|d| d.date)
                    .or_else(|| c.commit.author.and_then(|d| d.date)),
            })
            .collect())
    }

    async fn fetch_events(&self, number: u64) -> anyhow::Result<Vec<IssueEvent>> {
        let route = self.route(&format!("issues/{}/events", number));
        let events: Vec<EventDto> = self.get_all_pages(&route, None).await?;

        Ok(events
            .into_iter()
            .map(|e| IssueEvent {
                kind: IssueEventKind::from_api(&e.event),
                actor: e.actor.map(|a| a.login),
                label: e.label.map(|l| l.name),
                created_at: e.created_at,
            })
            .collect())
    }

    async fn fetch_combined_status(&self, sha: &str) -> anyhow::Result<CombinedStatus> {
        debug!(
            "Fetching commit status for {}/{} @ {}",
            self.owner, self.repo, sha
        );

        // Use raw GET request since octocrab's Reference type doesn't support commit SHAs
        let route = self.route(&format!("commits/{}/status", sha));
        let status: CombinedStatusDto = self
            .octocrab
            .get(&route, None::<&()>)
            .await
            .with_context(|| format!("GET {}", route))?;

        Ok(CombinedStatus {
            state: CheckState::from_api(&status.state),
            statuses: status
                .statuses
                .into_iter()
                .map(|s| CommitStatus {
                    context: s.context.unwrap_or_else(|| "unknown".to_string()),
                    state: CheckState::from_api(&s.state),
                    description: s.description,
                    target_url: s.target_url,
                })
                .collect(),
        })
    }

    async fn post_comment(&self, number: u64, body: &str) -> anyhow::Result<()> {
        debug!("Commenting on PR #{}", number);

        let route = self.route(&format!("issues/{}/comments", number));
        let _: serde_json::Value = self
            .octocrab
            .post(&route, Some(&CommentBody { body }))
            .await
            .with_context(|| format!("POST {}", route))?;
        Ok(())
    }

    async fn set_commit_status(&self, sha: &str, status: &NewCommitStatus) -> anyhow::Result<()> {
        let route = self.route(&format!("statuses/{}", sha));
        let body = StatusBody {
            state: status.state.as_str(),
            context: &status.context,
            description: &status.description,
            target_url: status.target_url.as_deref(),
        };
        let _: serde_json::Value = self
            .octocrab
            .post(&route, Some(&body))
            .await
            .with_context(|| format!("POST {}", route))?;
        Ok(())
    }

    async fn merge_pull_request(
        &self,
        number: u64,
        merge_method: MergeMethod,
        commit_title: Option<&str>,
    ) -> anyhow::Result<MergeResult> {
        debug!("Merging PR #{} ({})", number, merge_method.as_str());

        let route = self.route(&format!("pulls/{}/merge", number));
        let body = MergeBody {
            merge_method: merge_method.as_str(),
            commit_title,
        };
        let result: MergeDto = self
            .octocrab
            .put(&route, Some(&body))
            .await
            .with_context(|| format!("PUT {}", route))?;

        Ok(MergeResult {
            merged: result.merged,
            sha: result.sha,
            message: result.message,
        })
    }
}

/// Convert the wire PR into our PullRequest type
fn convert_pull_request(pr: PullDto) -> PullRequest {
    PullRequest {
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        author: pr
            .user
            .map(|u| u.login)
            .unwrap_or_else(|| "unknown".to_string()),
        head_sha: pr.head.sha,
        base_branch: pr.base.ref_field,
        mergeable: pr.mergeable,
        merged: pr.merged.unwrap_or(false),
        labels: pr.labels.into_iter().map(|l| l.name).collect(),
        html_url: pr.html_url.unwrap_or_default(),
    }
}
