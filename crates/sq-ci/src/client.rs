//! CI job and artifact store traits with their HTTP implementations

use crate::error::{CiError, CiResult};
use crate::types::{BuildResult, FinishedResult, JobBuild};
use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// CI job runner (Jenkins)
#[async_trait]
pub trait JobClient: Send + Sync {
    /// Result of the most recent completed build of `job`
    async fn last_completed_build(&self, job: &str) -> CiResult<JobBuild>;
}

/// Build-artifact store (a bucket laid out as `<job>/<build>/...`)
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Number in `<job>/latest-build.txt`
    async fn latest_build_number(&self, job: &str) -> CiResult<u64>;

    /// Parsed `<job>/<build>/finished.json`
    async fn finished_result(&self, job: &str, build: u64) -> CiResult<FinishedResult>;

    /// Raw `<job>/<build>/artifacts/<file>`, None if it does not exist
    async fn artifact(&self, job: &str, build: u64, file: &str) -> CiResult<Option<Bytes>>;
}

fn http_client() -> CiResult<Client> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Jenkins JSON API client
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct JenkinsBuildDto {
    #[serde(default)]
    number: Option<u64>,
    #[serde(default)]
    result: Option<String>,
}

impl JenkinsClient {
    pub fn new(host: &str) -> CiResult<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: host.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl JobClient for JenkinsClient {
    async fn last_completed_build(&self, job: &str) -> CiResult<JobBuild> {
        let url = format!("{}/job/{}/lastCompletedBuild/api/json", self.base_url, job);
        debug!("Fetching {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(CiError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        let build: JenkinsBuildDto = response.json().await?;

        Ok(JobBuild {
            number: build.number,
            result: BuildResult::from_api(build.result.as_deref().unwrap_or_default()),
        })
    }
}

/// Artifact bucket served over plain HTTP (e.g., a public GCS bucket)
#[derive(Debug, Clone)]
pub struct BucketArtifactStore {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct FinishedDto {
    result: String,
    #[serde(default)]
    timestamp: u64,
}

impl BucketArtifactStore {
    /// `base_url` is the prefix under which job directories live
    pub fn new(base_url: &str) -> CiResult<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, path: &str) -> CiResult<Option<Bytes>> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("Fetching {}", url);

        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.bytes().await?)),
            status => Err(CiError::Status {
                url,
                status: status.as_u16(),
            }),
        }
    }

    async fn get_required(&self, path: &str) -> CiResult<Bytes> {
        self.get(path).await?.ok_or_else(|| CiError::Status {
            url: format!("{}/{}", self.base_url, path),
            status: StatusCode::NOT_FOUND.as_u16(),
        })
    }
}

#[async_trait]
impl ArtifactStore for BucketArtifactStore {
    async fn latest_build_number(&self, job: &str) -> CiResult<u64> {
        let path = format!("{}/latest-build.txt", job);
        let body = self.get_required(&path).await?;
        parse_build_number(&body).ok_or_else(|| CiError::Malformed {
            url: path,
            reason: "not a build number".to_string(),
        })
    }

    async fn finished_result(&self, job: &str, build: u64) -> CiResult<FinishedResult> {
        let path = format!("{}/{}/finished.json", job, build);
        let body = self.get_required(&path).await?;
        let finished: FinishedDto =
            serde_json::from_slice(&body).map_err(|e| CiError::Malformed {
                url: path,
                reason: e.to_string(),
            })?;

        Ok(FinishedResult {
            result: BuildResult::from_api(&finished.result),
            timestamp: finished.timestamp,
        })
    }

    async fn artifact(&self, job: &str, build: u64, file: &str) -> CiResult<Option<Bytes>> {
        self.get(&format!("{}/{}/artifacts/{}", job, build, file))
            .await
    }
}

fn parse_build_number(body: &[u8]) -> Option<u64> {
    std::str::from_utf8(body).ok()?.trim().parse().ok()
}
