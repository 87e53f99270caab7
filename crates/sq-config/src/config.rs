//! Submit queue configuration
//!
//! Loaded from `.submit-queue.toml`. Every field has a default, so an empty
//! file (or no file) is a valid configuration for tests.

use crate::config_file::load_config_file;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MERGE_METHODS: &[&str] = &["merge", "squash", "rebase"];

/// Submit queue configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SubmitQueueConfig {
    /// Repository owner (e.g., "kubernetes")
    pub org: String,

    /// Repository name
    pub project: String,

    /// GitHub host, None for github.com
    pub github_host: Option<String>,

    /// File holding the bot token; GITHUB_TOKEN / GH_TOKEN when unset
    pub github_token_file: Option<PathBuf>,

    /// Only pull requests against this branch are considered
    pub target_branch: String,

    /// Status contexts that must be success before a PR is queued
    pub required_status_contexts: Vec<String>,

    /// Context reported by the E2E job re-run by the retest comment
    pub e2e_status_context: String,

    /// Context reported by the unit/integration job re-run by the retest comment
    pub unit_status_context: String,

    /// Context the submit queue writes its own status under
    pub submit_status_context: String,

    /// Bot addressed by the retest comment
    pub ci_bot_name: String,

    /// Jenkins jobs that must be stable for the queue to move
    pub job_names: Vec<String>,

    /// Jobs judged by the weak-stability analysis of their artifacts
    pub weak_stable_job_names: Vec<String>,

    /// Number of recent runs inspected for weak stability
    pub weak_stable_window: usize,

    /// Users whose PRs don't need the ok-to-merge label
    pub whitelist: Vec<String>,

    /// Additional whitelist file, re-read every cycle
    pub whitelist_file: Option<PathBuf>,

    /// Jenkins base URL
    pub jenkins_host: String,

    /// Base URL of the build-artifact bucket
    pub artifact_base_url: String,

    pub loop_interval_secs: u64,
    pub e2e_poll_interval_ms: u64,
    pub pending_wait_secs: u64,
    pub retry_interval_ms: u64,
    pub retry_timeout_ms: u64,
    pub merge_rate_time_constant_mins: u64,
    pub health_retention_hours: u64,

    /// Number of status transitions kept in the history
    pub status_history_limit: usize,

    /// One of "merge", "squash", "rebase"
    pub merge_method: String,

    /// Link attached to published statuses (e.g., the queue dashboard)
    pub status_url: Option<String>,
}

impl Default for SubmitQueueConfig {
    fn default() -> Self {
        Self {
            org: String::new(),
            project: String::new(),
            github_host: None,
            github_token_file: None,
            target_branch: "master".to_string(),
            required_status_contexts: vec!["Jenkins unit/integration".to_string()],
            e2e_status_context: "Jenkins GCE e2e".to_string(),
            unit_status_context: "Jenkins unit/integration".to_string(),
            submit_status_context: "Submit Queue".to_string(),
            ci_bot_name: "k8s-bot".to_string(),
            job_names: Vec::new(),
            weak_stable_job_names: Vec::new(),
            weak_stable_window: 3,
            whitelist: Vec::new(),
            whitelist_file: None,
            jenkins_host: String::new(),
            artifact_base_url: String::new(),
            loop_interval_secs: 60,
            e2e_poll_interval_ms: 30_000,
            pending_wait_secs: 600,
            retry_interval_ms: 1_000,
            retry_timeout_ms: 10_000,
            merge_rate_time_constant_mins: 200,
            health_retention_hours: 24,
            status_history_limit: 128,
            merge_method: "squash".to_string(),
            status_url: None,
        }
    }
}

impl SubmitQueueConfig {
    /// Load config from CWD first, then the user config dir, or use defaults
    pub fn load() -> Result<Self, ConfigError> {
        match load_config_file()? {
            Some((path, content)) => {
                let config = Self::parse(&path, &content)?;
                log::info!("Loaded submit queue config from {}", path.display());
                Ok(config)
            }
            None => {
                log::debug!("Using default submit queue config");
                Ok(Self::default())
            }
        }
    }

    /// Load config from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the values a running queue cannot do without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.org.is_empty() || self.project.is_empty() {
            return Err(ConfigError::Invalid {
                key: "org/project",
                reason: "repository coordinates are required".to_string(),
            });
        }
        if !MERGE_METHODS.contains(&self.merge_method.as_str()) {
            return Err(ConfigError::Invalid {
                key: "merge_method",
                reason: format!("expected one of {:?}, got {:?}", MERGE_METHODS, self.merge_method),
            });
        }
        if self.weak_stable_window == 0 {
            return Err(ConfigError::Invalid {
                key: "weak_stable_window",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.status_history_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "status_history_limit",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_secs(self.loop_interval_secs)
    }

    pub fn e2e_poll_interval(&self) -> Duration {
        Duration::from_millis(self.e2e_poll_interval_ms)
    }

    pub fn pending_wait(&self) -> Duration {
        Duration::from_secs(self.pending_wait_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_millis(self.retry_timeout_ms)
    }

    /// Time constant T of the merge-rate estimator
    pub fn merge_rate_time_constant(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.merge_rate_time_constant_mins as i64)
    }

    pub fn health_retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.health_retention_hours as i64)
    }
}
