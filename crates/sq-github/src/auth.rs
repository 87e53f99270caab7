//! Credentials and octocrab construction for the watched repository

use crate::DEFAULT_HOST;
use anyhow::{bail, Context, Result};
use log::{debug, info};
use octocrab::Octocrab;
use std::path::Path;

/// Env vars checked, in order, when no token file is configured
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Read the bot token
///
/// A configured token file wins; otherwise the first non-empty variable of
/// [`TOKEN_ENV_VARS`] is used.
pub fn resolve_token(token_file: Option<&Path>) -> Result<String> {
    token_from(token_file, |key| std::env::var(key).ok())
}

fn token_from(token_file: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<String> {
    if let Some(path) = token_file {
        let token = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token file {}", path.display()))?;
        let token = token.trim();
        if token.is_empty() {
            bail!("Token file {} is empty", path.display());
        }
        debug!("Using token from {}", path.display());
        return Ok(token.to_string());
    }

    TOKEN_ENV_VARS
        .iter()
        .copied()
        .find_map(|key| env(key).filter(|t| !t.trim().is_empty()).map(|t| (key, t)))
        .map(|(key, token)| {
            debug!("Using token from {}", key);
            token.trim().to_string()
        })
        .with_context(|| {
            format!(
                "No GitHub token: set github_token_file or one of {}",
                TOKEN_ENV_VARS.join(", ")
            )
        })
}

/// REST base for `host`, None for github.com
fn api_base_uri(host: Option<&str>) -> Option<String> {
    host.filter(|h| *h != DEFAULT_HOST)
        .map(|h| format!("https://{}/api/v3", h))
}

/// Build an authenticated octocrab instance for `host` (None = github.com)
pub fn build_octocrab(host: Option<&str>, token: String) -> Result<Octocrab> {
    info!("Creating GitHub client for host: {}", host.unwrap_or(DEFAULT_HOST));

    let mut builder = Octocrab::builder().personal_token(token);
    if let Some(uri) = api_base_uri(host) {
        builder = builder.base_uri(&uri).context("Failed to set base URI")?;
    }
    builder.build().context("Failed to build Octocrab client")
}
