use anyhow::Context;
use sq_ci::{BucketArtifactStore, JenkinsClient};
use sq_config::SubmitQueueConfig;
use sq_github::{build_octocrab, resolve_token, OctocrabClient};
use std::sync::Arc;
use submit_queue::{SubmitQueue, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the logger so RUST_LOG can come from it
    let dotenv = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match dotenv {
        Ok(path) => log::debug!("Loaded .env file from: {:?}", path),
        Err(_) => log::debug!(".env file not found, will rely on environment variables"),
    }

    log::info!("Starting submit-queue");

    let config = SubmitQueueConfig::load()?;
    config.validate()?;

    let token = resolve_token(config.github_token_file.as_deref())?;
    let octocrab = build_octocrab(config.github_host.as_deref(), token)?;
    let github = Arc::new(OctocrabClient::new(
        Arc::new(octocrab),
        config.org.clone(),
        config.project.clone(),
    ));
    let jenkins = Arc::new(
        JenkinsClient::new(&config.jenkins_host).context("Failed to create Jenkins client")?,
    );
    let artifacts = Arc::new(
        BucketArtifactStore::new(&config.artifact_base_url)
            .context("Failed to create artifact store client")?,
    );

    let loop_interval = config.loop_interval();
    log::info!(
        "Watching {}/{} ({}), cycle every {:?}",
        config.org,
        config.project,
        config.target_branch,
        loop_interval
    );

    let queue = Arc::new(SubmitQueue::new(
        config,
        github,
        jenkins,
        artifacts,
        Arc::new(SystemClock),
    ));

    let mut interval = tokio::time::interval(loop_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                queue.sync().await;
                match serde_json::to_string(&queue.report()) {
                    Ok(report) => log::debug!("Queue report: {}", report),
                    Err(e) => log::warn!("Failed to serialize queue report: {}", e),
                }
                log::info!("Merge rate: {:.2}/day", queue.merge_rate());
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down submit-queue");
                return Ok(());
            }
        }
    }
}
