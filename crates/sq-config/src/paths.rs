//! Configuration file locations
//!
//! Uses XDG directories via `dirs` crate.
//!
//! Platform-specific locations:
//! - Linux: `~/.config/submit-queue/config.toml`
//! - macOS: `~/Library/Application Support/submit-queue/config.toml`
//! - Windows: `%APPDATA%\submit-queue\config.toml`

use std::path::PathBuf;

const APP_NAME: &str = "submit-queue";

/// Config file name looked up in the current working directory
pub const LOCAL_CONFIG_FILE: &str = ".submit-queue.toml";

/// Path to the local config file (in CWD)
pub fn local_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(LOCAL_CONFIG_FILE))
}

/// Path to the user-wide config file, if the platform has a config dir
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join(APP_NAME).join("config.toml"))
}

/// Candidate config files in lookup order
pub fn config_search_paths() -> Vec<PathBuf> {
    local_config_path()
        .into_iter()
        .chain(user_config_path())
        .collect()
}
