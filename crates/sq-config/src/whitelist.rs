//! Operator whitelist file
//!
//! One GitHub login per line. Blank lines and `#` comments are ignored.

use crate::config_file::read_if_exists;
use crate::error::ConfigError;
use std::path::Path;

/// Parse whitelist file content
pub fn parse_whitelist(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read and parse a whitelist file; a missing file yields an empty list
pub fn load_whitelist_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    match read_if_exists(path)? {
        Some(content) => Ok(parse_whitelist(&content)),
        None => {
            log::warn!("Whitelist file {} not found", path.display());
            Ok(Vec::new())
        }
    }
}
