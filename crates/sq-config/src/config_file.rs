use crate::error::ConfigError;
use crate::paths;
use std::path::{Path, PathBuf};

/// Load config file content from CWD first, then the user config dir
///
/// Returns the path and content of the first file found, None if there is
/// none. A file that exists but cannot be read is an error.
pub fn load_config_file() -> Result<Option<(PathBuf, String)>, ConfigError> {
    for path in paths::config_search_paths() {
        if let Some(content) = read_if_exists(&path)? {
            log::debug!("Loaded config from {}", path.display());
            return Ok(Some((path, content)));
        }
    }

    Ok(None)
}

/// Read a file, mapping "not found" to None
pub fn read_if_exists(path: &Path) -> Result<Option<String>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
