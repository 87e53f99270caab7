use thiserror::Error;

/// Errors talking to Jenkins or the artifact bucket
#[derive(Debug, Error)]
pub enum CiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

pub type CiResult<T> = std::result::Result<T, CiError>;
