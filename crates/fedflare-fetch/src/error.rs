//! Error types for fedflare-fetch.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("body transfer from {url} failed: {message}")]
    Body { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("max retries exceeded ({count} attempts): {source}")]
    MaxRetriesExceeded {
        count: u32,
        #[source]
        source: Box<FetchError>,
    },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("response cache I/O error: {0}")]
    CacheIo(#[from] io::Error),

    #[error("response cache entry is not valid JSON: {0}")]
    CacheEntry(#[from] serde_json::Error),
}

impl FetchError {
    /// Returns `true` for failures a repeated request may not hit again:
    /// refused or reset connections, timeouts and truncated transfers.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Timeout { .. } | Self::Body { .. }
        )
    }
}
