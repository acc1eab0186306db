//! Error types for fedflare-sync.
//!
//! Each type marks how far a failure reaches: a [`SetupError`] ends the whole
//! run, a [`DiscoveryError`] ends the current iteration, and the remaining
//! types cost one location, batch or URL while the run carries on.

use std::path::PathBuf;

use fedflare_fetch::FetchError;
use thiserror::Error;

/// Failure talking to the CDN provider's management API.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Transport(String),

    #[error("provider API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("provider response could not be decoded: {0}")]
    Decode(String),

    #[error("no zone found for {0}")]
    ZoneNotFound(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] figment::Error),

    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("unknown project `{0}`: no repository catalog is defined for it")]
    UnknownProject(String),

    #[error(
        "no provider credentials: set CLOUDFLARE_API_TOKEN, or CF_API_EMAIL and CF_API_KEY"
    )]
    MissingCredentials,
}

/// Fatal to the whole run.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to resolve zone for {domain}: {source}")]
    Zone {
        domain: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] FetchError),

    #[error("failed to build provider client: {0}")]
    Provider(#[source] ProviderError),

    #[error("failed to open response cache at {}: {source}", path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Fatal to the current iteration only.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to fetch manifest {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("manifest {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// One location could not be compared; it is skipped this iteration.
#[derive(Debug, Error)]
#[error("freshness check of {url} failed: {source}")]
pub struct ComparisonError {
    pub url: String,
    #[source]
    pub source: FetchError,
}

/// One invalidation batch was rejected; later batches still go out.
#[derive(Debug, Error)]
#[error("invalidation batch {batch} ({urls} URLs) failed: {source}")]
pub struct InvalidationError {
    pub batch: usize,
    pub urls: usize,
    #[source]
    pub source: ProviderError,
}

/// One URL could not be warmed, even after its retry.
#[derive(Debug, Error)]
#[error("warming {url} failed after {attempts} attempts: {source}")]
pub struct WarmError {
    pub url: String,
    pub attempts: u32,
    #[source]
    pub source: FetchError,
}
