//! Settings, layered: built-in defaults, then a TOML file, then
//! `FEDFLARE_*` environment variables, then caller overrides (the CLI).

use std::path::{Path, PathBuf};
use std::time::Duration;

use fedflare_fetch::FetchOptions;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::purge::{DEFAULT_API_BASE, MAX_BATCH_SIZE};
use crate::warm::CacheStatusPolicy;

/// Read when no file is named explicitly, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "fedflare.toml";
pub const ENV_PREFIX: &str = "FEDFLARE_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Parse the origin's directory manifest.
    #[default]
    Listing,
    /// Enumerate the project's built-in catalog.
    Catalog,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Compare origin and CDN `Last-Modified`.
    #[default]
    Headers,
    /// Revalidate origin through the local response cache.
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub origin: String,
    pub manifest_path: String,
    pub metadata_file: String,
    pub metadata_marker: String,
    pub project: String,
    pub discovery: DiscoveryMode,
    pub strategy: Strategy,
    pub cache_dir: PathBuf,
    pub interval_secs: u64,
    pub batch_size: usize,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub manifest_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub warm_retry_delay_ms: u64,
    pub cache_status: CacheStatusPolicy,
    pub api_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: "https://dl.fedoraproject.org".into(),
            manifest_path: "/pub/DIRECTORY_SIZES.txt".into(),
            metadata_file: "repodata/repomd.xml".into(),
            metadata_marker: "repodata".into(),
            project: "epel".into(),
            discovery: DiscoveryMode::default(),
            strategy: Strategy::default(),
            cache_dir: PathBuf::from(".fedflare-cache"),
            interval_secs: 60,
            batch_size: MAX_BATCH_SIZE,
            user_agent: "libdnf".into(),
            request_timeout_secs: 5,
            manifest_timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
            warm_retry_delay_ms: 1000,
            cache_status: CacheStatusPolicy::default(),
            api_base: DEFAULT_API_BASE.into(),
        }
    }
}

impl Config {
    /// Defaults, the TOML file and the environment, without overrides.
    ///
    /// `file` must exist when given; otherwise [`DEFAULT_CONFIG_FILE`] is
    /// read if present.
    pub fn figment(file: Option<&Path>) -> Result<Figment, ConfigError> {
        let toml = match file {
            Some(path) if !path.is_file() => {
                return Err(ConfigError::Invalid {
                    key: "config",
                    reason: format!("{} does not exist", path.display()),
                });
            }
            Some(path) => Toml::file(path),
            None => Toml::file(DEFAULT_CONFIG_FILE),
        };
        Ok(Figment::from(Serialized::defaults(Config::default()))
            .merge(toml)
            .merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Load every layer, with `overrides` on top. Fields `overrides`
    /// leaves out (or serializes as absent) keep the lower layers' values.
    pub fn load(file: Option<&Path>, overrides: impl Serialize) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(file)?
            .merge(Serialized::globals(overrides))
            .extract()?;
        Ok(config)
    }

    /// Reject settings no run could work with. `service` enables the checks
    /// that only matter for repeated iterations.
    pub fn validate(&self, service: bool) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::Invalid {
                key: "batch_size",
                reason: format!("must be between 1 and {MAX_BATCH_SIZE}, got {}", self.batch_size),
            });
        }
        if service && self.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "interval_secs",
                reason: "must be positive in service mode".into(),
            });
        }
        if self.request_timeout_secs == 0 || self.manifest_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                reason: "timeouts must be positive".into(),
            });
        }
        if !(self.origin.starts_with("http://") || self.origin.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "origin",
                reason: format!("`{}` is not an http(s) URL", self.origin),
            });
        }
        if self.metadata_marker.is_empty() || self.metadata_marker.contains('/') {
            return Err(ConfigError::Invalid {
                key: "metadata_marker",
                reason: "must be a single path segment".into(),
            });
        }
        Ok(())
    }

    pub fn manifest_url(&self) -> String {
        format!(
            "{}/{}",
            self.origin.trim_end_matches('/'),
            self.manifest_path.trim_start_matches('/')
        )
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn warm_retry_delay(&self) -> Duration {
        Duration::from_millis(self.warm_retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Options for origin and CDN requests.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default()
            .max_retries(self.max_retries)
            .retry_backoff(Duration::from_millis(self.retry_backoff_ms))
            .timeout(self.request_timeout())
            .user_agent(self.user_agent.clone())
    }

    /// Like [`fetch_options`](Self::fetch_options), with the longer timeout
    /// the manifest download needs.
    pub fn manifest_fetch_options(&self) -> FetchOptions {
        self.fetch_options()
            .timeout(Duration::from_secs(self.manifest_timeout_secs))
    }
}
