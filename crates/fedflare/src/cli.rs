use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use fedflare_sync::config::{DiscoveryMode, Strategy};
use fedflare_sync::warm::CacheStatusPolicy;
use serde::Serialize;

#[derive(Clone, Debug, Parser)]
#[command(name = "fedflare", version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
pub struct Cli {
    /// CDN-fronted hostname to keep in sync, e.g. `epel.example.com`
    pub domain: String,

    /// Repository group to sync [default: epel]
    #[arg(long, short)]
    pub project: Option<String>,

    /// Keep polling instead of running a single iteration
    #[arg(long)]
    pub service: bool,

    /// Seconds between iterations in service mode [default: 60]
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// How to find repository locations [default: listing]
    #[arg(long, value_enum)]
    pub discovery: Option<DiscoveryArg>,

    /// How to decide a location changed [default: headers]
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Response cache directory for the `cache` strategy
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// URLs per purge request, at most 30
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// What a missing or bypassed CDN cache status does [default: warn]
    #[arg(long, value_enum)]
    pub on_cache_status: Option<PolicyArg>,

    /// TOML settings file [default: ./fedflare.toml if present]
    #[arg(long, short, env = "FEDFLARE_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DiscoveryArg {
    Listing,
    Catalog,
}

impl From<DiscoveryArg> for DiscoveryMode {
    fn from(arg: DiscoveryArg) -> Self {
        match arg {
            DiscoveryArg::Listing => Self::Listing,
            DiscoveryArg::Catalog => Self::Catalog,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Headers,
    Cache,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Headers => Self::Headers,
            StrategyArg::Cache => Self::Cache,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Warn,
    Fail,
}

impl From<PolicyArg> for CacheStatusPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Warn => Self::Warn,
            PolicyArg::Fail => Self::Fail,
        }
    }
}

/// The flags given on the command line, as the top configuration layer.
#[derive(Debug, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_status: Option<CacheStatusPolicy>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            project: self.project.clone(),
            interval_secs: self.interval,
            discovery: self.discovery.map(Into::into),
            strategy: self.strategy.map(Into::into),
            cache_dir: self.cache_dir.clone(),
            batch_size: self.batch_size,
            cache_status: self.on_cache_status.map(Into::into),
        }
    }
}
