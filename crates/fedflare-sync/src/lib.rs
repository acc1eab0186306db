//! Keeps CDN-cached copies of package repository metadata in step with the
//! origin mirror.
//!
//! One iteration walks a fixed pipeline:
//!
//! 1. [`discovery`] lists the repository locations published on the origin
//! 2. [`freshness`] decides for each whether the CDN copy is stale
//! 3. [`purge`] invalidates the stale CDN URLs in provider-sized batches
//! 4. [`warm`] re-requests every location so the CDN repopulates
//!
//! [`scheduler`] runs the pipeline once or on an interval until shut down.

pub mod catalog;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod freshness;
pub mod location;
pub mod purge;
pub mod scheduler;
pub mod warm;

pub use catalog::Catalog;
pub use config::Config;
pub use error::{
    ComparisonError, ConfigError, DiscoveryError, InvalidationError, ProviderError, SetupError,
    WarmError,
};
pub use location::{MetadataTarget, RepositoryLocation, UrlScheme};
pub use scheduler::{Mode, Pipeline, RunOutcome, Scheduler, SchedulerState};
