//! Assembles a production [`Scheduler`] from a [`Config`].

use std::sync::Arc;

use fedflare_fetch::{CachingClient, ReqwestClient, ResponseCache, RetryingClient};
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::{Config, DiscoveryMode, Strategy};
use crate::discovery::{CatalogDiscovery, Discovery, DirectoryListing};
use crate::error::{ConfigError, SetupError};
use crate::freshness::{CacheSemantics, FreshnessCheck, HeaderComparison};
use crate::location::UrlScheme;
use crate::purge::{CloudflareClient, Credentials, Invalidator};
use crate::scheduler::{Mode, Pipeline, Scheduler};
use crate::warm::Warmer;

/// The scheduler [`build`] returns. Warming talks to the CDN directly, without
/// the retry layer, so a transient failure gets exactly one extra attempt.
pub type Engine = Scheduler<Arc<ReqwestClient>>;

/// Validate `config` and wire up clients, strategies and the provider.
///
/// No network I/O happens here; the zone is resolved when the scheduler
/// starts. The response cache directory is created for the `cache`
/// strategy.
pub async fn build(
    config: &Config,
    domain: &str,
    mode: Mode,
    credentials: Option<Credentials>,
) -> Result<Engine, SetupError> {
    config.validate(matches!(mode, Mode::Service { .. }))?;
    let credentials = credentials.ok_or(ConfigError::MissingCredentials)?;

    let options = config.fetch_options();
    let http = Arc::new(ReqwestClient::new(&options).map_err(SetupError::Client)?);
    let retrying = RetryingClient::new(http.clone(), &options);

    let discovery: Box<dyn Discovery> = match config.discovery {
        DiscoveryMode::Listing => {
            let manifest_options = config.manifest_fetch_options();
            let manifest_http = ReqwestClient::new(&manifest_options).map_err(SetupError::Client)?;
            Box::new(DirectoryListing::new(
                RetryingClient::new(manifest_http, &manifest_options),
                config.manifest_url(),
                config.metadata_marker.clone(),
                &config.project,
            ))
        }
        DiscoveryMode::Catalog => {
            let catalog = Catalog::for_project(&config.project)
                .ok_or_else(|| ConfigError::UnknownProject(config.project.clone()))?;
            Box::new(CatalogDiscovery::new(catalog))
        }
    };

    let freshness: Box<dyn FreshnessCheck> = match config.strategy {
        Strategy::Headers => Box::new(HeaderComparison::new(retrying)),
        Strategy::Cache => {
            let cache = ResponseCache::open(&config.cache_dir)
                .await
                .map_err(|source| SetupError::Cache {
                    path: config.cache_dir.clone(),
                    source,
                })?;
            debug!(dir = %config.cache_dir.display(), "opened response cache");
            Box::new(CacheSemantics::new(CachingClient::new(retrying, cache)))
        }
    };

    let provider = CloudflareClient::new(&config.api_base, credentials, config.request_timeout())
        .map_err(SetupError::Provider)?;

    info!(
        domain,
        project = %config.project,
        discovery = ?config.discovery,
        strategy = ?config.strategy,
        ?mode,
        "engine ready"
    );

    let pipeline = Pipeline::new(
        discovery,
        freshness,
        Invalidator::new(Arc::new(provider), config.batch_size),
        Warmer::new(http, config.warm_retry_delay()),
        UrlScheme::new(&config.origin, domain, &config.metadata_file),
    );
    Ok(Scheduler::new(pipeline, domain, mode))
}
