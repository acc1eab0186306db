//! Batched invalidation of stale CDN URLs.
//!
//! The provider is injected as a [`PurgeProvider`] so runs can be exercised
//! against a test double; [`CloudflareClient`] is the production provider.

mod cloudflare;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

pub use self::cloudflare::{CloudflareClient, Credentials, DEFAULT_API_BASE};
use crate::error::{InvalidationError, ProviderError};

/// Most URLs the provider accepts in one purge request.
pub const MAX_BATCH_SIZE: usize = 30;

/// Provider-side identifier of the zone serving the CDN domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZoneId(pub String);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two provider capabilities a run needs.
#[async_trait]
pub trait PurgeProvider: Send + Sync {
    /// Map a CDN domain to its zone.
    async fn resolve_zone(&self, domain: &str) -> Result<ZoneId, ProviderError>;

    /// Purge up to [`MAX_BATCH_SIZE`] URLs from the zone's cache.
    async fn purge(&self, zone: &ZoneId, urls: &[String]) -> Result<(), ProviderError>;
}

pub type ProviderHandle = Arc<dyn PurgeProvider>;

/// Split `urls` into consecutive batches of at most `size` URLs
/// (clamped to `1..=MAX_BATCH_SIZE`), preserving order.
pub fn batches(urls: &[String], size: usize) -> std::slice::Chunks<'_, String> {
    urls.chunks(size.clamp(1, MAX_BATCH_SIZE))
}

/// What one invalidation pass did.
#[derive(Debug, Default)]
pub struct InvalidationReport {
    /// Batches the provider accepted.
    pub submitted: usize,
    /// URLs in accepted batches.
    pub purged_urls: usize,
    pub failures: Vec<InvalidationError>,
}

impl InvalidationReport {
    pub fn batches(&self) -> usize {
        self.submitted + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches() == 0
    }
}

pub struct Invalidator {
    provider: ProviderHandle,
    batch_size: usize,
}

impl Invalidator {
    pub fn new(provider: ProviderHandle, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    pub fn provider(&self) -> &ProviderHandle {
        &self.provider
    }

    /// Submit one purge request per batch, in order.
    ///
    /// A rejected batch is logged and recorded; the remaining batches are
    /// still submitted. An empty list makes no provider calls.
    pub async fn invalidate(&self, zone: &ZoneId, urls: &[String]) -> InvalidationReport {
        let mut report = InvalidationReport::default();
        if urls.is_empty() {
            info!("all was synced already, nothing to invalidate");
            return report;
        }

        for (index, batch) in batches(urls, self.batch_size).enumerate() {
            let number = index + 1;
            info!(batch = number, urls = ?batch, "invalidating");
            match self.provider.purge(zone, batch).await {
                Ok(()) => {
                    report.submitted += 1;
                    report.purged_urls += batch.len();
                }
                Err(source) => {
                    let failure = InvalidationError {
                        batch: number,
                        urls: batch.len(),
                        source,
                    };
                    error!(error = %failure, "invalidation batch failed");
                    report.failures.push(failure);
                }
            }
        }
        report
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    /// Records purge calls; batches listed in `failing` (1-based) are rejected.
    #[derive(Default)]
    pub struct RecordingProvider {
        failing: HashSet<usize>,
        unknown_zone: bool,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingProvider {
        pub fn failing(batches: &[usize]) -> Self {
            Self {
                failing: batches.iter().copied().collect(),
                ..Self::default()
            }
        }

        /// Fails zone resolution for every domain.
        pub fn unknown_zone() -> Self {
            Self {
                unknown_zone: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PurgeProvider for RecordingProvider {
        async fn resolve_zone(&self, domain: &str) -> Result<ZoneId, ProviderError> {
            if self.unknown_zone {
                Err(ProviderError::ZoneNotFound(domain.to_string()))
            } else {
                Ok(ZoneId("zone-1".into()))
            }
        }

        async fn purge(&self, _zone: &ZoneId, urls: &[String]) -> Result<(), ProviderError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(urls.to_vec());
            if self.failing.contains(&calls.len()) {
                return Err(ProviderError::Api {
                    status: 400,
                    message: "1012: Request must contain one of purge_everything, files, tags"
                        .into(),
                });
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::RecordingProvider;
    use super::*;
    use proptest::prelude::*;

    fn urls(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("https://cdn.test/pub/epel/{i}/repodata/repomd.xml"))
            .collect()
    }

    proptest! {
        #[test]
        fn batching_preserves_order_and_bounds(n in 0usize..200, size in 1usize..=30) {
            let input = urls(n);
            let chunks: Vec<&[String]> = batches(&input, size).collect();

            prop_assert_eq!(chunks.len(), n.div_ceil(size));
            prop_assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= size));
            prop_assert_eq!(chunks.concat(), input);
        }
    }

    #[test]
    fn oversized_batches_are_clamped() {
        let input = urls(61);
        let sizes: Vec<usize> = batches(&input, 100).map(<[String]>::len).collect();
        assert_eq!(sizes, [30, 30, 1]);
    }

    #[tokio::test]
    async fn empty_list_makes_no_calls() {
        let provider = Arc::new(RecordingProvider::default());
        let invalidator = Invalidator::new(provider.clone(), MAX_BATCH_SIZE);

        let report = invalidator.invalidate(&ZoneId("z".into()), &[]).await;
        assert!(report.is_empty());
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_batch_does_not_block_the_next() {
        let provider = Arc::new(RecordingProvider::failing(&[1]));
        let invalidator = Invalidator::new(provider.clone(), MAX_BATCH_SIZE);
        let input = urls(45);

        let report = invalidator.invalidate(&ZoneId("z".into()), &input).await;

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], input[..30]);
        assert_eq!(calls[1], input[30..]);
        assert_eq!(report.submitted, 1);
        assert_eq!(report.purged_urls, 15);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].batch, 1);
        assert_eq!(report.failures[0].urls, 30);
    }
}
