//! Staleness of the CDN copy of a metadata file relative to origin.

use std::fmt;

use async_trait::async_trait;
use fedflare_fetch::{CachingClient, HttpClient};
use tracing::debug;

use crate::error::ComparisonError;
use crate::location::MetadataTarget;

/// Outcome of comparing one location.
///
/// `Indeterminate` means a comparison signal was missing. It is invalidated
/// just like `Stale`; the separate variant keeps the reason visible in logs
/// and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Fresh,
    Stale,
    Indeterminate,
}

impl Verdict {
    pub fn needs_invalidation(self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Indeterminate => "indeterminate",
        })
    }
}

/// Compare two `Last-Modified` values verbatim.
///
/// No date parsing: any textual difference, including a different timezone
/// spelling of the same instant, counts as a change.
pub fn compare_modified(origin: Option<&str>, cdn: Option<&str>) -> Verdict {
    match (origin, cdn) {
        (Some(origin), Some(cdn)) if origin == cdn => Verdict::Fresh,
        (Some(_), Some(_)) => Verdict::Stale,
        _ => Verdict::Indeterminate,
    }
}

#[async_trait]
pub trait FreshnessCheck: Send + Sync {
    /// Strategy name, for logging.
    fn name(&self) -> &str;

    async fn check(&self, target: &MetadataTarget) -> Result<Verdict, ComparisonError>;
}

/// `HEAD` origin and CDN and compare their `Last-Modified` headers.
pub struct HeaderComparison<C> {
    client: C,
}

impl<C: HttpClient> HeaderComparison<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    async fn last_modified(&self, url: &str) -> Result<Option<String>, ComparisonError> {
        let response = self
            .client
            .head(url, &[])
            .await
            .map_err(|source| ComparisonError {
                url: url.to_string(),
                source,
            })?;
        Ok(response.last_modified().map(str::to_owned))
    }
}

#[async_trait]
impl<C: HttpClient + 'static> FreshnessCheck for HeaderComparison<C> {
    fn name(&self) -> &str {
        "headers"
    }

    async fn check(&self, target: &MetadataTarget) -> Result<Verdict, ComparisonError> {
        let origin = self.last_modified(&target.origin_url).await?;
        let cdn = self.last_modified(&target.cdn_url).await?;
        let verdict = compare_modified(origin.as_deref(), cdn.as_deref());
        debug!(
            location = %target.location,
            origin = origin.as_deref().unwrap_or("-"),
            cdn = cdn.as_deref().unwrap_or("-"),
            %verdict,
            "compared last-modified"
        );
        Ok(verdict)
    }
}

/// `GET` the origin through the local response cache.
///
/// A response the cache had to fetch anew means the origin changed since
/// the previous run; a cache hit or `304` means it did not. The CDN itself
/// is not consulted, so edge nodes holding different timestamps cannot mask
/// a change.
pub struct CacheSemantics<C> {
    client: CachingClient<C>,
}

impl<C: HttpClient> CacheSemantics<C> {
    pub fn new(client: CachingClient<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: HttpClient + 'static> FreshnessCheck for CacheSemantics<C> {
    fn name(&self) -> &str {
        "cache"
    }

    async fn check(&self, target: &MetadataTarget) -> Result<Verdict, ComparisonError> {
        let cached = self
            .client
            .get(&target.origin_url)
            .await
            .map_err(|source| ComparisonError {
                url: target.origin_url.clone(),
                source,
            })?;
        let verdict = if cached.from_cache {
            Verdict::Fresh
        } else {
            Verdict::Stale
        };
        debug!(location = %target.location, from_cache = cached.from_cache, %verdict, "checked origin cache");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{RepositoryLocation, UrlScheme};
    use fedflare_fetch::ResponseCache;
    use fedflare_fetch::mock::{Method, MockFailure, MockHttpClient, MockReply};
    use std::sync::Arc;
    use tempfile::TempDir;

    const OLD: &str = "Mon, 02 Jan 2023 10:00:00 GMT";
    const NEW: &str = "Tue, 03 Jan 2023 10:00:00 GMT";

    fn target() -> MetadataTarget {
        UrlScheme::new("https://origin.test", "cdn.test", "repodata/repomd.xml")
            .target(&RepositoryLocation::new("/pub/epel/8/Everything/x86_64"))
    }

    #[test]
    fn verdict_table() {
        assert_eq!(compare_modified(Some(OLD), Some(OLD)), Verdict::Fresh);
        assert_eq!(compare_modified(Some(OLD), Some(NEW)), Verdict::Stale);
        assert_eq!(compare_modified(None, Some(OLD)), Verdict::Indeterminate);
        assert_eq!(compare_modified(Some(OLD), None), Verdict::Indeterminate);
        assert_eq!(compare_modified(None, None), Verdict::Indeterminate);
    }

    #[test]
    fn same_instant_different_spelling_is_stale() {
        assert_eq!(
            compare_modified(Some("Mon, 02 Jan 2023 10:00:00 GMT"), Some("Mon, 02 Jan 2023 10:00:00 +0000")),
            Verdict::Stale
        );
    }

    #[test]
    fn only_fresh_is_spared() {
        assert!(!Verdict::Fresh.needs_invalidation());
        assert!(Verdict::Stale.needs_invalidation());
        assert!(Verdict::Indeterminate.needs_invalidation());
    }

    #[tokio::test]
    async fn header_strategy() {
        let target = target();
        let client = Arc::new(
            MockHttpClient::new()
                .on_head(&target.origin_url, MockReply::ok().header("Last-Modified", NEW))
                .on_head(&target.cdn_url, MockReply::ok().header("Last-Modified", OLD)),
        );
        let check = HeaderComparison::new(client.clone());

        assert_eq!(check.check(&target).await.unwrap(), Verdict::Stale);
        assert_eq!(client.calls(Method::Head, &target.origin_url), 1);
        assert_eq!(client.calls(Method::Head, &target.cdn_url), 1);
    }

    #[tokio::test]
    async fn header_strategy_missing_cdn_header() {
        let target = target();
        let client = MockHttpClient::new()
            .on_head(&target.origin_url, MockReply::ok().header("Last-Modified", NEW))
            .on_head(&target.cdn_url, MockReply::ok());
        let check = HeaderComparison::new(client);

        assert_eq!(check.check(&target).await.unwrap(), Verdict::Indeterminate);
    }

    #[tokio::test]
    async fn header_strategy_network_failure() {
        let target = target();
        let client = MockHttpClient::new()
            .on_head(&target.origin_url, MockReply::fail(MockFailure::Connect));
        let check = HeaderComparison::new(client);

        let err = check.check(&target).await.unwrap_err();
        assert_eq!(err.url, target.origin_url);
    }

    #[tokio::test]
    async fn cache_strategy() {
        let dir = TempDir::new().unwrap();
        let target = target();
        let client = Arc::new(MockHttpClient::new().on_get_sequence(
            &target.origin_url,
            vec![
                MockReply::ok().header("Last-Modified", OLD),
                MockReply::status(304),
                MockReply::ok().header("Last-Modified", NEW),
            ],
        ));
        let cache = ResponseCache::open(dir.path()).await.unwrap();
        let check = CacheSemantics::new(CachingClient::new(client.clone(), cache));

        assert_eq!(check.check(&target).await.unwrap(), Verdict::Stale);
        assert_eq!(check.check(&target).await.unwrap(), Verdict::Fresh);
        assert_eq!(check.check(&target).await.unwrap(), Verdict::Stale);
        assert_eq!(client.calls(Method::Head, &target.cdn_url), 0);
        assert_eq!(client.calls(Method::Get, &target.cdn_url), 0);
    }
}
