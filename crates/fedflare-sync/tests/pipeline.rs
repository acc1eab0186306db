use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fedflare_fetch::mock::{Method, MockHttpClient, MockReply};
use fedflare_sync::discovery::{DirectoryListing, Discovery};
use fedflare_sync::freshness::HeaderComparison;
use fedflare_sync::purge::{Invalidator, PurgeProvider, ZoneId};
use fedflare_sync::warm::Warmer;
use fedflare_sync::{
    DiscoveryError, Mode, Pipeline, ProviderError, RepositoryLocation, Scheduler, UrlScheme,
};
use tokio_util::sync::CancellationToken;

const ORIGIN: &str = "https://dl.test";
const CDN: &str = "https://cdn.test";
const MANIFEST: &str = "https://dl.test/pub/DIRECTORY_SIZES.txt";
const FILE: &str = "repodata/repomd.xml";
const OLD: &str = "Mon, 01 Jan 2024 00:00:00 GMT";
const NEW: &str = "Tue, 02 Jan 2024 00:00:00 GMT";

#[derive(Default)]
struct RecordingProvider {
    failing: HashSet<usize>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingProvider {
    fn failing(batches: &[usize]) -> Self {
        Self {
            failing: batches.iter().copied().collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PurgeProvider for RecordingProvider {
    async fn resolve_zone(&self, _domain: &str) -> Result<ZoneId, ProviderError> {
        Ok(ZoneId("023e105f4ecef8ad9ca31a8372d0c353".into()))
    }

    async fn purge(&self, _zone: &ZoneId, urls: &[String]) -> Result<(), ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(urls.to_vec());
        if self.failing.contains(&calls.len()) {
            return Err(ProviderError::Transport("connection reset".into()));
        }
        Ok(())
    }
}

/// Returns fixed locations, optionally firing a shutdown token mid-iteration.
struct Fixed {
    locations: Vec<RepositoryLocation>,
    cancel_on_discover: Option<CancellationToken>,
}

#[async_trait]
impl Discovery for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn discover(&self) -> Result<Vec<RepositoryLocation>, DiscoveryError> {
        if let Some(token) = &self.cancel_on_discover {
            token.cancel();
        }
        Ok(self.locations.clone())
    }
}

fn url(base: &str, path: &str) -> String {
    format!("{base}{path}/{FILE}")
}

fn last_modified(http: &MockHttpClient, base: &str, path: &str, value: &str) {
    http.set(
        Method::Head,
        &url(base, path),
        vec![MockReply::ok().header("Last-Modified", value)],
    );
}

fn pipeline(
    discovery: Box<dyn Discovery>,
    http: &Arc<MockHttpClient>,
    provider: &Arc<RecordingProvider>,
) -> Pipeline<Arc<MockHttpClient>> {
    Pipeline::new(
        discovery,
        Box::new(HeaderComparison::new(http.clone())),
        Invalidator::new(provider.clone(), 30),
        Warmer::new(http.clone(), Duration::ZERO),
        UrlScheme::new(ORIGIN, "cdn.test", FILE),
    )
}

#[tokio::test]
async fn manifest_to_invalidation_to_warm() {
    let fresh = "/pub/epel/8/Everything/x86_64";
    let stale = "/pub/epel/8/Everything/SRPMS";
    let manifest = "\
        4.0K\t/pub/epel/8/Everything/x86_64/repodata/repomd.xml\n\
        \n\
        1.2M\t/pub/fedora/linux/releases/39/Everything/x86_64/os/repodata/repomd.xml\n\
        8.0K\t/pub/epel/8/Everything/SRPMS/repodata/repomd.xml\n\
        4.0K\t/pub/epel/8/Everything/x86_64/repodata/repomd.xml\n\
        12K\t/pub/epel/8/Everything/x86_64/Packages\n";

    let http = Arc::new(
        MockHttpClient::new().on_get(MANIFEST, MockReply::ok().body(manifest)),
    );
    last_modified(&http, ORIGIN, fresh, OLD);
    last_modified(&http, CDN, fresh, OLD);
    last_modified(&http, ORIGIN, stale, NEW);
    last_modified(&http, CDN, stale, OLD);
    for path in [fresh, stale] {
        http.set(
            Method::Get,
            &url(CDN, path),
            vec![MockReply::ok().header("cf-cache-status", "MISS")],
        );
    }
    let provider = Arc::new(RecordingProvider::default());
    let discovery = DirectoryListing::new(http.clone(), MANIFEST, "repodata", "epel");

    let summary = pipeline(Box::new(discovery), &http, &provider)
        .run_iteration(&ZoneId("zone".into()))
        .await
        .unwrap();

    assert_eq!(summary.checked, 2);
    assert_eq!(provider.calls(), vec![vec![url(CDN, stale)]]);
    assert_eq!(http.calls(Method::Get, &url(CDN, fresh)), 1);
    assert_eq!(http.calls(Method::Get, &url(CDN, stale)), 1);
    assert_eq!(summary.warm.warmed(), 2);
    assert_eq!(summary.cache_status_alert(), None);
}

#[tokio::test]
async fn failed_batch_does_not_stop_the_next() {
    let locations: Vec<_> = (0..45)
        .map(|i| RepositoryLocation::new(format!("/pub/epel/r{i}/x86_64")))
        .collect();
    let expected: Vec<_> = locations.iter().map(|l| url(CDN, l.path())).collect();
    // Unrouted HEADs carry no Last-Modified, so every location is indeterminate.
    let http = Arc::new(MockHttpClient::new());
    let provider = Arc::new(RecordingProvider::failing(&[1]));
    let discovery = Fixed {
        locations,
        cancel_on_discover: None,
    };

    let summary = pipeline(Box::new(discovery), &http, &provider)
        .run_iteration(&ZoneId("zone".into()))
        .await
        .unwrap();

    let calls = provider.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], expected[..30]);
    assert_eq!(calls[1], expected[30..]);
    assert_eq!(summary.indeterminate, 45);
    assert_eq!(summary.invalidation.submitted, 1);
    assert_eq!(summary.invalidation.purged_urls, 15);
    assert_eq!(summary.invalidation.failures.len(), 1);
    assert_eq!(summary.invalidation.failures[0].batch, 1);
    assert_eq!(summary.warm.results.len(), 45);
}

#[tokio::test]
async fn shutdown_during_iteration_lets_it_finish() {
    let path = "/pub/epel/8/Everything/aarch64";
    let http = Arc::new(MockHttpClient::new());
    last_modified(&http, ORIGIN, path, NEW);
    last_modified(&http, CDN, path, OLD);
    let provider = Arc::new(RecordingProvider::default());
    let shutdown = CancellationToken::new();
    let discovery = Fixed {
        locations: vec![RepositoryLocation::new(path)],
        cancel_on_discover: Some(shutdown.clone()),
    };
    let mut scheduler = Scheduler::new(
        pipeline(Box::new(discovery), &http, &provider),
        "cdn.test",
        Mode::Service {
            interval: Duration::from_secs(3600),
        },
    );

    let outcome = tokio::time::timeout(Duration::from_secs(5), scheduler.run(shutdown))
        .await
        .expect("scheduler did not stop")
        .unwrap();

    assert_eq!(outcome.iterations, 1);
    assert_eq!(provider.calls(), vec![vec![url(CDN, path)]]);
    assert_eq!(http.calls(Method::Get, &url(CDN, path)), 1);
}

#[tokio::test]
async fn shutdown_during_sleep_stops_before_next_iteration() {
    let path = "/pub/epel/8/Everything/ppc64le";
    let warm_url = url(CDN, path);
    let http = Arc::new(MockHttpClient::new());
    let provider = Arc::new(RecordingProvider::default());
    let shutdown = CancellationToken::new();
    let discovery = Fixed {
        locations: vec![RepositoryLocation::new(path)],
        cancel_on_discover: None,
    };
    let mut scheduler = Scheduler::new(
        pipeline(Box::new(discovery), &http, &provider),
        "cdn.test",
        Mode::Service {
            interval: Duration::from_secs(3600),
        },
    );

    let token = shutdown.clone();
    let handle = tokio::spawn(async move { scheduler.run(token).await.map(|o| o.iterations) });

    tokio::time::timeout(Duration::from_secs(5), async {
        while http.calls(Method::Get, &warm_url) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first iteration never warmed");
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.cancel();

    let iterations = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(iterations, 1);
    assert_eq!(provider.calls().len(), 1);
    assert_eq!(http.calls(Method::Get, &warm_url), 1);
}
