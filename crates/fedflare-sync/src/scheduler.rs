//! The iteration pipeline and the loop that repeats it.

use std::collections::HashSet;
use std::time::Duration;

use fedflare_fetch::HttpClient;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::discovery::Discovery;
use crate::error::{DiscoveryError, SetupError};
use crate::freshness::{FreshnessCheck, Verdict};
use crate::location::UrlScheme;
use crate::purge::{InvalidationReport, Invalidator, ZoneId};
use crate::warm::{CacheStatusAlert, WarmReport, Warmer};

/// What one iteration found and did.
#[derive(Debug, Default)]
pub struct IterationSummary {
    pub checked: usize,
    pub fresh: usize,
    pub stale: usize,
    pub indeterminate: usize,
    /// Locations whose comparison failed after retries.
    pub skipped: usize,
    /// CDN URLs handed to the invalidator, in submission order.
    pub invalidated: Vec<String>,
    pub invalidation: InvalidationReport,
    pub warm: WarmReport,
}

impl IterationSummary {
    pub fn cache_status_alert(&self) -> Option<CacheStatusAlert> {
        self.warm.alert()
    }

    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Fresh => self.fresh += 1,
            Verdict::Stale => self.stale += 1,
            Verdict::Indeterminate => self.indeterminate += 1,
        }
    }
}

/// One discovery, comparison, invalidation and warm pass, strictly in sequence.
pub struct Pipeline<C> {
    discovery: Box<dyn Discovery>,
    freshness: Box<dyn FreshnessCheck>,
    invalidator: Invalidator,
    warmer: Warmer<C>,
    urls: UrlScheme,
}

impl<C: HttpClient> Pipeline<C> {
    pub fn new(
        discovery: Box<dyn Discovery>,
        freshness: Box<dyn FreshnessCheck>,
        invalidator: Invalidator,
        warmer: Warmer<C>,
        urls: UrlScheme,
    ) -> Self {
        Self {
            discovery,
            freshness,
            invalidator,
            warmer,
            urls,
        }
    }

    pub fn invalidator(&self) -> &Invalidator {
        &self.invalidator
    }

    /// Run one iteration against an already resolved zone.
    ///
    /// Only discovery can fail the iteration; per-location, per-batch and
    /// per-URL failures are logged and recorded in the summary.
    pub async fn run_iteration(&self, zone: &ZoneId) -> Result<IterationSummary, DiscoveryError> {
        let locations = self.discovery.discover().await?;
        info!(
            discovery = self.discovery.name(),
            strategy = self.freshness.name(),
            locations = locations.len(),
            "checking locations"
        );

        let mut summary = IterationSummary::default();
        let mut queued = HashSet::new();
        let mut warm_urls = Vec::new();
        let mut warm_seen = HashSet::new();

        for location in &locations {
            let target = self.urls.target(location);
            for url in target.cdn_urls() {
                if warm_seen.insert(url.to_string()) {
                    warm_urls.push(url.to_string());
                }
            }

            summary.checked += 1;
            let verdict = match self.freshness.check(&target).await {
                Ok(verdict) => verdict,
                Err(err) => {
                    warn!(%location, error = %err, "comparison failed, skipping location");
                    summary.skipped += 1;
                    continue;
                }
            };
            summary.record(verdict);

            if verdict.needs_invalidation() {
                info!(%location, %verdict, "needs invalidation");
                for url in target.cdn_urls() {
                    if queued.insert(url.to_string()) {
                        summary.invalidated.push(url.to_string());
                    }
                }
            }
        }

        summary.invalidation = self.invalidator.invalidate(zone, &summary.invalidated).await;
        summary.warm = self.warmer.warm(&warm_urls).await;

        info!(
            checked = summary.checked,
            fresh = summary.fresh,
            stale = summary.stale,
            indeterminate = summary.indeterminate,
            skipped = summary.skipped,
            batches_submitted = summary.invalidation.submitted,
            batches_failed = summary.invalidation.failures.len(),
            warmed = summary.warm.warmed(),
            warm_error_statuses = summary.warm.error_statuses(),
            warm_failures = summary.warm.failures().count(),
            "iteration complete"
        );
        Ok(summary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Once,
    Service { interval: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Sleeping,
    Stopped,
}

#[derive(Debug, Default)]
pub struct RunOutcome {
    pub iterations: u64,
    /// Result of the last iteration that ran.
    pub last: Option<Result<IterationSummary, DiscoveryError>>,
}

impl RunOutcome {
    pub fn last_summary(&self) -> Option<&IterationSummary> {
        self.last.as_ref().and_then(|last| last.as_ref().ok())
    }
}

pub struct Scheduler<C> {
    pipeline: Pipeline<C>,
    domain: String,
    mode: Mode,
    state: SchedulerState,
}

impl<C: HttpClient> Scheduler<C> {
    pub fn new(pipeline: Pipeline<C>, domain: impl Into<String>, mode: Mode) -> Self {
        Self {
            pipeline,
            domain: domain.into(),
            mode,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Resolve the zone, then run iterations until the mode or `shutdown`
    /// says stop.
    ///
    /// `shutdown` is observed only between iterations and during the sleep;
    /// a running iteration always completes. Only zone resolution is fatal.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<RunOutcome, SetupError> {
        let zone = match self.pipeline.invalidator().provider().resolve_zone(&self.domain).await {
            Ok(zone) => zone,
            Err(source) => {
                self.state = SchedulerState::Stopped;
                return Err(SetupError::Zone {
                    domain: self.domain.clone(),
                    source,
                });
            }
        };
        info!(domain = %self.domain, %zone, "resolved zone");

        let mut outcome = RunOutcome::default();
        while !shutdown.is_cancelled() {
            self.state = SchedulerState::Running;
            outcome.iterations += 1;

            let span = info_span!("iteration", number = outcome.iterations);
            let result = self.pipeline.run_iteration(&zone).instrument(span).await;
            if let Err(err) = &result {
                error!(error = %err, "iteration failed");
            }
            outcome.last = Some(result);

            let Mode::Service { interval } = self.mode else {
                break;
            };
            if shutdown.is_cancelled() {
                break;
            }

            self.state = SchedulerState::Sleeping;
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(iterations = outcome.iterations, "stopped");
        self.state = SchedulerState::Stopped;
        Ok(outcome)
    }
}
