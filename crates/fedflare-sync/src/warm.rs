//! Re-requesting CDN URLs so the edge caches repopulate, and reading back
//! how the CDN handled each request.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use fedflare_fetch::HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::WarmError;

pub const CACHE_STATUS_HEADER: &str = "cf-cache-status";

/// The CDN's account of how it served a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Expired,
    Stale,
    Updating,
    Revalidated,
    Bypass,
    /// Not eligible for caching at all.
    Dynamic,
    Other(String),
}

impl CacheStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "HIT" => Self::Hit,
            "MISS" => Self::Miss,
            "EXPIRED" => Self::Expired,
            "STALE" => Self::Stale,
            "UPDATING" => Self::Updating,
            "REVALIDATED" => Self::Revalidated,
            "BYPASS" => Self::Bypass,
            "DYNAMIC" => Self::Dynamic,
            _ => Self::Other(value.trim().to_string()),
        }
    }

    /// The response skipped the cache, so warming it achieved nothing.
    pub fn bypassed_cache(&self) -> bool {
        matches!(self, Self::Bypass | Self::Dynamic)
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Expired => "EXPIRED",
            Self::Stale => "STALE",
            Self::Updating => "UPDATING",
            Self::Revalidated => "REVALIDATED",
            Self::Bypass => "BYPASS",
            Self::Dynamic => "DYNAMIC",
            Self::Other(other) => other,
        })
    }
}

/// What to do about missing or cache-bypassing status signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatusPolicy {
    /// Log and carry on.
    #[default]
    Warn,
    /// Log, and make a single-shot run exit non-zero.
    Fail,
}

impl FromStr for CacheStatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown cache status policy `{other}`")),
        }
    }
}

#[derive(Debug)]
pub enum WarmOutcome {
    /// The CDN answered with a status signal.
    Cached { http_status: u16, cache: CacheStatus },
    /// The CDN answered without a status signal.
    MissingStatus { http_status: u16 },
    Failed(WarmError),
}

impl WarmOutcome {
    /// HTTP status of the CDN's reply, if there was one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Cached { http_status, .. } | Self::MissingStatus { http_status } => Some(*http_status),
            Self::Failed(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct WarmResult {
    pub url: String,
    pub attempts: u32,
    pub outcome: WarmOutcome,
}

/// The most serious cache-status problem seen in a warm pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CacheStatusAlert {
    Missing,
    Bypassed,
}

#[derive(Debug, Default)]
pub struct WarmReport {
    pub results: Vec<WarmResult>,
}

impl WarmReport {
    /// URLs the CDN answered with a 2xx status.
    pub fn warmed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.http_status().is_some_and(|s| (200..300).contains(&s)))
            .count()
    }

    /// URLs the CDN answered, but with a non-2xx status.
    pub fn error_statuses(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.http_status().is_some_and(|s| !(200..300).contains(&s)))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &WarmError> {
        self.results.iter().filter_map(|r| match &r.outcome {
            WarmOutcome::Failed(e) => Some(e),
            _ => None,
        })
    }

    pub fn missing_status(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, WarmOutcome::MissingStatus { .. }))
            .count()
    }

    pub fn bypassed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(&r.outcome, WarmOutcome::Cached { cache, .. } if cache.bypassed_cache()))
            .count()
    }

    pub fn alert(&self) -> Option<CacheStatusAlert> {
        if self.bypassed() > 0 {
            Some(CacheStatusAlert::Bypassed)
        } else if self.missing_status() > 0 {
            Some(CacheStatusAlert::Missing)
        } else {
            None
        }
    }
}

pub struct Warmer<C> {
    client: C,
    retry_delay: Duration,
}

impl<C: HttpClient> Warmer<C> {
    /// `client` should not retry on its own: a transient failure here gets
    /// exactly one retry after `retry_delay`.
    pub fn new(client: C, retry_delay: Duration) -> Self {
        Self { client, retry_delay }
    }

    /// `GET` every URL in order. Failures are recorded per URL and never
    /// stop the pass.
    pub async fn warm(&self, urls: &[String]) -> WarmReport {
        let mut report = WarmReport::default();
        for url in urls {
            let result = self.warm_one(url).await;
            report.results.push(result);
        }
        report
    }

    async fn warm_one(&self, url: &str) -> WarmResult {
        let mut attempts = 1;
        let mut outcome = self.client.get(url, &[]).await;
        let transient = matches!(&outcome, Err(err) if err.is_transient());
        if transient {
            if let Err(err) = &outcome {
                warn!(url, error = %err, delay = ?self.retry_delay, "warm request failed, retrying once");
            }
            tokio::time::sleep(self.retry_delay).await;
            attempts += 1;
            outcome = self.client.get(url, &[]).await;
        }

        let outcome = match outcome {
            Err(source) => {
                let failure = WarmError {
                    url: url.to_string(),
                    attempts,
                    source,
                };
                error!(error = %failure, "warming failed");
                WarmOutcome::Failed(failure)
            }
            Ok(response) => {
                if !response.is_success() {
                    warn!(url, status = response.status, "warm request returned an error status");
                }
                match response.header(CACHE_STATUS_HEADER) {
                    None => {
                        warn!(
                            url,
                            "{CACHE_STATUS_HEADER} not found in response headers; \
                             the CDN may not be caching this path"
                        );
                        WarmOutcome::MissingStatus {
                            http_status: response.status,
                        }
                    }
                    Some(value) => {
                        let cache = CacheStatus::parse(value);
                        if cache.bypassed_cache() {
                            error!(
                                url,
                                %cache,
                                "response bypassed the CDN cache; is a cache-everything rule active?"
                            );
                        } else {
                            info!(url, %cache, "warmed");
                        }
                        WarmOutcome::Cached {
                            http_status: response.status,
                            cache,
                        }
                    }
                }
            }
        };

        WarmResult {
            url: url.to_string(),
            attempts,
            outcome,
        }
    }
}
