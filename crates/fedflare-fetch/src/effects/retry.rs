use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::core::{is_retryable_status, retry_delay};
use crate::data::{FetchOptions, Response};
use crate::effects::http::HttpClient;
use crate::error::{FetchError, Result};

/// Bounded retry with exponential backoff around another client.
///
/// Connection failures, timeouts, truncated bodies and 500/502/503/504
/// responses are retried up to `max_retries` times. When the budget runs
/// out the last failure is returned inside
/// [`FetchError::MaxRetriesExceeded`].
pub struct RetryingClient<C> {
    inner: C,
    max_retries: u32,
    backoff: Duration,
}

impl<C: HttpClient> RetryingClient<C> {
    pub fn new(inner: C, options: &FetchOptions) -> Self {
        Self {
            inner,
            max_retries: options.max_retries,
            backoff: options.retry_backoff,
        }
    }

    async fn with_retry<F, Fut>(&self, url: &str, attempt: F) -> Result<Response>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Response>>,
    {
        let mut retry_count = 0;
        loop {
            let outcome = attempt().await;
            let retryable = match &outcome {
                Ok(response) => is_retryable_status(response.status),
                Err(err) => err.is_transient(),
            };
            if !retryable {
                return outcome;
            }

            let failure = match outcome {
                Ok(response) => FetchError::Status {
                    url: response.url,
                    status: response.status,
                },
                Err(err) => err,
            };
            if retry_count >= self.max_retries {
                return Err(FetchError::MaxRetriesExceeded {
                    count: retry_count + 1,
                    source: Box::new(failure),
                });
            }

            let delay = retry_delay(retry_count, self.backoff);
            warn!(url, attempt = retry_count + 1, ?delay, error = %failure, "retrying request");
            tokio::time::sleep(delay).await;
            retry_count += 1;
        }
    }
}

impl<C: HttpClient> HttpClient for RetryingClient<C> {
    async fn head(&self, url: &str, headers: &[(String, String)]) -> Result<Response> {
        self.with_retry(url, || self.inner.head(url, headers)).await
    }

    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<Response> {
        self.with_retry(url, || self.inner.get(url, headers)).await
    }
}
