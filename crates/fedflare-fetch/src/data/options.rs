use std::time::Duration;

/// Configuration for HTTP requests.
///
/// # Examples
///
/// ```
/// use fedflare_fetch::FetchOptions;
/// use std::time::Duration;
///
/// let options = FetchOptions::default()
///     .max_retries(5)
///     .retry_backoff(Duration::from_millis(200))
///     .user_agent("libdnf");
/// ```
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum number of retry attempts for transient failures.
    ///
    /// - Includes only retries after the initial attempt
    /// - Retries are triggered for connection errors, timeouts, truncated
    ///   bodies and 500/502/503/504 statuses
    /// - Total attempts = 1 (initial) + max_retries
    ///
    /// Default: 3
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries.
    ///
    /// The actual delay for retry N (0-indexed) is: `retry_backoff * 2^N`
    ///
    /// Default: 500ms
    pub retry_backoff: Duration,

    /// Whole-request timeout, from connect until the body is read.
    ///
    /// Default: 5s
    pub timeout: Duration,

    /// Value of the `User-Agent` header.
    ///
    /// Default: `libdnf`, so origin mirrors treat requests like the package
    /// manager they are standing in for.
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(5),
            user_agent: "libdnf".to_string(),
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = FetchOptions::default();
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.retry_backoff, Duration::from_millis(500));
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.user_agent, "libdnf");
    }

    #[test]
    fn builders_override_defaults() {
        let options = FetchOptions::default()
            .max_retries(0)
            .timeout(Duration::from_secs(30))
            .user_agent("fedflare");
        assert_eq!(options.max_retries, 0);
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.user_agent, "fedflare");
        assert_eq!(options.retry_backoff, Duration::from_millis(500));
    }
}
