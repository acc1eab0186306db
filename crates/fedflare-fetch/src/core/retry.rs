use std::time::Duration;

/// Statuses a server returns while it is overloaded or restarting.
const RETRYABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Calculate the delay before a retry attempt using exponential backoff.
///
/// The delay formula is: `base * 2^retry_count`
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fedflare_fetch::retry_delay;
///
/// // First retry: base * 2^0 = base
/// assert_eq!(retry_delay(0, Duration::from_millis(500)), Duration::from_millis(500));
///
/// // Third retry: base * 2^2 = base * 4
/// assert_eq!(retry_delay(2, Duration::from_millis(500)), Duration::from_secs(2));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier)
}

/// Whether a response status warrants repeating the request.
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_per_retry() {
        let base = Duration::from_millis(100);

        assert_eq!(retry_delay(0, base), Duration::from_millis(100));
        assert_eq!(retry_delay(1, base), Duration::from_millis(200));
        assert_eq!(retry_delay(2, base), Duration::from_millis(400));
        assert_eq!(retry_delay(3, base), Duration::from_millis(800));
    }

    #[test]
    fn zero_base_never_waits() {
        let base = Duration::ZERO;

        assert_eq!(retry_delay(0, base), Duration::ZERO);
        assert_eq!(retry_delay(10, base), Duration::ZERO);
    }

    #[test]
    fn delay_saturates_on_overflow() {
        let base = Duration::from_secs(u64::MAX / 2);

        let delay = retry_delay(40, base);
        assert_eq!(delay, Duration::MAX);
    }

    #[test]
    fn retryable_statuses() {
        for status in [500, 502, 503, 504] {
            assert!(is_retryable_status(status), "{status}");
        }
        for status in [200, 304, 404, 429, 501] {
            assert!(!is_retryable_status(status), "{status}");
        }
    }
}
