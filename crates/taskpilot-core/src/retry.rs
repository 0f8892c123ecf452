//! Bounded exponential-backoff retry around a single provider call.

use std::future::Future;
use std::time::Duration;

use taskpilot_provider::ProviderError;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Message fragments that mark a failure as transient.
const TRANSIENT_PHRASES: &[&str] = &[
    "rate limit",
    "rate_limit",
    "overloaded",
    "service temporarily unavailable",
    "timeout",
    "timed out",
    "network error",
];

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry `retry` (0-indexed): `base_delay * 2^retry`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Whether `error` is worth another attempt.
pub fn is_retryable(error: &ProviderError) -> bool {
    match error {
        ProviderError::Auth(_)
        | ProviderError::InvalidModel(_)
        | ProviderError::UnsupportedCapability { .. }
        | ProviderError::ObjectNameMismatch { .. }
        | ProviderError::InvalidObject(_)
        | ProviderError::Serialization(_) => false,
        ProviderError::Http(_) if error.is_network_failure() => true,
        other => {
            if other.status().is_some_and(is_retryable_status) {
                return true;
            }
            let message = other.to_string().to_lowercase();
            TRANSIENT_PHRASES.iter().any(|p| message.contains(p))
        }
    }
}

/// Run `op` until it succeeds, fails fatally, or retries run out.
///
/// Attempts are sequential. On exhaustion the last error is returned as is.
pub async fn attempt_with_retries<F, Fut, T>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut retries = 0;

    loop {
        match op().await {
            Ok(value) => {
                if retries > 0 {
                    debug!(label, retries, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                if retries >= policy.max_retries || !is_retryable(&error) {
                    return Err(error);
                }

                let delay = policy.backoff_delay(retries);
                retries += 1;
                warn!(
                    label,
                    attempt = retries,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying after transient error"
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy::default().with_base_delay(Duration::from_millis(1))
    }

    fn api(status: u16, message: &str) -> ProviderError {
        ProviderError::Api {
            status,
            message: message.to_string(),
            body: None,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(4000));
    }

    #[test]
    fn test_classification() {
        assert!(is_retryable(&api(429, "slow down")));
        assert!(is_retryable(&api(503, "unavailable")));
        assert!(is_retryable(&api(400, "Model is overloaded")));
        assert!(is_retryable(&ProviderError::StreamError(
            "Rate limit reached".to_string()
        )));
        assert!(!is_retryable(&api(400, "bad request")));
        assert!(!is_retryable(&ProviderError::Auth("invalid key".to_string())));
        assert!(!is_retryable(&ProviderError::InvalidObject(
            "timeout field missing".to_string()
        )));
    }

    #[tokio::test]
    async fn test_transient_exhausts_retries() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = attempt_with_retries(&fast(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(api(429, "rate limit")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(ProviderError::Api { status: 429, .. })));
    }

    #[tokio::test]
    async fn test_fatal_runs_once() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = attempt_with_retries(&fast(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(api(400, "invalid request")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_recovers_after_transient() {
        let calls = AtomicUsize::new(0);
        let result = attempt_with_retries(&fast().with_max_retries(3), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(api(500, "internal"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
