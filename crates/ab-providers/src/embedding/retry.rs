//! Retry policy shared by HTTP-backed providers
//!
//! Transient provider failures back off exponentially (1s, 2s, 4s) up to
//! three attempts. Non-transient errors (cancellation, invalid input) pass
//! through untouched.

use std::future::Future;
use std::time::Duration;

use ab_domain::constants::embedding::{PROVIDER_RETRY_BASE_DELAY_MS, PROVIDER_RETRY_MAX_ATTEMPTS};
use ab_domain::error::{Error, ErrorKind, Result};

fn is_transient(error: &Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::ProviderUnavailable | ErrorKind::Timeout
    )
}

/// Run `operation`, retrying transient failures with exponential backoff.
///
/// # Errors
///
/// Returns the last error once attempts are exhausted, or the first
/// non-transient error immediately.
pub async fn with_retry<T, F, Fut>(provider: &str, operation: &str, mut run: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = Duration::from_millis(PROVIDER_RETRY_BASE_DELAY_MS);
    let mut attempt = 1u32;
    loop {
        match run().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) && attempt < PROVIDER_RETRY_MAX_ATTEMPTS => {
                tracing::warn!(
                    provider,
                    operation,
                    attempt,
                    error = %e,
                    "provider call failed, backing off"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", "embed", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::provider_unavailable("test", "flaky"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.ok(), Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry("test", "embed", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::provider_unavailable("test", "down")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), PROVIDER_RETRY_MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn non_transient_errors_pass_through() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry("test", "embed", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Cancelled) }
        })
        .await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
