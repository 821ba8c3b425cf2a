//! # Resilient Call Wrapper
//!
//! Bounded timeout plus retry around a single remote call.
//!
//! Only timeouts are retried here; any other failure propagates immediately
//! so the caller can decide whether the signal (duplicate receive,
//! throttling, ...) is retryable at a higher level.

use crate::config::EngineConfig;
use crate::error::{Result, TransferError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy for one remote call site
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Total attempts before surfacing the timeout
    pub attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            timeout: cfg.call_timeout,
            attempts: cfg.call_retry_attempts,
            delay: cfg.call_retry_delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Execute `op` under the policy: retry timeouts up to the budget, then
/// surface a timeout-specific failure; propagate every other error at once.
pub async fn call_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = provider_traits::Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match tokio::time::timeout(policy.timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => return Err(TransferError::Provider(e)),
            Err(_) => {
                if attempt >= policy.attempts {
                    return Err(TransferError::Timeout { attempts: attempt });
                }
                warn!(
                    attempt,
                    budget = policy.attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    "remote call timed out, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provider_traits::ProviderError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(50),
            attempts: 3,
            delay: Duration::from_millis(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_passes_through() {
        let result: i32 = call_with_retry(&fast_policy(), || async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(result, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_retried_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = call_with_retry(&fast_policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    // first two attempts hang past the timeout
                    std::future::pending::<()>().await;
                }
                Ok::<_, ProviderError>(n)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_surfaced_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = call_with_retry(&fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                std::future::pending::<()>().await;
                unreachable!()
            }
        })
        .await;

        assert!(matches!(result, Err(TransferError::Timeout { attempts: 3 })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_timeout_error_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = call_with_retry(&fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::Throttled) }
        })
        .await;

        match result {
            Err(TransferError::Provider(e)) => assert!(e.is_throttled()),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
