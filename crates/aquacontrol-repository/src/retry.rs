//! Caller-level reload-and-retry for optimistic concurrency conflicts.

use std::future::Future;

use aquacontrol_core::error::DomainError;
use aquacontrol_core::retry::RetryConfig;
use tokio::time::sleep;
use tracing::debug;

/// Runs `operation` until it succeeds, fails with anything other than a
/// concurrency conflict, or `config.max_attempts` is reached.
///
/// `operation` receives the 1-based attempt number and must reload the
/// aggregate on every call; re-saving the same stale state can never succeed.
///
/// # Errors
///
/// Returns the last error of `operation`.
pub async fn retry_on_conflict<T, F, Fut>(
    config: RetryConfig,
    mut operation: F,
) -> Result<T, DomainError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DomainError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "command succeeded after conflict retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_conflict() && attempt < config.max_attempts => {
                let delay = config.delay_after(attempt);
                debug!(
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "conflict, reloading and retrying"
                );
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use uuid::Uuid;

    use super::*;

    fn conflict() -> DomainError {
        DomainError::ConcurrencyConflict {
            aggregate_id: Uuid::nil(),
            expected: 1,
            actual: 2,
        }
    }

    #[tokio::test]
    async fn test_retries_conflicts_until_success() {
        let calls = AtomicU32::new(0);

        let result = retry_on_conflict(RetryConfig::immediate(3), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { if attempt < 3 { Err(conflict()) } else { Ok(attempt) } }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_on_conflict(RetryConfig::immediate(2), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(conflict()) }
        })
        .await;

        assert!(matches!(result, Err(DomainError::ConcurrencyConflict { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_on_conflict(RetryConfig::immediate(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DomainError::Validation("name must not be empty".into())) }
        })
        .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
