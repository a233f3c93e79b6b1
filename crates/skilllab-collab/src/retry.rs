//! Exponential-backoff retry wrapper for collaborator calls (spec.md §5,
//! §7). Grounded on the teacher's `BudgetedBackend` wrapper style in
//! `xchecker-llm`: a thin decorator around a fallible async operation rather
//! than baking retry policy into each client.

use std::time::Duration;
use tracing::warn;

/// Retries `operation` up to `max_retries` additional times on failure,
/// with exponential backoff starting at 1s and capped so the total elapsed
/// backoff never exceeds `max_total_backoff` (spec.md §5 Timeouts: "capped
/// at 60s total elapsed").
pub async fn with_backoff<T, E, F, Fut>(
    max_retries: u32,
    max_total_backoff: Duration,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut backoff = Duration::from_secs(1);
    let mut elapsed = Duration::ZERO;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_retries || elapsed >= max_total_backoff => {
                return Err(err);
            }
            Err(err) => {
                warn!(attempt, %err, "collaborator call failed, retrying");
                let sleep_for = backoff.min(max_total_backoff - elapsed);
                tokio::time::sleep(sleep_for).await;
                elapsed += sleep_for;
                backoff = (backoff * 2).min(Duration::from_secs(60));
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_first_call_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(3, Duration::from_secs(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success_within_bound() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(5, Duration::from_millis(50), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(2, Duration::from_millis(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("permanent") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
