//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Retry an async operation up to `max_attempts` times.
///
/// Delays start at `base_delay` and double after each failed attempt,
/// with no jitter. The last error is surfaced if every attempt fails.
pub async fn retry_with_backoff<T, F, Fut>(
    mut op: F,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = base_delay;
    let mut last_err = None;

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::debug!(attempt, max_attempts, error = %err, "attempt failed");
                last_err = Some(err);
                if attempt < max_attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Error::Provider("retry called with zero attempts".into())))
}

/// Attempts and base delay used for every gateway call.
pub const MAX_ATTEMPTS: u32 = 3;
pub const BASE_DELAY: Duration = Duration::from_millis(1000);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, Error>(42) }
            },
            MAX_ATTEMPTS,
            BASE_DELAY,
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn surfaces_last_error_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(Error::Provider(format!("boom {n}"))) }
            },
            MAX_ATTEMPTS,
            BASE_DELAY,
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(Error::Provider(msg)) if msg == "boom 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_on_later_attempt() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result = retry_with_backoff(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(Error::Provider("transient".into()))
                    } else {
                        Ok(n)
                    }
                }
            },
            MAX_ATTEMPTS,
            BASE_DELAY,
        )
        .await;
        assert_eq!(result.unwrap(), 3);
        // 1000ms after the first failure, 2000ms after the second.
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }
}
