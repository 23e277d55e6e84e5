//! Per-provider sliding-window admission control.
//!
//! Tracks request timestamps and estimated-token spend over a 60 second
//! window and suspends callers until both ceilings admit the call.
//! Deliberately simple, not lock-free: an internal mutex guards the
//! bookkeeping (never held across `.await`), and the orchestrator keeps
//! one limiter instance per provider driven from one logical thread of
//! control, so contention never matters in practice.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Window length over which requests and tokens are counted.
const WINDOW: Duration = Duration::from_secs(60);

/// Slack added to every computed wait so the oldest entry has actually
/// expired by the time the caller re-checks.
const WAIT_BUFFER: Duration = Duration::from_millis(100);

/// Token estimate used when the caller does not supply one.
pub const DEFAULT_TOKEN_ESTIMATE: u32 = 1000;

/// Sliding-window rate limiter over request count and token spend.
pub struct RateLimiter {
    max_requests_per_minute: usize,
    max_tokens_per_minute: u64,
    state: Mutex<WindowState>,
}

#[derive(Default)]
struct WindowState {
    requests: VecDeque<Instant>,
    /// Token spend as (timestamp, count) pairs; the counts sum to the
    /// in-window total (equivalent to one entry per token, without the
    /// allocation).
    tokens: VecDeque<(Instant, u32)>,
}

impl WindowState {
    fn purge(&mut self, now: Instant) {
        while let Some(&front) = self.requests.front() {
            if now.duration_since(front) >= WINDOW {
                self.requests.pop_front();
            } else {
                break;
            }
        }
        while let Some(&(front, _)) = self.tokens.front() {
            if now.duration_since(front) >= WINDOW {
                self.tokens.pop_front();
            } else {
                break;
            }
        }
    }

    fn token_total(&self) -> u64 {
        self.tokens.iter().map(|&(_, n)| n as u64).sum()
    }
}

impl RateLimiter {
    pub fn new(max_requests_per_minute: usize, max_tokens_per_minute: u64) -> Self {
        Self {
            max_requests_per_minute,
            max_tokens_per_minute,
            state: Mutex::new(WindowState::default()),
        }
    }

    /// Conservative defaults: 60 requests and 60k estimated tokens per
    /// minute.
    pub fn with_defaults() -> Self {
        Self::new(60, 60_000)
    }

    /// Admit with the default token estimate.
    pub async fn admit_default(&self) {
        self.admit(DEFAULT_TOKEN_ESTIMATE).await;
    }

    /// Suspend until the window admits one request plus
    /// `estimated_tokens` of spend, then record both.
    pub async fn admit(&self, estimated_tokens: u32) {
        loop {
            let wait = {
                let mut state = self
                    .state
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                let now = Instant::now();
                state.purge(now);

                let over_requests = state.requests.len() >= self.max_requests_per_minute;
                let over_tokens =
                    state.token_total() + estimated_tokens as u64 >= self.max_tokens_per_minute;

                if !over_requests && !over_tokens {
                    state.requests.push_back(now);
                    if estimated_tokens > 0 {
                        state.tokens.push_back((now, estimated_tokens));
                    }
                    return;
                }

                // An estimate larger than the whole budget can never be
                // admitted by waiting; let it through on an empty window.
                if state.requests.is_empty() && state.tokens.is_empty() {
                    tracing::warn!(
                        estimated_tokens,
                        "token estimate exceeds per-minute budget, admitting anyway"
                    );
                    state.requests.push_back(now);
                    state.tokens.push_back((now, estimated_tokens));
                    return;
                }

                // Wait until the oldest tracked entry leaves the window.
                let oldest = match (state.requests.front(), state.tokens.front()) {
                    (Some(&r), Some(&(t, _))) => r.min(t),
                    (Some(&r), None) => r,
                    (None, Some(&(t, _))) => t,
                    (None, None) => now,
                };
                (oldest + WINDOW + WAIT_BUFFER).saturating_duration_since(now)
            };

            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn admits_under_both_ceilings_without_waiting() {
        let limiter = RateLimiter::new(10, 100_000);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.admit_default().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn request_ceiling_forces_window_wait() {
        let limiter = RateLimiter::new(2, 1_000_000);
        let start = Instant::now();
        limiter.admit_default().await;
        limiter.admit_default().await;
        // Third request must wait for the first timestamp to expire.
        limiter.admit_default().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= WINDOW, "waited only {elapsed:?}");
        assert!(elapsed < WINDOW + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn token_ceiling_forces_window_wait() {
        let limiter = RateLimiter::new(100, 2_000);
        let start = Instant::now();
        limiter.admit(1000).await;
        // 1000 tracked + 1000 estimated hits the 2000 ceiling.
        limiter.admit(1000).await;
        assert!(start.elapsed() >= WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_estimate_is_admitted_on_empty_window() {
        let limiter = RateLimiter::new(10, 500);
        let start = Instant::now();
        limiter.admit(10_000).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn window_slides_rather_than_resets() {
        let limiter = RateLimiter::new(2, 1_000_000);
        limiter.admit_default().await;
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.admit_default().await;

        // 31s in: the first entry expires at 60s, so the third admit
        // should wait ~29s, not a full minute.
        tokio::time::advance(Duration::from_secs(1)).await;
        let start = Instant::now();
        limiter.admit_default().await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(28), "waited {waited:?}");
        assert!(waited <= Duration::from_secs(30), "waited {waited:?}");
    }
}
