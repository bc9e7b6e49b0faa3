// src/ingest/rate_limit.rs
//! Minimum spacing between outbound calls to one source.
//!
//! Each source owns its own limiter, so throttling state never leaks between
//! sources. Uses `tokio::time` so tests can run on a paused clock.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: Mutex::new(None),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Wait until `min_delay` has elapsed since the previous call, then stamp
    /// the current instant as the new "last request".
    pub async fn acquire(&self) {
        let wait = {
            let last = self.last_request.lock().unwrap_or_else(|p| p.into_inner());
            match *last {
                Some(t) => self.min_delay.saturating_sub(t.elapsed()),
                None => Duration::ZERO,
            }
        };
        if !wait.is_zero() {
            tracing::debug!(target: "ingest", wait_ms = wait.as_millis() as u64, "rate limit wait");
            tokio::time::sleep(wait).await;
        }
        let mut last = self.last_request.lock().unwrap_or_else(|p| p.into_inner());
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_is_immediate_then_spaced() {
        let rl = RateLimiter::from_millis(500);
        let t0 = Instant::now();
        rl.acquire().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);

        rl.acquire().await;
        assert!(t0.elapsed() >= Duration::from_millis(500));

        rl.acquire().await;
        assert!(t0.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn no_wait_when_enough_time_passed() {
        let rl = RateLimiter::from_millis(200);
        rl.acquire().await;
        tokio::time::advance(Duration::from_millis(300)).await;
        let t = Instant::now();
        rl.acquire().await;
        assert_eq!(t.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn limiters_are_independent() {
        let a = RateLimiter::from_millis(1_000);
        let b = RateLimiter::from_millis(1_000);
        a.acquire().await;
        let t = Instant::now();
        b.acquire().await;
        assert_eq!(t.elapsed(), Duration::ZERO);
    }
}
