// src/ingest/retry.rs
//! Bounded retry with exponential backoff (`delay = factor^attempt` seconds).

use std::future::Future;
use std::time::Duration;

use metrics::counter;

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff_factor: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_factor: u64) -> Self {
        Self {
            max_retries,
            backoff_factor,
        }
    }

    /// Backoff before retry number `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.backoff_factor.saturating_pow(attempt))
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    /// `op` receives the zero-based attempt number.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let wait = self.delay_for(attempt);
                    tracing::warn!(
                        target: "ingest",
                        unit = label,
                        attempt,
                        wait_secs = wait.as_secs(),
                        error = %e,
                        "request failed, retrying"
                    );
                    counter!("ingest_retries_total").increment(1);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        tracing::error!(
                            target: "ingest",
                            unit = label,
                            retries = self.max_retries,
                            error = %e,
                            "request failed after retries"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}
