use std::thread::sleep;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

/// Exponential backoff with jitter for retryable provider failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 500 }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self { max_attempts: 1, base_delay_ms: 0 }
    }

    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        let backoff = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(backoff.max(self.base_delay_ms))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned unchanged.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let limit = self.max_attempts.max(1);
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < limit => {
                    let jitter = if self.base_delay_ms > 0 { rand::thread_rng().gen_range(0..=self.base_delay_ms) } else { 0 };
                    let delay = self.delay_for_attempt(attempt) + Duration::from_millis(jitter);
                    warn!(%err, attempt, ?delay, "{what} failed, retrying");
                    sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
