//! Retry policy for calls into external data sources.

use crate::domain::error::SiegfriedError;
use std::thread;
use std::time::Duration;

/// Upper bound on configured attempts.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;
/// Upper bound on the configured per-retry backoff.
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 behave as 1.
    pub attempts: u32,
    /// Delay before each retry, multiplied by the retry number.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn delay(&self, retry: u32) -> Duration {
        self.backoff * retry
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// attempts are exhausted. The last error is returned.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T, SiegfriedError>
    where
        F: FnMut() -> Result<T, SiegfriedError>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.delay(attempt);
                    tracing::debug!(
                        what,
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying"
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
