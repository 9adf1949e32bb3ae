//! Bounded exponential-backoff retry for single requests.

use std::time::Duration;

use tracing::warn;

use crate::config::RunOptions;
use crate::error::Error;
use crate::traits::Pause;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RunOptions::default())
    }
}

impl From<&RunOptions> for RetryPolicy {
    fn from(options: &RunOptions) -> Self {
        Self {
            max_attempts: options.max_retries,
            backoff_base: options.backoff_base,
            backoff_unit: options.backoff_unit,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): `unit * base^attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff_base.saturating_pow(attempt);
        self.backoff_unit.saturating_mul(factor)
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number. Errors that are not
    /// retryable are returned immediately. When every attempt fails the last
    /// error is returned wrapped in [`Error::RunFailed`]. No pause follows
    /// the final attempt, successful or not.
    pub fn run<T, F, P>(&self, pause: &P, mut op: F) -> Result<T, Error>
    where
        F: FnMut(u32) -> Result<T, Error>,
        P: Pause + ?Sized,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if attempt >= max_attempts => {
                    return Err(Error::RunFailed {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    warn!(attempt, max_attempts, ?delay, error = %err, "request attempt failed");
                    pause.pause(delay);
                    attempt += 1;
                }
            }
        }
    }
}
