use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, info};

/// Attempt budget and exponential backoff for a whole extraction call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least one.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay after the failed attempt `attempt` (0-based): `base_delay * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Runs `op` until it succeeds or the budget is spent. `on_failure` sees every
    /// failed attempt (0-based) before the backoff sleep. The last error is returned.
    pub async fn run<T, E, Op, Fut, OnFailure>(&self, mut op: Op, mut on_failure: OnFailure) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        OnFailure: FnMut(u32, &E),
        E: Display,
    {
        let attempts = self.attempts();
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    on_failure(attempt, &e);
                    if attempt + 1 >= attempts {
                        error!("All {attempts} attempts exhausted: {e}");
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt);
                    info!("Retrying in {}s...", delay.as_secs_f64());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
