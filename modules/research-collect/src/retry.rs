use std::future::Future;
use std::time::Duration;

use research_common::RetryConfig;
use tracing::warn;

use crate::error::Result;

/// Bounded retries with clamped exponential backoff around one fallible
/// operation.
///
/// Transient failures are retried until `max_attempts` is reached, then the
/// last error is returned. Configuration failures are returned on the first
/// attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    multiplier: Duration,
    exp_base: f64,
    min_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            multiplier: Duration::from_secs(1),
            exp_base: 2.0,
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            multiplier: Duration::from_millis(config.multiplier_ms),
            exp_base: config.exp_base.max(1.0),
            ..Self::new(config.max_attempts, config.min_delay(), config.max_delay())
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to sleep after the `failed_attempt`-th consecutive failure (1-based).
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1) as i32;
        let raw = self.multiplier.as_secs_f64() * self.exp_base.powi(exponent);
        let clamped = raw
            .min(self.max_delay.as_secs_f64())
            .max(self.min_delay.as_secs_f64());
        Duration::from_secs_f64(clamped)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() || attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        source = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Source call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
