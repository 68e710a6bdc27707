use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

/// Enforces a minimum interval between successive permitted calls.
///
/// Single caller only: `wait` takes `&mut self`, so there is no queue and no
/// fairness between competing callers.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_permit: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_permit: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Suspend until at least `min_interval` has passed since the previous
    /// permit. The first call returns immediately.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_permit {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                debug!(remaining_ms = remaining.as_millis() as u64, "Rate limit: waiting");
                sleep(remaining).await;
            }
        }
        self.last_permit = Some(Instant::now());
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_does_not_wait() {
        let mut limiter = RateLimiter::default();
        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_calls_are_spaced_by_interval() {
        let mut limiter = RateLimiter::new(Duration::from_millis(1500));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(3000));
        assert!(start.elapsed() < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn time_already_spent_counts_toward_interval() {
        let mut limiter = RateLimiter::new(Duration::from_secs(1));
        limiter.wait().await;
        sleep(Duration::from_millis(700)).await;

        let before = Instant::now();
        limiter.wait().await;
        let waited = before.elapsed();
        assert!(waited >= Duration::from_millis(300));
        assert!(waited < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn no_wait_once_interval_has_elapsed() {
        let mut limiter = RateLimiter::new(Duration::from_secs(1));
        limiter.wait().await;
        sleep(Duration::from_secs(2)).await;

        let before = Instant::now();
        limiter.wait().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}
