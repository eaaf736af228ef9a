use crate::codeforces::client::CodeforcesError;
use rand::Rng;
use std::future::Future;
use tokio::time::{self, Duration};

/// Exponential backoff with symmetric jitter for idempotent upstream calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            factor: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following the given zero-based attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64() * self.factor.powi(attempt as i32);
        let jitter = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };

        Duration::from_secs_f64((base * (1.0 + jitter)).max(0.0))
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, CodeforcesError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CodeforcesError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        "{} failed ({}), retrying in {}ms [{}/{}]",
                        what,
                        e,
                        delay.as_millis(),
                        attempt + 1,
                        self.max_retries
                    );
                    time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
