use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use validator::Validate;

/// How a failed stats fetch is retried before the cycle is given up.
///
/// `max_retries = 0` gives up immediately and waits for the next scheduled
/// cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RetryPolicy {
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    #[validate(range(min = 1))]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    #[validate(range(min = 1.0))]
    pub multiplier: f64,

    #[serde(default = "default_max_backoff")]
    #[validate(range(min = 1))]
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: default_initial_backoff(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn exponential(max_retries: u32, initial: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff_ms: initial.as_millis() as u64,
            multiplier,
            max_backoff_ms: max.as_millis() as u64,
        }
    }

    /// Delay before the `retry`-th retry (zero based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let scaled = self.initial_backoff_ms as f64 * self.multiplier.powi(retry as i32);
        let capped = scaled.min(self.max_backoff_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Runs `op`, retrying transport failures until the budget is spent.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transport() && retry < self.max_retries => {
                    let delay = self.backoff(retry);
                    log::warn!(
                        "Attempt {} failed: {}. Retrying in {}ms",
                        retry + 1,
                        e,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_backoff() -> u64 {
    5000
}
