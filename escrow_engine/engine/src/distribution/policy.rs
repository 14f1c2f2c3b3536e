//! Uniform timeout and retry policy for every call to a key-holder.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{EscrowError, EscrowResult};

/// Exponential backoff between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.max(1.0).powi(attempt as i32 - 1);
        let scaled = Duration::from_millis((self.initial_backoff.as_millis() as f64 * factor) as u64);
        scaled.min(self.max_backoff)
    }
}

/// Per-attempt timeout plus retry policy, applied to one holder call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for CallPolicy {
    fn default() -> Self {
        CallPolicy {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

impl CallPolicy {
    /// Run `call` under the policy. A timed-out attempt counts as `Unavailable`;
    /// only `Unavailable` outcomes are retried.
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> EscrowResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EscrowResult<T>>,
    {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(EscrowError::Unavailable(format!(
                    "{label} did not answer within {}ms",
                    self.timeout.as_millis()
                ))),
            };

            match outcome {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(holder = label, attempt, error = %e, ?delay, "call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => {
                    if attempt > 1 {
                        debug!(holder = label, attempt, ok = other.is_ok(), "call settled after retries");
                    }
                    return other;
                }
            }
        }
    }
}
