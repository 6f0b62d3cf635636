//! Bounded retry with fixed delay
//!
//! Connection establishment retries a fixed number of times with a fixed
//! inter-attempt delay. The bound and delay are plain data driven by tokio
//! time, so tests exercise the policy under a paused clock without real
//! waiting.

use std::future::Future;
use std::time::Duration;

/// Default number of connection attempts
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;

/// Default delay between attempts
pub const DEFAULT_CONNECT_DELAY: Duration = Duration::from_secs(2);

/// Fixed-bound, fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (at least one is always made)
    pub attempts: u32,
    /// Delay between consecutive attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_CONNECT_ATTEMPTS,
            delay: DEFAULT_CONNECT_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given bound and delay
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Run `attempt_fn` until it succeeds or the bound is exhausted
    ///
    /// The closure receives the 1-based attempt number. Failures short of
    /// the bound sleep for `delay` and try again; the final failure is
    /// returned to the caller. There is no mid-flight cancellation: once
    /// started, the loop runs to success or exhaustion.
    pub async fn run<T, E, F, Fut>(&self, mut attempt_fn: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let bound = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match attempt_fn(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    tracing::warn!(
                        attempt,
                        bound,
                        error = %error,
                        "Attempt failed"
                    );

                    if attempt >= bound {
                        return Err(error);
                    }

                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
