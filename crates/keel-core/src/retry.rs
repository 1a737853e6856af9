//! Policy-based retry for remote lookups
//!
//! Attempts are logged through `tracing`: failed attempts at WARN, exhaustion
//! at ERROR, a late success at INFO.

use crate::types::{RetryPolicy, RetryStrategy};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Errors returned by [`retry_with_policy`]
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed; holds the final error
    Exhausted { attempts: u32, source: E },

    /// The predicate rejected the error; no further attempts were made
    NonRetryable(E),
}

impl<E> RetryError<E> {
    /// The underlying operation error
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { source, .. } => source,
            RetryError::NonRetryable(source) => source,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted { attempts, source } => {
                write!(f, "retry exhausted after {} attempts: {}", attempts, source)
            }
            RetryError::NonRetryable(source) => write!(f, "non-retryable error: {}", source),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::NonRetryable(source) => Some(source),
        }
    }
}

/// Delay before attempt `attempt + 1` (attempts are 1-indexed)
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let initial = policy.initial_delay_ms as f64;
    let millis = match policy.strategy {
        RetryStrategy::None => 0.0,
        RetryStrategy::Fixed => initial,
        RetryStrategy::Exponential => {
            let exponent = attempt.saturating_sub(1) as i32;
            initial * policy.backoff_multiplier.powi(exponent)
        }
    };
    Duration::from_millis(millis.min(policy.max_delay_ms as f64) as u64)
}

/// Run `op` until it succeeds, the policy is exhausted, or `should_retry`
/// rejects an error
pub async fn retry_with_policy<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    operation: &str,
    should_retry: P,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = match policy.strategy {
        RetryStrategy::None => 1,
        _ => policy.max_attempts.max(1),
    };
    let start = Instant::now();

    for attempt in 1..=max_attempts {
        debug!("{}: attempt {}/{}", operation, attempt, max_attempts);

        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(
                        "{}: succeeded on attempt {} after {:.2}s",
                        operation,
                        attempt,
                        start.elapsed().as_secs_f64()
                    );
                }
                return Ok(value);
            }
            Err(err) if !should_retry(&err) => {
                warn!("{}: not retrying: {}", operation, err);
                return Err(RetryError::NonRetryable(err));
            }
            Err(err) if attempt >= max_attempts => {
                error!(
                    "{}: giving up after {} attempts: {}",
                    operation, attempt, err
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: err,
                });
            }
            Err(err) => {
                let delay = calculate_delay(policy, attempt);
                warn!(
                    "{}: attempt {} failed, retrying in {}ms: {}",
                    operation,
                    attempt,
                    delay.as_millis(),
                    err
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    unreachable!("retry loop always returns within max_attempts")
}
