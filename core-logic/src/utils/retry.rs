//! Bounded retry with uniform jittered delay.
//!
//! This is deliberately a blunt policy: every raised error and every falsy
//! result count the same as one failed attempt, the delay between attempts
//! is a flat uniform draw, and there is no exponential backoff or per-error
//! differentiation. Failed steps are re-driven later from persisted state by
//! the scheduler, so the wrapper only needs at-least-once semantics.

use anyhow::Result;
use std::future::Future;
use tracing::debug;

use crate::config::DelayRange;
use crate::utils::delay::sleep_range;
use crate::utils::rng::Randomizer;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub tries: u32,
    pub delay_range: DelayRange,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            tries: 1,
            delay_range: DelayRange(5, 10),
        }
    }
}

impl RetryPolicy {
    pub fn new(tries: u32) -> Self {
        Self {
            tries,
            ..Default::default()
        }
    }

    pub fn with_delay_range(mut self, range: DelayRange) -> Self {
        self.delay_range = range;
        self
    }
}

/// Invokes `op` up to `policy.tries` times and returns the first `Some`
/// value. `Err(_)` and `Ok(None)` are treated identically as a failed
/// attempt; between attempts a randomized delay elapses.
pub async fn retry_on_fail<T, F, Fut>(
    policy: RetryPolicy,
    op_name: &str,
    rng: &Randomizer,
    mut op: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    for attempt in 1..=policy.tries {
        match op().await {
            Ok(Some(value)) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", op_name, attempt);
                }
                return Some(value);
            }
            Ok(None) => {
                debug!("{} returned nothing (attempt {}/{})", op_name, attempt, policy.tries);
            }
            Err(e) => {
                debug!(
                    "{} failed (attempt {}/{}): {:#}",
                    op_name, attempt, policy.tries, e
                );
            }
        }

        if attempt < policy.tries {
            sleep_range(policy.delay_range, rng).await;
        }
    }

    None
}

/// Boolean flavor of [`retry_on_fail`] for capabilities that report plain
/// success/failure. `Ok(false)` and `Err(_)` both burn an attempt.
pub async fn retry_flag<F, Fut>(
    policy: RetryPolicy,
    op_name: &str,
    rng: &Randomizer,
    mut op: F,
) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for attempt in 1..=policy.tries {
        match op().await {
            Ok(true) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", op_name, attempt);
                }
                return true;
            }
            Ok(false) => {
                debug!("{} reported failure (attempt {}/{})", op_name, attempt, policy.tries);
            }
            Err(e) => {
                debug!(
                    "{} failed (attempt {}/{}): {:#}",
                    op_name, attempt, policy.tries, e
                );
            }
        }

        if attempt < policy.tries {
            sleep_range(policy.delay_range, rng).await;
        }
    }

    false
}
