//! Retry with exponential backoff and jitter.
//!
//! A failed operation is retried with a doubling delay, each delay perturbed
//! by a small random jitter so a fleet of nodes that lost the same server
//! does not retry in lockstep. Operations are modeled as a small trait
//! instead of captured closures, which keeps mutable borrows out of the
//! retry loop and makes the policy independently testable.
//!
//! Non-retryable error classes (TLS and certificate failures, auth
//! rejections) abort the loop immediately; see
//! [`ErrorCode::is_retryable`](gatenode_core::ErrorCode::is_retryable).

#![allow(async_fn_in_trait)]

use gatenode_core::constants::{
    INITIAL_RETRY_DELAY_MS, MAX_HTTP_RETRIES, MIN_RETRY_DELAY_MS, RETRY_JITTER_MS,
};
use gatenode_core::Result;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff policy for a dispatched request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; at most `max_retries + 1` tries.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each attempt.
    pub initial_delay: Duration,
    /// Maximum absolute jitter applied to each delay.
    pub jitter: Duration,
    /// Floor for any delay after jitter.
    pub min_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_HTTP_RETRIES,
            initial_delay: Duration::from_millis(INITIAL_RETRY_DELAY_MS),
            jitter: Duration::from_millis(RETRY_JITTER_MS),
            min_delay: Duration::from_millis(MIN_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries; used when draining the offline queue.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// One retryable unit of work.
///
/// Implementations hold whatever borrows they need across attempts; the
/// retry loop only ever holds `&mut` to the operation itself.
pub trait Operation {
    /// Value produced on success.
    type Output;

    /// Run one attempt.
    async fn attempt(&mut self) -> Result<Self::Output>;
}

/// Compute the delay before retry number `attempt` (0-based), given a jitter
/// offset in milliseconds.
///
/// Pure so the backoff curve can be asserted in tests; the caller samples
/// the jitter. The base doubles per attempt and the result never drops
/// below `policy.min_delay`.
#[must_use]
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32, jitter_offset_ms: i64) -> Duration {
    let base_ms = policy
        .initial_delay
        .as_millis()
        .saturating_mul(1u128 << attempt.min(16)) as i64;
    let delayed = base_ms.saturating_add(jitter_offset_ms);
    Duration::from_millis(delayed.max(policy.min_delay.as_millis() as i64) as u64)
}

fn sample_jitter(policy: &RetryPolicy) -> i64 {
    let jitter_ms = policy.jitter.as_millis() as i64;
    if jitter_ms == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(-jitter_ms..=jitter_ms)
}

/// Run `op` until it succeeds, fails with a non-retryable class, or exhausts
/// `policy.max_retries` retries.
///
/// Blocks the caller through every backoff delay; at most
/// `policy.max_retries + 1` attempts are made.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once retries
/// are exhausted.
pub async fn retry_with_backoff<O: Operation>(
    op: &mut O,
    policy: &RetryPolicy,
) -> Result<O::Output> {
    let mut attempt = 0u32;
    loop {
        match op.attempt().await {
            Ok(output) => {
                if attempt > 0 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(output);
            }
            Err(err) if !err.code.is_retryable() => {
                debug!(code = %err.code, "not retryable, giving up");
                return Err(err);
            }
            Err(err) if attempt >= policy.max_retries => {
                warn!(
                    code = %err.code,
                    attempts = attempt + 1,
                    "retries exhausted"
                );
                return Err(err);
            }
            Err(err) => {
                let delay = backoff_delay(policy, attempt, sample_jitter(policy));
                debug!(
                    code = %err.code,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
