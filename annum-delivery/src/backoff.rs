//! Bounded exponential backoff.
//!
//! `delay_n = base_delay * 2^n`, deliberately without jitter: with a single
//! delivery endpoint and a small `maxRetries` (default 3), the retry-storm
//! scenario jitter exists to prevent never materializes here — at most a
//! handful of replicas retry a handful of times each.

use std::time::Duration;

/// Delay before the `attempt`-th retry (0-indexed: `attempt = 0` is the
/// delay before the first retry after the initial failed attempt).
#[must_use]
pub fn delay_for_attempt(attempt: u32, base_delay: Duration) -> Duration {
    let exponent = attempt.min(62);
    let multiplier: u128 = 1u128 << exponent;
    let millis = base_delay.as_millis().saturating_mul(multiplier);
    let millis = u64::try_from(millis).unwrap_or(u64::MAX);
    Duration::from_millis(millis)
}
