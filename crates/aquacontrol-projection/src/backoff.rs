//! Jittered backoff between delivery attempts.

use std::time::Duration;

use rand::Rng;

/// Returns a delay drawn uniformly from `[delay / 2, delay]`.
pub(crate) fn jittered(delay: Duration) -> Duration {
    let nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
    let half = nanos / 2;
    let extra = rand::rng().random_range(0..=nanos - half);
    Duration::from_nanos(half + extra)
}
