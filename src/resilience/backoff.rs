//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before attempt number `attempt` (1-based).
///
/// `base * 2^(attempt-1)` capped at `max`, plus up to 10% jitter that never
/// pushes the result above `max`.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;

    let exponential = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(exponential).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis((capped + jitter).min(max_ms.max(capped)))
}
