//! Exponential backoff with jitter for ACME polling.

use std::time::Duration;
use rand::Rng;

/// First poll delay.
pub const POLL_BASE_MS: u64 = 250;

/// Longest delay between two polls.
pub const POLL_MAX_MS: u64 = 10_000;

/// Polls before an order is given up.
pub const MAX_POLLS: u32 = 20;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Up to 10% extra
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Delay before poll number `attempt` (1-based).
pub fn poll_delay(attempt: u32) -> Duration {
    calculate_backoff(attempt, POLL_BASE_MS, POLL_MAX_MS)
}
