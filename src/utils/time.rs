//! Timestamp helpers for silence expiry and activity tracking.

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the UNIX epoch. A clock before the epoch reads as 0.
pub fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
