//! Expiry comparison for conflicting lock records.
//!
//! Expiry is a wall-clock heuristic against a `created` timestamp that is
//! never renewed. A slow but still running holder can be displaced once its
//! record is old enough.

use chrono::{DateTime, Duration, Utc};

/// Whether a record created at `created` is expired at `now`.
///
/// Expired means strictly after `created + expire_seconds`. A record exactly
/// at the boundary, or one created in the future (clock skew), is live.
pub fn is_expired(created: DateTime<Utc>, now: DateTime<Utc>, expire_seconds: u64) -> bool {
    let ttl = i64::try_from(expire_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX);

    match created.checked_add_signed(ttl) {
        Some(deadline) => now > deadline,
        None => false,
    }
}
