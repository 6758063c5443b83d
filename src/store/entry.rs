//! Stored Value Module
//!
//! A single value held by the in-memory store, with optional expiry.

use std::time::Duration;

use tokio::time::Instant;

// == Stored Value ==
/// Represents a single stored value and its expiry deadline.
///
/// Deadlines use the tokio clock so that expiry follows a paused test clock.
#[derive(Debug, Clone)]
pub struct StoredValue {
    /// The stored value
    pub value: String,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
}

impl StoredValue {
    // == Constructor ==
    /// Creates a new stored value with optional time-to-live.
    ///
    /// Returns `None` when the deadline lies beyond what the clock can
    /// represent.
    pub fn new(value: String, ttl: Option<Duration>) -> Option<Self> {
        let expires_at = match ttl {
            Some(ttl) => Some(Instant::now().checked_add(ttl)?),
            None => None,
        };
        Some(Self { value, expires_at })
    }

    // == Is Expired ==
    /// Checks if the value has expired at `now`.
    ///
    /// A value is expired once `now` reaches the deadline.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Remaining TTL ==
    /// Returns remaining lifetime in milliseconds, or None if no expiration.
    ///
    /// Returns `Some(0)` once the deadline has passed.
    pub fn pttl_at(&self, now: Instant) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(now).as_millis() as u64)
    }
}
