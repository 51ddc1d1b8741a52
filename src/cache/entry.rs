//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use chrono::Utc;

// == Cache Entry ==
/// Represents a single cache entry with value and absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The stored value
    pub value: String,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// The TTL is relative to now. `Some(0)` and `None` both mean the entry
    /// never expires.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl_seconds` - Optional TTL in seconds
    pub fn new(value: String, ttl_seconds: Option<u64>) -> Self {
        Self {
            value,
            expires_at: expiry_from_ttl(ttl_seconds, current_timestamp_ms()),
        }
    }

    /// Creates an entry from a stored absolute expiry, where 0 means never.
    pub fn with_expiry(value: String, expires_at_ms: u64) -> Self {
        Self {
            value,
            expires_at: (expires_at_ms != 0).then_some(expires_at_ms),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// its expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Checks expiry against a caller-supplied clock reading.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    // Clocks before the epoch read as 0.
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Converts a relative TTL to an absolute expiry.
pub fn expiry_from_ttl(ttl_seconds: Option<u64>, now_ms: u64) -> Option<u64> {
    match ttl_seconds {
        Some(ttl) if ttl > 0 => Some(now_ms.saturating_add(ttl.saturating_mul(1000))),
        _ => None,
    }
}
