//! Cache Module
//!
//! Provides the in-memory store with TTL expiration. No I/O happens here.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use stats::CacheStats;
pub use store::CacheStore;
