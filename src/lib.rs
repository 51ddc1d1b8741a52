//! Persistent Cache - An embeddable in-memory key-value cache
//!
//! Provides TTL expiration with crash-safe persistence: every mutation is
//! appended to a command log, and the log is periodically compacted into a
//! snapshot.

pub mod cache;
pub mod config;
pub mod error;
pub mod persistence;
pub mod persistent;
mod tasks;

pub use config::{CacheConfig, FsyncPolicy};
pub use error::{CacheError, Result};
pub use persistence::{Command, KeyValue, RecoveryReport};
pub use persistent::PersistentCache;
