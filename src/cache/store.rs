//! Cache Store Module
//!
//! Main cache engine: HashMap storage with lazy and periodic TTL expiration.
//! The store performs no I/O; durability is layered on top by the
//! persistent cache, which feeds it the same `Command`s it writes to disk.

use std::collections::HashMap;

use crate::cache::entry::{current_timestamp_ms, expiry_from_ttl};
use crate::cache::{CacheEntry, CacheStats};
use crate::persistence::{Command, KeyValue, SnapshotRecord};

// == Cache Store ==
/// In-memory key/value storage with TTL support.
#[derive(Debug, Default)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Performance statistics
    stats: CacheStats,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new, empty CacheStore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from snapshot records, keeping absolute expiries.
    pub fn from_snapshot(records: Vec<SnapshotRecord>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.entries.insert(
                record.key,
                CacheEntry::with_expiry(record.value, record.expires_at),
            );
        }
        store.stats.set_total_entries(store.entries.len());
        store
    }

    // == Set ==
    /// Stores a key-value pair with optional TTL in seconds.
    ///
    /// Overwrites any existing entry, including its expiry.
    pub fn set(&mut self, key: String, value: String, ttl: Option<u64>) {
        self.entries.insert(key, CacheEntry::new(value, ttl));
        self.stats.set_total_entries(self.entries.len());
    }

    // == Multi Set ==
    /// Stores every pair in order; later duplicates win.
    pub fn mset(&mut self, entries: Vec<KeyValue>) {
        for kv in entries {
            self.entries.insert(kv.key, CacheEntry::new(kv.value, kv.ttl));
        }
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<String> {
        if self.evict_if_expired(key) {
            self.stats.record_miss();
            return None;
        }
        match self.entries.get(key) {
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Take ==
    /// Atomically retrieves and removes a value.
    pub fn take(&mut self, key: &str) -> Option<String> {
        let value = self.get(key)?;
        self.delete(key);
        Some(value)
    }

    // == Has ==
    /// Checks for a live entry without touching hit/miss counters.
    pub fn has(&mut self, key: &str) -> bool {
        !self.evict_if_expired(key) && self.entries.contains_key(key)
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Set TTL ==
    /// Resets the TTL of an existing entry, relative to now.
    ///
    /// A TTL of 0 clears the expiry. Returns false if the key is absent.
    pub fn set_ttl(&mut self, key: &str, ttl: u64) -> bool {
        if self.evict_if_expired(key) {
            return false;
        }
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = expiry_from_ttl(Some(ttl), current_timestamp_ms());
                true
            }
            None => false,
        }
    }

    // == Get TTL ==
    /// Returns the absolute expiry (Unix ms) of a live entry, if it has one.
    pub fn get_ttl(&mut self, key: &str) -> Option<u64> {
        if self.evict_if_expired(key) {
            return None;
        }
        self.entries.get(key).and_then(|entry| entry.expires_at)
    }

    // == Apply ==
    /// Applies a logged command exactly as the live API would.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Set { key, value, ttl } => self.set(key, value, ttl),
            Command::MultiSet { entries } => self.mset(entries),
            Command::Delete { key } => {
                self.delete(&key);
            }
            Command::SetTtl { key, ttl } => {
                self.set_ttl(&key, ttl);
            }
        }
    }

    // == Keys ==
    /// Returns all live keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        let now = current_timestamp_ms();
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Snapshot ==
    /// Captures every entry, expired or not, as snapshot records.
    pub fn snapshot(&self) -> Vec<SnapshotRecord> {
        self.entries
            .iter()
            .map(|(key, entry)| SnapshotRecord {
                key: key.clone(),
                value: entry.value.clone(),
                expires_at: entry.expires_at.unwrap_or(0),
            })
            .collect()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let count = before - self.entries.len();

        self.stats.record_expired(count as u64);
        self.stats.set_total_entries(self.entries.len());
        count
    }

    // == Length ==
    /// Returns the number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lazy expiration: drops `key` if it is past due. Returns true if dropped.
    fn evict_if_expired(&mut self, key: &str) -> bool {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired());
        if expired {
            self.entries.remove(key);
            self.stats.record_expired(1);
            self.stats.set_total_entries(self.entries.len());
        }
        expired
    }
}
