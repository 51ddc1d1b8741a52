//! Persistent Cache Module
//!
//! Combines the in-memory store with the command log, periodic snapshots and
//! the flush barrier. Every mutation is appended to the log before it is
//! applied; a snapshot replaces the log's history and empties it.

mod barrier;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info};

use crate::cache::{CacheStats, CacheStore};
use crate::config::{CacheConfig, FsyncPolicy};
use crate::error::{CacheError, Result};
use crate::persistence::{self, write_snapshot, Command, CommandLog, KeyValue, RecoveryReport};
use crate::tasks::{spawn_maintenance_task, MaintenanceHandle};

pub use barrier::FlushBarrier;

// == State ==
/// Everything guarded by the cache lock.
struct State {
    store: CacheStore,
    log: CommandLog,
    barrier: FlushBarrier,
    /// Set once `recover` succeeds; snapshots before that would drop the
    /// persisted history
    recovered: bool,
}

impl State {
    /// Logs then applies. The store is untouched if the append fails.
    async fn commit(&mut self, command: Command) -> Result<()> {
        self.log.append(&command).await?;
        self.store.apply(command);
        Ok(())
    }

    /// Commits now, or defers while the barrier is closed.
    async fn submit(&mut self, command: Command) -> Result<()> {
        if self.log.is_closed() {
            return Err(CacheError::Closed);
        }
        if self.barrier.is_open() {
            return self.commit(command).await;
        }
        debug!("Flush in progress, deferring {} command", command.name());
        self.barrier.enqueue(command);
        Ok(())
    }

    /// Reopens the barrier and commits every deferred command in order.
    ///
    /// A failed append drops only that command; the first error is returned.
    async fn reopen(&mut self) -> Result<()> {
        let mut first_err = None;
        for command in self.barrier.drain() {
            if let Err(e) = self.commit(command).await {
                error!("Failed to replay deferred command: {}", e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

// == Shared ==
/// State shared between the cache handle and its maintenance task.
pub(crate) struct Shared {
    name: String,
    state: Mutex<State>,
    /// Signalled each time the barrier reopens
    flushed: Notify,
    log_path: PathBuf,
    snapshot_path: Option<PathBuf>,
    fsync: FsyncPolicy,
}

impl Shared {
    pub(crate) async fn sweep(&self) -> usize {
        let removed = self.state.lock().await.store.cleanup_expired();
        if removed > 0 {
            info!("TTL cleanup: removed {} expired entries", removed);
        } else {
            debug!("TTL cleanup: no expired entries found");
        }
        removed
    }

    pub(crate) async fn sync_log(&self) -> Result<()> {
        self.state.lock().await.log.sync().await
    }

    /// One snapshot cycle: close barrier, serialize, write, truncate, reopen.
    ///
    /// No-op without a snapshot path, before recovery, after close, or while
    /// another cycle runs.
    pub(crate) async fn compact(&self) -> Result<()> {
        let Some(snapshot_path) = self.snapshot_path.as_deref() else {
            return Ok(());
        };

        let records = {
            let mut state = self.state.lock().await;
            if !state.recovered {
                debug!("Snapshot of '{}' skipped: not recovered yet", self.name);
                return Ok(());
            }
            if state.log.is_closed() || !state.barrier.is_open() {
                return Ok(());
            }
            state.barrier.close();
            state.store.snapshot()
        };

        // Mutations arriving from here on are deferred by the barrier.
        let written = write_snapshot(snapshot_path, &records).await;

        let mut state = self.state.lock().await;
        let compacted = match written {
            Ok(()) => state.log.truncate().await,
            Err(e) => Err(e),
        };
        let deferred = state.barrier.pending_len();
        let drained = state.reopen().await;
        drop(state);
        self.flushed.notify_waiters();

        match &compacted {
            Ok(()) => debug!(
                "Snapshot of '{}' written: {} entries, {} deferred commands replayed",
                self.name,
                records.len(),
                deferred
            ),
            Err(e) => error!("Snapshot of '{}' failed: {}", self.name, e),
        }
        compacted.and(drained)
    }

    /// Work done on every maintenance tick.
    pub(crate) async fn run_maintenance(&self) -> Result<()> {
        self.sweep().await;
        if self.fsync == FsyncPolicy::EveryTick {
            self.sync_log().await?;
        }
        self.compact().await
    }
}

// == Persistent Cache ==
/// Handle to a durable, process-local key/value cache.
///
/// Call [`PersistentCache::recover`] before relying on previously stored data.
pub struct PersistentCache {
    shared: Arc<Shared>,
    maintenance: Mutex<Option<MaintenanceHandle>>,
}

impl PersistentCache {
    /// Opens the command log and starts the maintenance task.
    ///
    /// Must be called from within a Tokio runtime. Ticks sweep expired
    /// entries right away, but no snapshot is taken until
    /// [`PersistentCache::recover`] has succeeded, so the existing backup and
    /// log are left alone however long recovery is delayed.
    pub async fn open(config: CacheConfig) -> Result<Self> {
        let period = Duration::from_millis(config.check_period_ms.max(1));
        Self::start(
            config.name.clone(),
            config.log_path(),
            config.snapshot_path(),
            config.fsync,
            period,
        )
        .await
    }

    async fn start(
        name: String,
        log_path: PathBuf,
        snapshot_path: Option<PathBuf>,
        fsync: FsyncPolicy,
        period: Duration,
    ) -> Result<Self> {
        let log = CommandLog::open(log_path.clone(), fsync).await?;
        info!(
            "Cache '{}' opened: check period {:?}, snapshots {}",
            name,
            period,
            if snapshot_path.is_some() { "enabled" } else { "disabled" }
        );

        let shared = Arc::new(Shared {
            name,
            state: Mutex::new(State {
                store: CacheStore::new(),
                log,
                barrier: FlushBarrier::new(),
                recovered: false,
            }),
            flushed: Notify::new(),
            log_path,
            snapshot_path,
            fsync,
        });
        let maintenance = spawn_maintenance_task(shared.clone(), period);

        Ok(Self {
            shared,
            maintenance: Mutex::new(Some(maintenance)),
        })
    }

    // == Recover ==
    /// Replaces the store with the snapshot plus replayed log.
    ///
    /// Must complete before mutations are issued. On error the current
    /// store is left as it was.
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let mut state = self.shared.state.lock().await;
        let (store, report) =
            persistence::recover(self.shared.snapshot_path.as_deref(), &self.shared.log_path)
                .await?;
        state.store = store;
        state.recovered = true;
        Ok(report)
    }

    // == Mutations ==
    /// Stores a value, with an optional TTL in seconds (0 = never expires).
    pub async fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        ttl: Option<u64>,
    ) -> Result<()> {
        let command = Command::Set {
            key: key.into(),
            value: value.into(),
            ttl,
        };
        self.shared.state.lock().await.submit(command).await
    }

    /// Stores several values as one logged command.
    pub async fn mset(&self, entries: Vec<KeyValue>) -> Result<()> {
        let command = Command::MultiSet { entries };
        self.shared.state.lock().await.submit(command).await
    }

    /// Removes a key.
    pub async fn del(&self, key: &str) -> Result<()> {
        let command = Command::Delete {
            key: key.to_string(),
        };
        self.shared.state.lock().await.submit(command).await
    }

    /// Resets a key's TTL relative to now; 0 removes the expiry.
    pub async fn ttl(&self, key: &str, ttl: u64) -> Result<()> {
        let command = Command::SetTtl {
            key: key.to_string(),
            ttl,
        };
        self.shared.state.lock().await.submit(command).await
    }

    /// Returns and removes a value. Logged as a delete.
    ///
    /// During a flush the visible value is returned and the delete deferred.
    /// A key hands out its value once: later takes in the same flush get
    /// `None`.
    pub async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut state = self.shared.state.lock().await;
        if state.log.is_closed() {
            return Err(CacheError::Closed);
        }
        if state.barrier.has_pending_delete(key) {
            return Ok(None);
        }
        let value = state.store.get(key);
        state
            .submit(Command::Delete {
                key: key.to_string(),
            })
            .await?;
        Ok(value)
    }

    // == Reads ==
    pub async fn get(&self, key: &str) -> Option<String> {
        self.shared.state.lock().await.store.get(key)
    }

    /// Absolute expiry (Unix ms) of a live key, if it has one.
    pub async fn get_ttl(&self, key: &str) -> Option<u64> {
        self.shared.state.lock().await.store.get_ttl(key)
    }

    pub async fn has(&self, key: &str) -> bool {
        self.shared.state.lock().await.store.has(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.shared.state.lock().await.store.keys()
    }

    /// Stored entries, counting expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.shared.state.lock().await.store.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        self.shared.state.lock().await.store.stats()
    }

    // == Maintenance ==
    /// Runs one snapshot cycle immediately.
    pub async fn compact(&self) -> Result<()> {
        self.shared.compact().await
    }

    /// Runs one expiration sweep immediately. Returns the entries removed.
    pub async fn sweep(&self) -> usize {
        self.shared.sweep().await
    }

    pub async fn is_flushing(&self) -> bool {
        !self.shared.state.lock().await.barrier.is_open()
    }

    /// Resolves once no flush is in progress and deferred mutations are applied.
    pub async fn wait_for_flush(&self) {
        loop {
            let notified = self.shared.flushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.state.lock().await.barrier.is_open() {
                return;
            }
            notified.await;
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.shared.log_path
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.shared.snapshot_path.as_deref()
    }

    // == Close ==
    /// Stops the maintenance task and releases the log.
    ///
    /// An in-flight snapshot cycle runs to completion first. Pending state is
    /// not snapshotted; the log already holds it.
    pub async fn close(&self) -> Result<()> {
        let maintenance = self.maintenance.lock().await.take();
        if let Some(handle) = maintenance {
            handle.shutdown().await;
        }
        self.shared.state.lock().await.log.close().await?;
        info!("Cache '{}' closed", self.shared.name);
        Ok(())
    }
}
