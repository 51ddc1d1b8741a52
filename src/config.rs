//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;

// == Fsync Policy ==
/// Controls when appended log data is forced to stable storage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    /// Fsync after every append.
    Always,
    /// Fsync once per maintenance tick.
    #[default]
    EveryTick,
    /// No explicit fsync (left to the OS).
    Never,
}

impl FsyncPolicy {
    /// Parses `always`, `tick` or `never` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "always" => Some(FsyncPolicy::Always),
            "tick" | "everytick" => Some(FsyncPolicy::EveryTick),
            "never" | "no" => Some(FsyncPolicy::Never),
            _ => None,
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache name, used to derive `<name>.append` and `<name>.backup`
    pub name: String,
    /// Interval in milliseconds for both the expiration sweep and snapshots
    pub check_period_ms: u64,
    /// Snapshot directory; snapshots are skipped when unset
    pub directory: Option<PathBuf>,
    /// Log durability policy
    pub fsync: FsyncPolicy,
}

impl CacheConfig {
    /// Creates a config with the given name and period, no directory.
    pub fn new(name: impl Into<String>, check_period_ms: u64) -> Self {
        Self {
            name: name.into(),
            check_period_ms,
            ..Self::default()
        }
    }

    /// Sets the directory holding both the log and the snapshot.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Sets the fsync policy.
    pub fn with_fsync(mut self, fsync: FsyncPolicy) -> Self {
        self.fsync = fsync;
        self
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAME` - Cache name (default: cache)
    /// - `CACHE_CHECK_PERIOD_MS` - Sweep/snapshot interval in ms (default: 1000)
    /// - `CACHE_DIR` - Snapshot directory (default: unset)
    /// - `CACHE_FSYNC` - `always`, `tick` or `never` (default: tick)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            name: env::var("CACHE_NAME")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.name),
            check_period_ms: env::var("CACHE_CHECK_PERIOD_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u64| *v > 0)
                .unwrap_or(defaults.check_period_ms),
            directory: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            fsync: env::var("CACHE_FSYNC")
                .ok()
                .and_then(|v| FsyncPolicy::parse(&v))
                .unwrap_or(defaults.fsync),
        }
    }

    /// Whether the snapshot manager is active.
    pub fn snapshots_enabled(&self) -> bool {
        self.directory.is_some()
    }

    /// Directory the command log is written to.
    ///
    /// Falls back to the home directory, then the working directory.
    pub fn log_dir(&self) -> PathBuf {
        self.directory
            .clone()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Path of the command log, `<dir>/<name>.append`.
    pub fn log_path(&self) -> PathBuf {
        self.log_dir().join(format!("{}.append", self.name))
    }

    /// Path of the snapshot, `<directory>/<name>.backup`, if configured.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.directory
            .as_ref()
            .map(|dir| dir.join(format!("{}.backup", self.name)))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "cache".to_string(),
            check_period_ms: 1000,
            directory: None,
            fsync: FsyncPolicy::default(),
        }
    }
}
