//! Error types for the persistent cache
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the persistent cache.
///
/// Key absence and missing TTLs are not errors; those surface as `None`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Appending a command to the log failed; the mutation was not applied
    #[error("Failed to append to command log {path}: {source}")]
    LogAppend {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Truncating the log after a snapshot failed
    #[error("Failed to truncate command log {path}: {source}")]
    LogTruncate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the snapshot file failed
    #[error("Failed to write snapshot {path}: {source}")]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading a persistence file during recovery failed
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file could not be parsed
    #[error("Malformed snapshot {path}: {source}")]
    MalformedSnapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A command log line could not be parsed
    #[error("Malformed command at {path}:{line}: {source}")]
    MalformedCommand {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A command log line was written with an unknown format version
    #[error("Unsupported command log version {version} at {path}:{line}")]
    UnsupportedVersion {
        path: PathBuf,
        line: usize,
        version: u32,
    },

    /// Serializing a command or snapshot failed
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The cache has been closed and no longer accepts mutations
    #[error("Cache is closed")]
    Closed,
}

impl CacheError {
    /// Returns true for failures raised while rebuilding state from disk.
    pub fn is_recovery_error(&self) -> bool {
        matches!(
            self,
            CacheError::Read { .. }
                | CacheError::MalformedSnapshot { .. }
                | CacheError::MalformedCommand { .. }
                | CacheError::UnsupportedVersion { .. }
        )
    }
}

// == Result Type Alias ==
/// Convenience Result type for the persistent cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_append_display() {
        let err = CacheError::LogAppend {
            path: PathBuf::from("/tmp/app.append"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to append to command log /tmp/app.append: disk full"
        );
        assert!(!err.is_recovery_error());
    }

    #[test]
    fn test_unsupported_version_is_recovery_error() {
        let err = CacheError::UnsupportedVersion {
            path: PathBuf::from("app.append"),
            line: 3,
            version: 7,
        };
        assert!(err.is_recovery_error());
        assert_eq!(
            err.to_string(),
            "Unsupported command log version 7 at app.append:3"
        );
    }
}
