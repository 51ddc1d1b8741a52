//! Recovery Module
//!
//! Rebuilds a store from the last snapshot plus the command log written since.
//! A missing file means "nothing to restore"; any parse failure aborts the
//! whole recovery so no partial state is handed back.

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::cache::CacheStore;
use crate::error::{CacheError, Result};
use crate::persistence::command::{decode_line, LineError};
use crate::persistence::snapshot::read_snapshot;

/// Outcome of a successful recovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Entries loaded from the snapshot
    pub restored_entries: usize,
    /// Commands replayed from the log
    pub replayed_commands: usize,
}

/// Loads `snapshot_path` (if any) and replays `log_path` on top of it.
pub async fn recover(
    snapshot_path: Option<&Path>,
    log_path: &Path,
) -> Result<(CacheStore, RecoveryReport)> {
    let records = match snapshot_path {
        Some(path) => read_snapshot(path).await?,
        None => None,
    };

    let mut report = RecoveryReport::default();
    let mut store = match records {
        Some(records) => {
            report.restored_entries = records.len();
            CacheStore::from_snapshot(records)
        }
        None => {
            info!("No snapshot found, starting from an empty store");
            CacheStore::new()
        }
    };

    report.replayed_commands = replay_log(log_path, &mut store).await?;
    info!(
        "Recovery complete: {} entries from snapshot, {} commands replayed",
        report.restored_entries, report.replayed_commands
    );
    Ok((store, report))
}

/// Applies every command in the log to `store`, in file order.
///
/// Returns the number of commands applied.
pub async fn replay_log(path: &Path, store: &mut CacheStore) -> Result<usize> {
    let read_err = |source: std::io::Error| CacheError::Read {
        path: path.to_path_buf(),
        source,
    };

    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("Command log not found, nothing to replay");
            return Ok(0);
        }
        Err(e) => return Err(read_err(e)),
    };

    let mut lines = BufReader::new(file).lines();
    let mut line_no = 0;
    let mut count = 0;

    while let Some(line) = lines.next_line().await.map_err(read_err)? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let command = decode_line(&line).map_err(|e| match e {
            LineError::Malformed(source) => CacheError::MalformedCommand {
                path: path.to_path_buf(),
                line: line_no,
                source,
            },
            LineError::UnsupportedVersion(version) => CacheError::UnsupportedVersion {
                path: path.to_path_buf(),
                line: line_no,
                version,
            },
        })?;
        store.apply(command);
        count += 1;
    }

    Ok(count)
}
