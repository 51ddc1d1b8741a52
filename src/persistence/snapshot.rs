//! Snapshot Module
//!
//! A snapshot is a JSON array of `{"key", "val", "ttl"}` objects where `ttl`
//! is the absolute expiry in Unix milliseconds and 0 means never.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::error::{CacheError, Result};

// == Snapshot Record ==
/// One serialized store entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub key: String,
    #[serde(rename = "val", alias = "value")]
    pub value: String,
    #[serde(rename = "ttl", alias = "expiresAt", default)]
    pub expires_at: u64,
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = OsString::from(path.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Overwrites the snapshot at `path`.
///
/// The data lands in a sibling `.tmp` file first and is renamed into place,
/// so readers see either the previous snapshot or the new one.
pub async fn write_snapshot(path: &Path, records: &[SnapshotRecord]) -> Result<()> {
    let data = serde_json::to_vec(records)?;
    let tmp = temp_path(path);
    let write_err = |source: std::io::Error| CacheError::SnapshotWrite {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::create(&tmp).await.map_err(write_err)?;
    file.write_all(&data).await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;
    drop(file);

    fs::rename(&tmp, path).await.map_err(write_err)?;
    Ok(())
}

/// Reads the snapshot at `path`. A missing file yields `None`.
pub async fn read_snapshot(path: &Path) -> Result<Option<Vec<SnapshotRecord>>> {
    let data = match fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CacheError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let records =
        serde_json::from_slice(&data).map_err(|source| CacheError::MalformedSnapshot {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Some(records))
}
