//! Command Log Module
//!
//! Append-only file of newline-delimited commands. A command is written and
//! flushed before it is applied to the store; compaction truncates the file
//! once a snapshot covers its history.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::config::FsyncPolicy;
use crate::error::{CacheError, Result};
use crate::persistence::command::{encode_line, Command};

// == Command Log ==
/// Writer half of the command log.
#[derive(Debug)]
pub struct CommandLog {
    path: PathBuf,
    file: Option<File>,
    policy: FsyncPolicy,
    /// Length of the file up to the last complete line
    len: u64,
    /// Appended bytes not yet fsynced
    dirty: bool,
}

impl CommandLog {
    /// Opens (creating if needed) the log at `path` in append mode.
    pub async fn open(path: PathBuf, policy: FsyncPolicy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| CacheError::LogAppend {
                path: path.clone(),
                source,
            })?;

        let len = file
            .metadata()
            .await
            .map_err(|source| CacheError::Read {
                path: path.clone(),
                source,
            })?
            .len();

        info!("Command log opened: {:?}", path);
        Ok(Self {
            path,
            file: Some(file),
            policy,
            len,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    // == Append ==
    /// Writes one command line. On error the caller must not apply the command.
    ///
    /// A failed write leaves no partial line behind: the file is cut back to
    /// its last complete line.
    pub async fn append(&mut self, command: &Command) -> Result<()> {
        let line = encode_line(command)?;
        let sync = self.policy == FsyncPolicy::Always;
        let file = self.file.as_mut().ok_or(CacheError::Closed)?;

        if let Err(source) = write_line(file, line.as_bytes(), sync).await {
            self.discard_partial().await;
            return Err(CacheError::LogAppend {
                path: self.path.clone(),
                source,
            });
        }

        self.len += line.len() as u64;
        if !sync {
            self.dirty = true;
        }
        Ok(())
    }

    /// Drops any bytes past the last complete line.
    async fn discard_partial(&mut self) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        match file.set_len(self.len).await {
            Ok(()) => debug!("Discarded partial line in {:?}", self.path),
            Err(e) => error!("Failed to discard partial line in {:?}: {}", self.path, e),
        }
    }

    // == Sync ==
    /// Forces appended data to disk if anything is pending.
    pub async fn sync(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(file) = self.file.as_mut() {
            file.sync_data()
                .await
                .map_err(|source| CacheError::LogAppend {
                    path: self.path.clone(),
                    source,
                })?;
        }
        self.dirty = false;
        Ok(())
    }

    // == Truncate ==
    /// Empties the log. Later appends start at offset 0.
    pub async fn truncate(&mut self) -> Result<()> {
        let file = self.file.as_mut().ok_or(CacheError::Closed)?;
        let truncate_err = |source: std::io::Error| CacheError::LogTruncate {
            path: self.path.clone(),
            source,
        };

        file.set_len(0).await.map_err(truncate_err)?;
        file.sync_all().await.map_err(truncate_err)?;
        self.len = 0;
        self.dirty = false;
        debug!("Command log truncated: {:?}", self.path);
        Ok(())
    }

    // == Close ==
    /// Syncs and releases the file handle. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        if self.policy != FsyncPolicy::Never {
            self.sync().await?;
        }
        if self.file.take().is_some() {
            debug!("Command log closed: {:?}", self.path);
        }
        Ok(())
    }
}

async fn write_line(file: &mut File, line: &[u8], sync: bool) -> std::io::Result<()> {
    file.write_all(line).await?;
    file.flush().await?;
    if sync {
        file.sync_data().await?;
    }
    Ok(())
}
