//! Persistence Module
//!
//! On-disk formats and file I/O: the command log, snapshots, and recovery.

mod command;
mod log;
mod recovery;
mod snapshot;

pub use command::{decode_line, encode_line, Command, KeyValue, LineError, LOG_FORMAT_VERSION};
pub use log::CommandLog;
pub use recovery::{recover, replay_log, RecoveryReport};
pub use snapshot::{read_snapshot, write_snapshot, SnapshotRecord};
