//! Command Codec Module
//!
//! Mutations are persisted as one JSON object per line:
//!
//! ```text
//! {"v":1,"cmd":"set","key":"foo","val":"bar","ttl":10}
//! {"v":1,"cmd":"mset","keyValue":[{"key":"a","val":"b"}]}
//! {"v":1,"cmd":"del","key":"foo"}
//! {"v":1,"cmd":"ttl","key":"foo","ttl":5}
//! ```
//!
//! `ttl` is always relative seconds, evaluated when the command is applied.

use serde::{Deserialize, Serialize};

/// Current on-disk version of command log lines.
pub const LOG_FORMAT_VERSION: u32 = 1;

// == Key Value ==
/// One element of a multi-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(rename = "val")]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>, ttl: Option<u64>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl,
        }
    }
}

// == Command ==
/// A single durable mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    #[serde(rename = "set")]
    Set {
        key: String,
        #[serde(rename = "val")]
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ttl: Option<u64>,
    },
    #[serde(rename = "mset")]
    MultiSet {
        #[serde(rename = "keyValue")]
        entries: Vec<KeyValue>,
    },
    #[serde(rename = "del")]
    Delete { key: String },
    #[serde(rename = "ttl")]
    SetTtl { key: String, ttl: u64 },
}

impl Command {
    /// Short name used in log output.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Set { .. } => "set",
            Command::MultiSet { .. } => "mset",
            Command::Delete { .. } => "del",
            Command::SetTtl { .. } => "ttl",
        }
    }
}

#[derive(Serialize)]
struct LogRecordRef<'a> {
    v: u32,
    #[serde(flatten)]
    command: &'a Command,
}

#[derive(Deserialize)]
struct LogRecord {
    #[serde(flatten)]
    command: Command,
}

#[derive(Deserialize)]
struct VersionProbe {
    #[serde(default = "unversioned")]
    v: u32,
}

// Lines written before versioning carry no `v` field.
fn unversioned() -> u32 {
    1
}

// == Line Error ==
/// Why a single log line could not be decoded.
#[derive(Debug)]
pub enum LineError {
    Malformed(serde_json::Error),
    UnsupportedVersion(u32),
}

/// Serializes a command as one newline-terminated log line.
pub fn encode_line(command: &Command) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(&LogRecordRef {
        v: LOG_FORMAT_VERSION,
        command,
    })?;
    line.push('\n');
    Ok(line)
}

/// Parses one log line (without its trailing newline).
pub fn decode_line(line: &str) -> Result<Command, LineError> {
    let probe: VersionProbe = serde_json::from_str(line).map_err(LineError::Malformed)?;
    if probe.v != LOG_FORMAT_VERSION {
        return Err(LineError::UnsupportedVersion(probe.v));
    }
    let record: LogRecord = serde_json::from_str(line).map_err(LineError::Malformed)?;
    Ok(record.command)
}
