// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for daemon communication.
//!
//! Wire format: newline-delimited JSON over a local stream socket. One
//! request per connection; the server responds once and closes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tend_core::RunMode;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

/// Default client-side round-trip timeout.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Request from CLI to daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "kebab-case")]
pub enum Request {
    /// Daemon status snapshot.
    Status,

    /// Queue an agent run (the heartbeat stays the only executor).
    Run {
        agent: String,
        project: String,
        task: String,
        #[serde(default)]
        mode: RunMode,
    },

    /// List registered projects.
    ProjectsList,

    /// Register a project.
    ProjectsAdd {
        path: PathBuf,
        #[serde(default)]
        name: Option<String>,
    },

    /// Unregister a project by path or name.
    ProjectsRemove { target: String },

    /// List queued work items.
    QueueList,

    /// List recorded agent sessions across projects.
    SessionsList,

    /// The currently active session, if a pipeline is running.
    SessionsActive,

    /// Stop the daemon.
    Shutdown,
}

/// Response envelope: `{ok:true, data}` or `{ok:false, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Success with a data payload.
    pub fn ok(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                ok: true,
                data: Some(data),
                error: None,
            },
            Err(e) => Self::err(format!("failed to serialize response: {e}")),
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Status payload for the `status` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusData {
    pub version: String,
    pub uptime_secs: u64,
    pub heartbeat_running: bool,
    pub tick_count: u64,
    pub queue_size: usize,
    pub budget_remaining: u32,
    pub can_run: bool,
    pub projects: usize,
}

/// One recorded agent session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub project: PathBuf,
    pub agent: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Read one newline-delimited JSON message.
///
/// Returns the raw line so the caller can report "Invalid JSON" while
/// still answering on the same connection.
pub async fn read_line<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
) -> Result<String, ProtocolError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    Ok(line)
}

/// Parse a request line.
pub fn decode<T: DeserializeOwned>(line: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(line.trim())?)
}

/// Write one newline-delimited JSON message.
pub async fn write_line<T: Serialize, W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg: &T,
) -> Result<(), ProtocolError> {
    let mut json = serde_json::to_vec(msg)?;
    json.push(b'\n');
    writer.write_all(&json).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
