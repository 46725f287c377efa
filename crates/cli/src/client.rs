// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands.

use std::path::PathBuf;
use std::time::Duration;
use tend_daemon::protocol::{self, ProtocolError, Request, Response};
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::UnixStream;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running (start it with `tendd`)")]
    DaemonNotRunning,

    #[error("could not determine state directory")]
    NoStateDir,

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// One-request-per-connection daemon client.
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DaemonClient {
    /// Client against the user-level daemon socket.
    pub fn connect() -> Result<Self, ClientError> {
        let state_dir = tend_daemon::env::state_dir().ok_or(ClientError::NoStateDir)?;
        Ok(Self {
            socket_path: state_dir.join("tendd.sock"),
            timeout: protocol::DEFAULT_TIMEOUT,
        })
    }

    #[cfg(test)]
    pub fn with_socket(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: protocol::DEFAULT_TIMEOUT,
        }
    }

    /// Send one request and read the response, bounded by the
    /// round-trip timeout.
    pub async fn request(&self, request: &Request) -> Result<Response, ClientError> {
        let exchange = async {
            let stream = UnixStream::connect(&self.socket_path)
                .await
                .map_err(|_| ClientError::DaemonNotRunning)?;
            let (read_half, mut write_half) = stream.into_split();

            protocol::write_line(&mut write_half, request)
                .await
                .map_err(ClientError::Protocol)?;

            let mut reader = BufReader::new(read_half);
            let line = protocol::read_line(&mut reader)
                .await
                .map_err(ClientError::Protocol)?;
            protocol::decode::<Response>(&line).map_err(ClientError::Protocol)
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ClientError::Protocol(ProtocolError::Timeout))?
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
