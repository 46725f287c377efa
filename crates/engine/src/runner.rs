// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent runner port.
//!
//! The engine drives agent sessions through this trait and never knows
//! which tool is behind it. The daemon binds a subprocess adapter; tests
//! bind [`FakeRunner`].

use async_trait::async_trait;
use std::path::PathBuf;
use tend_core::{Review, RunMode};
use thiserror::Error;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
#[path = "runner_fake.rs"]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRunner, RunnerCall};

/// Errors from agent execution.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("agent spawn failed: {0}")]
    SpawnFailed(String),

    #[error("agent session failed: {0}")]
    SessionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One stage invocation handed to the runner.
#[derive(Debug, Clone)]
pub struct AgentInvocation {
    pub agent: String,
    pub project_root: PathBuf,
    pub task: String,
    pub mode: RunMode,
}

/// What came back from an agent session.
///
/// `review` is the structured verdict channel; most agents only leave
/// artifacts in `.brain/` and return nothing here.
#[derive(Debug, Clone, Default)]
pub struct AgentOutcome {
    pub session_id: Option<String>,
    pub review: Option<Review>,
}

/// Port to the external agent tool.
#[async_trait]
pub trait AgentRunner: Send + Sync + 'static {
    /// Run one agent session to completion and report its outcome.
    async fn run_agent(&self, invocation: AgentInvocation) -> Result<AgentOutcome, RunnerError>;
}
