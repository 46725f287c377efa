// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tend-storage: crash-safe JSON state substrate.
//!
//! Every durable document is pretty-printed JSON, rewritten atomically
//! (temp file + rename) with mutations serialized under an advisory
//! file lock. Reads are lock-free and best-effort consistent.

pub mod budget;
pub mod locked;
pub mod pipeline_store;
pub mod projects;
pub mod queue;
pub mod trigger_state;

pub use budget::{BudgetConfig, BudgetEntry, BudgetTracker};
pub use projects::{Project, ProjectRegistry};
pub use queue::WorkQueue;
pub use trigger_state::TriggerStateStore;

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the state substrate.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not acquire lock on {path} after {attempts} attempts")]
    LockBusy { path: PathBuf, attempts: u32 },

    #[error("{0}")]
    Conflict(String),
}
