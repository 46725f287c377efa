// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project pipeline-state persistence.
//!
//! The pipeline engine is the sole writer of a project's document while
//! it runs; the heartbeat's stall sweep is the one sanctioned exception
//! (flipping running to stalled).

use crate::locked::{load_json, save_json_atomic};
use crate::StorageError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tend_core::PipelineState;

/// `.brain/` directory for a project root.
pub fn brain_dir(project_root: &Path) -> PathBuf {
    project_root.join(".brain")
}

/// Path of the pipeline-state document for a project root.
pub fn state_path(project_root: &Path) -> PathBuf {
    brain_dir(project_root).join("pipeline-state.json")
}

/// Load a project's pipeline-state, `None` when no run was recorded.
pub fn load(project_root: &Path) -> Result<Option<PipelineState>, StorageError> {
    load_json(&state_path(project_root))
}

/// Write the initial document for a new run, replacing whatever a
/// previous run left behind (including a terminal document).
pub fn init(
    project_root: &Path,
    state: &mut PipelineState,
    now: DateTime<Utc>,
) -> Result<(), StorageError> {
    state.updated_at = now;
    save_json_atomic(&state_path(project_root), state)
}

/// Persist a pipeline-state, advancing `updated_at`.
///
/// Terminal documents are frozen: once a completed or failed state is
/// on disk, further writes are refused here rather than relying on
/// every caller to check first. Writing a terminal state over a
/// non-terminal one is allowed; that is how a run ends. A new run
/// starts over with [`init`].
pub fn save(
    project_root: &Path,
    state: &mut PipelineState,
    now: DateTime<Utc>,
) -> Result<(), StorageError> {
    let path = state_path(project_root);
    if let Some(existing) = load_json::<PipelineState>(&path)? {
        if existing.is_terminal() {
            return Err(StorageError::Conflict(format!(
                "pipeline-state for {} is terminal and frozen",
                project_root.display()
            )));
        }
    }
    state.updated_at = now;
    save_json_atomic(&path, state)
}

#[cfg(test)]
#[path = "pipeline_store_tests.rs"]
mod tests;
