// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger configuration.

use crate::queue::RunMode;
use serde::{Deserialize, Serialize};

/// A configured time-based trigger.
///
/// The schedule is a five-field cron expression. Runtime state (the
/// last-fired timestamp) lives outside this struct, persisted per
/// trigger so it survives restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    /// Unique trigger name.
    pub name: String,
    /// Cron expression, e.g. "0 3 * * *".
    pub schedule: String,
    /// Project path or registry short name.
    pub project: String,
    /// Agent name or comma-separated stage list.
    pub agent: String,
    pub task: String,
    #[serde(default)]
    pub mode: RunMode,
}

/// Sanitize a trigger name for use in a state file name.
///
/// Lowercases and maps anything outside `[a-z0-9-]` to `-` so
/// "webhook:issue-7" becomes "webhook-issue-7".
pub fn sanitize_trigger_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
