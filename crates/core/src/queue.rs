// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deferred work items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How an agent session is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Single agent session.
    #[default]
    Standalone,
    /// Multi-agent team session.
    Team,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Standalone => write!(f, "standalone"),
            RunMode::Team => write!(f, "team"),
        }
    }
}

/// Error parsing a [`RunMode`] from a string.
#[derive(Debug, Error)]
#[error("unknown run mode '{0}' (expected 'standalone' or 'team')")]
pub struct ParseRunModeError(String);

impl FromStr for RunMode {
    type Err = ParseRunModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standalone" => Ok(RunMode::Standalone),
            "team" => Ok(RunMode::Team),
            other => Err(ParseRunModeError(other.to_string())),
        }
    }
}

/// One unit of deferred work in the persisted queue.
///
/// `project` carries either an absolute path or a registry short name;
/// the heartbeat resolves short names late, at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Name of the trigger that produced this item
    /// (e.g. "nightly", "webhook:issue-7", "stall-recovery").
    pub trigger_name: String,
    #[serde(rename = "projectPath")]
    pub project: String,
    /// Agent name or comma-separated stage list.
    pub agent: String,
    pub task: String,
    #[serde(default)]
    pub mode: RunMode,
    pub enqueued_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
