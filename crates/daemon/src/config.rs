// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration file.
//!
//! A single JSON document: registered projects, triggers, the budget
//! window, and the optional webhook listener. Malformed JSON or an
//! unknown cron schedule fails startup loudly; everything optional
//! falls back to a default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tend_core::{RunMode, TriggerConfig};
use tend_storage::BudgetConfig;
use thiserror::Error;

/// Default heartbeat interval (one minute).
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 60_000;

/// Default agent command for the subprocess runner.
pub const DEFAULT_AGENT_COMMAND: &str = "claude";

/// Configuration errors surface at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// A project entry in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One webhook event mapping rule; first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMapping {
    /// Mapping key like "issues.labeled" or "pull_request.opened".
    pub event: String,
    /// Required label name for "issues.labeled" rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Agent override; each event kind has a default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default)]
    pub mode: RunMode,
    /// Task override; defaults to a template over the event payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

/// GitHub webhook settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubConfig {
    pub secret: String,
    #[serde(default)]
    pub events: Vec<EventMapping>,
}

/// Webhook listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub port: u16,
    pub github: GithubConfig,
}

/// The daemon config document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookConfig>,
    /// Command the subprocess runner invokes for agent sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_command: Option<String>,
}

impl DaemonConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(
            self.heartbeat_interval_ms
                .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_MS),
        )
    }

    pub fn agent_command(&self) -> &str {
        self.agent_command.as_deref().unwrap_or(DEFAULT_AGENT_COMMAND)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
