// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess agent runner.
//!
//! Production binding of the engine's runner port: invokes the
//! configured agent command in the project root and reads an optional
//! trailing JSON report from stdout. Everything agent-specific stays
//! behind the command's own CLI.

use async_trait::async_trait;
use serde::Deserialize;
use tend_core::Review;
use tend_engine::{AgentInvocation, AgentOutcome, AgentRunner, RunnerError};

/// Trailing JSON report some agent tools print as their last stdout line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolReport {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    review: Option<Review>,
}

/// Runs agents by shelling out to a configurable command.
#[derive(Debug, Clone)]
pub struct CommandAgentRunner {
    command: String,
}

impl CommandAgentRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl AgentRunner for CommandAgentRunner {
    async fn run_agent(&self, invocation: AgentInvocation) -> Result<AgentOutcome, RunnerError> {
        tracing::info!(
            command = %self.command,
            agent = %invocation.agent,
            mode = %invocation.mode,
            project = %invocation.project_root.display(),
            "spawning agent session"
        );

        let output = tokio::process::Command::new(&self.command)
            .arg("--agent")
            .arg(&invocation.agent)
            .arg("--mode")
            .arg(invocation.mode.to_string())
            .arg("-p")
            .arg(&invocation.task)
            .current_dir(&invocation.project_root)
            .output()
            .await
            .map_err(|e| RunnerError::SpawnFailed(format!("{}: {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            return Err(RunnerError::SessionFailed(format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                tail.join("\n")
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .and_then(|line| serde_json::from_str::<ToolReport>(line.trim()).ok());

        let (session_id, review) = match report {
            Some(report) => (report.session_id, report.review),
            None => (None, None),
        };

        Ok(AgentOutcome {
            session_id: session_id.or_else(|| Some(uuid::Uuid::new_v4().to_string())),
            review,
        })
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
