// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage artifact validation.
//!
//! After each stage the engine checks that the agent actually produced
//! what its role promises. Validation failures are terminal for the
//! pipeline; they are not retried.

use crate::brain;
use crate::plan::{numbering_is_contiguous, parse_plan_tasks};
use crate::runner::AgentOutcome;
use std::path::Path;
use tend_core::AgentRole;
use thiserror::Error;

/// A stage produced the wrong artifacts.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("research directory is missing or has no markdown files")]
    MissingResearch,

    #[error("PLAN.md is missing or empty")]
    MissingPlan,

    #[error("plan tasks are not numbered contiguously from 1")]
    BadPlanNumbering,

    #[error("builder produced no working-tree changes")]
    NoDiff,

    #[error("git status failed: {0}")]
    GitStatus(String),

    #[error("test command failed: {0}")]
    TestsFailed(String),

    #[error("reviewer produced no verdict")]
    MissingVerdict,
}

/// Validate the artifacts a stage must have produced.
///
/// Unknown agent roles get no validation.
pub async fn validate_stage(
    agent: &str,
    project_root: &Path,
    outcome: &AgentOutcome,
) -> Result<(), ValidationError> {
    match AgentRole::detect(agent) {
        Some(AgentRole::Scout) => validate_scout(project_root),
        Some(AgentRole::Architect) => validate_architect(project_root),
        Some(AgentRole::Builder) => validate_builder(project_root).await,
        Some(AgentRole::Reviewer) => validate_reviewer(project_root, outcome),
        None => Ok(()),
    }
}

fn validate_scout(project_root: &Path) -> Result<(), ValidationError> {
    let dir = brain::research_dir(project_root);
    let entries = std::fs::read_dir(&dir).map_err(|_| ValidationError::MissingResearch)?;
    let has_markdown = entries
        .filter_map(|e| e.ok())
        .any(|e| e.path().extension().is_some_and(|ext| ext == "md"));
    if has_markdown {
        Ok(())
    } else {
        Err(ValidationError::MissingResearch)
    }
}

fn validate_architect(project_root: &Path) -> Result<(), ValidationError> {
    let plan = std::fs::read_to_string(brain::plan_path(project_root))
        .map_err(|_| ValidationError::MissingPlan)?;
    if plan.trim().is_empty() {
        return Err(ValidationError::MissingPlan);
    }
    let tasks = parse_plan_tasks(&plan);
    if !tasks.is_empty() && !numbering_is_contiguous(&tasks) {
        return Err(ValidationError::BadPlanNumbering);
    }
    Ok(())
}

async fn validate_builder(project_root: &Path) -> Result<(), ValidationError> {
    let status = tokio::process::Command::new("git")
        .args(["status", "-s"])
        .current_dir(project_root)
        .output()
        .await
        .map_err(|e| ValidationError::GitStatus(e.to_string()))?;
    if !status.status.success() {
        return Err(ValidationError::GitStatus(
            String::from_utf8_lossy(&status.stderr).trim().to_string(),
        ));
    }
    if status.stdout.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ValidationError::NoDiff);
    }

    if has_test_script(project_root) {
        let test = tokio::process::Command::new("npm")
            .arg("test")
            .current_dir(project_root)
            .output()
            .await
            .map_err(|e| ValidationError::TestsFailed(e.to_string()))?;
        if !test.status.success() {
            let stderr = String::from_utf8_lossy(&test.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(ValidationError::TestsFailed(tail));
        }
    }
    Ok(())
}

/// Whether the project's package.json declares a test script.
pub(crate) fn has_test_script(project_root: &Path) -> bool {
    let Ok(raw) = std::fs::read_to_string(project_root.join("package.json")) else {
        return false;
    };
    let Ok(json) = serde_json::from_str::<serde_json::Value>(&raw) else {
        return false;
    };
    json.get("scripts")
        .and_then(|s| s.get("test"))
        .and_then(|t| t.as_str())
        .is_some()
}

fn validate_reviewer(project_root: &Path, outcome: &AgentOutcome) -> Result<(), ValidationError> {
    if outcome.review.is_some() {
        return Ok(());
    }
    let review = std::fs::read_to_string(brain::review_path(project_root))
        .map_err(|_| ValidationError::MissingVerdict)?;
    if review.trim().is_empty() {
        return Err(ValidationError::MissingVerdict);
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
