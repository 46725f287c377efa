// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline-state document and stage descriptors.
//!
//! One `pipeline-state.json` lives in each project's `.brain/` directory
//! and is rewritten at every stage transition. The document is the only
//! durable record of a run: the daemon recovers stalls from it after a
//! restart, and the dashboard reads it for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A stage to execute: which agent, in which mode, over which plan batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStage {
    pub agent: String,
    /// Run as a multi-agent team session instead of standalone.
    pub teams: bool,
    /// Which plan tasks a (builder, reviewer) pair covers, e.g. "Tasks 1-3".
    /// Absent until plan-expansion runs.
    pub batch_scope: Option<String>,
}

impl PipelineStage {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            teams: false,
            batch_scope: None,
        }
    }

    pub fn team(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            teams: true,
            batch_scope: None,
        }
    }

    pub fn with_batch_scope(mut self, scope: impl Into<String>) -> Self {
        self.batch_scope = Some(scope.into());
        self
    }
}

/// Overall status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Running,
    Completed,
    Failed,
    /// Flipped by the heartbeat when `updated_at` goes stale while running.
    Stalled,
}

/// Status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Per-stage entry in the pipeline-state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageState {
    pub agent: String,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_scope: Option<String>,
}

impl StageState {
    /// Fresh pending entry for a stage descriptor.
    pub fn pending(stage: &PipelineStage) -> Self {
        Self {
            agent: stage.agent.clone(),
            status: StageStatus::Pending,
            started_at: None,
            completed_at: None,
            session_id: None,
            validation: None,
            batch_scope: stage.batch_scope.clone(),
        }
    }
}

/// The per-project pipeline-state document.
///
/// Invariants: `stages.len() == pipeline.len()` at all times except
/// inside [`PipelineState::replace_stages`], which swaps both
/// atomically; `current_stage < stages.len()` while running; terminal
/// states freeze the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub project: PathBuf,
    pub task: String,
    /// Agent names, index-aligned with `stages`.
    pub pipeline: Vec<String>,
    pub status: PipelineStatus,
    pub current_stage: usize,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Total retries consumed across all batches.
    #[serde(default)]
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_verdict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stages: Vec<StageState>,
}

impl PipelineState {
    /// Initialize a running document with every stage pending.
    pub fn new(
        project: PathBuf,
        task: impl Into<String>,
        stages: &[PipelineStage],
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            project,
            task: task.into(),
            pipeline: stages.iter().map(|s| s.agent.clone()).collect(),
            status: PipelineStatus::Running,
            current_stage: 0,
            started_at: now,
            updated_at: now,
            retries: 0,
            final_verdict: None,
            error: None,
            stages: stages.iter().map(StageState::pending).collect(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            PipelineStatus::Completed | PipelineStatus::Failed
        )
    }

    /// Mark stage `i` running and point `current_stage` at it.
    pub fn stage_running(&mut self, i: usize, now: DateTime<Utc>) {
        self.current_stage = i;
        if let Some(stage) = self.stages.get_mut(i) {
            stage.status = StageStatus::Running;
            stage.started_at = Some(now);
        }
    }

    /// Mark stage `i` completed with a passed validation.
    pub fn stage_completed(&mut self, i: usize, now: DateTime<Utc>) {
        if let Some(stage) = self.stages.get_mut(i) {
            stage.status = StageStatus::Completed;
            stage.completed_at = Some(now);
            stage.validation = Some("passed".to_string());
        }
    }

    /// Mark stage `i` failed and the pipeline with it.
    pub fn stage_failed(&mut self, i: usize, error: impl Into<String>, now: DateTime<Utc>) {
        let error = error.into();
        if let Some(stage) = self.stages.get_mut(i) {
            stage.status = StageStatus::Failed;
            stage.completed_at = Some(now);
            stage.validation = Some(error.clone());
        }
        self.status = PipelineStatus::Failed;
        self.error = Some(error);
    }

    /// Atomically replace the stage list (plan-expansion).
    ///
    /// The completed prefix is preserved by the caller passing it back in
    /// `stages`; `pipeline` is rebuilt so the index alignment invariant
    /// holds on both sides of the swap.
    pub fn replace_stages(&mut self, stages: Vec<StageState>) {
        self.pipeline = stages.iter().map(|s| s.agent.clone()).collect();
        self.stages = stages;
    }

    /// Reset stages `[from..]` to pending (review-loop rewind).
    pub fn reset_stages_from(&mut self, from: usize) {
        for stage in self.stages.iter_mut().skip(from) {
            stage.status = StageStatus::Pending;
            stage.started_at = None;
            stage.completed_at = None;
            stage.session_id = None;
            stage.validation = None;
        }
    }

    /// Freeze the document as completed.
    pub fn complete(&mut self, final_verdict: impl Into<String>) {
        self.status = PipelineStatus::Completed;
        self.final_verdict = Some(final_verdict.into());
    }

    /// Freeze the document as failed with the given final verdict.
    pub fn fail(&mut self, final_verdict: impl Into<String>) {
        self.status = PipelineStatus::Failed;
        self.final_verdict = Some(final_verdict.into());
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
