// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The heartbeat's collaborators, bound to the real substrate.
//!
//! Bridges the budget tracker, project registry, and pipeline engine
//! into the four-method port the heartbeat consumes.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tend_core::{PipelineStage, QueueItem, RunMode, SystemClock};
use tend_engine::{
    AgentRunner, EngineError, HeartbeatDeps, PipelineEngine, PipelineReport,
};
use tend_storage::{BudgetTracker, ProjectRegistry};

/// Production [`HeartbeatDeps`] implementation.
pub struct DaemonDeps<R: AgentRunner> {
    budget: Arc<BudgetTracker<SystemClock>>,
    engine: PipelineEngine<R, SystemClock>,
    registry: Arc<ProjectRegistry>,
    clock: SystemClock,
}

impl<R: AgentRunner> DaemonDeps<R> {
    pub fn new(
        budget: Arc<BudgetTracker<SystemClock>>,
        engine: PipelineEngine<R, SystemClock>,
        registry: Arc<ProjectRegistry>,
    ) -> Self {
        Self {
            budget,
            engine,
            registry,
            clock: SystemClock,
        }
    }
}

/// Map a queue item's agent field to a stage list.
///
/// The field is a comma-separated role list; a single name runs a
/// single-stage pipeline. Team mode marks every stage a team session.
pub fn stages_for_item(item: &QueueItem) -> Vec<PipelineStage> {
    item.agent
        .split(',')
        .map(str::trim)
        .filter(|agent| !agent.is_empty())
        .map(|agent| {
            if item.mode == RunMode::Team {
                PipelineStage::team(agent)
            } else {
                PipelineStage::new(agent)
            }
        })
        .collect()
}

#[async_trait]
impl<R: AgentRunner> HeartbeatDeps for DaemonDeps<R> {
    fn can_run_agent(&self) -> bool {
        match self.budget.can_run() {
            Ok(can_run) => can_run,
            Err(e) => {
                tracing::error!(error = %e, "budget check failed, holding back");
                false
            }
        }
    }

    fn record_usage(&self, prompts: u32) {
        if let Err(e) = self.budget.record_usage(prompts) {
            tracing::error!(error = %e, prompts, "failed to record budget usage");
        }
    }

    async fn run_pipeline(
        &self,
        item: &QueueItem,
        project_root: &Path,
    ) -> Result<PipelineReport, EngineError> {
        let stages = stages_for_item(item);
        let result = self.engine.run(stages, project_root, &item.task).await;

        use tend_core::Clock;
        if let Err(e) = self
            .registry
            .stamp_last_session(project_root, self.clock.now())
        {
            tracing::warn!(error = %e, "failed to stamp last session");
        }
        result
    }
}

#[cfg(test)]
#[path = "deps_tests.rs"]
mod tests;
