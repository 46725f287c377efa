// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pipeline engine.
//!
//! Runs an ordered list of agent stages against a project, validating
//! each stage's artifacts, routing reviewer verdicts, and persisting
//! pipeline-state at every transition. The engine is the sole writer of
//! the project's pipeline-state for the duration of the run.

use crate::brain;
use crate::plan::{self, DEFAULT_BATCH_SIZE, DEFAULT_EXPAND_FROM};
use crate::prompts::build_stage_task;
use crate::runner::{AgentInvocation, AgentRunner};
use crate::validate::validate_stage;
use crate::EngineError;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tend_core::{AgentRole, Clock, PipelineStage, PipelineState, RunMode, StageState, Verdict};
use tend_storage::pipeline_store;

/// Retry key used when no plan expansion assigned batch scopes.
const UNSCOPED_BATCH_KEY: &str = "*";

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Review-loop retries allowed per batch scope.
    pub max_retries: u32,
    /// Plan tasks per (builder, reviewer) batch.
    pub batch_size: u32,
    /// Agent-name substring the expansion starts from.
    pub expand_from: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            batch_size: DEFAULT_BATCH_SIZE,
            expand_from: DEFAULT_EXPAND_FROM.to_string(),
        }
    }
}

/// Outcome of a pipeline run, consumed by the heartbeat for budget
/// accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub completed: bool,
    pub final_verdict: Option<String>,
    pub stages_run: u32,
    pub standalone_stages: u32,
    pub team_stages: u32,
    /// Total review-loop retries consumed across all batches.
    pub retries: u32,
}

/// Drives staged agent runs with validation, verdict routing, and
/// per-batch retry.
pub struct PipelineEngine<R, C> {
    runner: R,
    clock: C,
    config: EngineConfig,
}

impl<R: AgentRunner, C: Clock> PipelineEngine<R, C> {
    pub fn new(runner: R, clock: C) -> Self {
        Self::with_config(runner, clock, EngineConfig::default())
    }

    pub fn with_config(runner: R, clock: C, config: EngineConfig) -> Self {
        Self {
            runner,
            clock,
            config,
        }
    }

    /// Run `stages` against `project_root`.
    ///
    /// Returns `Ok` with `completed: false` for validation failures and
    /// exhausted retries; returns `Err` when the runner itself fails
    /// (the stage failure is persisted first either way).
    pub async fn run(
        &self,
        stages: Vec<PipelineStage>,
        project_root: &Path,
        task: &str,
    ) -> Result<PipelineReport, EngineError> {
        if stages.is_empty() {
            return Err(EngineError::EmptyStages);
        }
        let mut stages = stages;

        brain::ensure_project_context(project_root, task)?;

        let mut state =
            PipelineState::new(project_root.to_path_buf(), task, &stages, self.clock.now());
        pipeline_store::init(project_root, &mut state, self.clock.now())?;

        let mut retries: HashMap<String, u32> = HashMap::new();
        let mut retry_marks: HashSet<usize> = HashSet::new();
        let mut expanded = false;
        let mut stages_run = 0u32;
        let mut standalone_stages = 0u32;
        let mut team_stages = 0u32;

        let mut i = 0usize;
        while i < stages.len() {
            state.stage_running(i, self.clock.now());
            pipeline_store::save(project_root, &mut state, self.clock.now())?;

            let retrying = retry_marks.remove(&i);
            let stage = stages[i].clone();
            let role = AgentRole::detect(&stage.agent);
            let invocation = AgentInvocation {
                agent: stage.agent.clone(),
                project_root: project_root.to_path_buf(),
                task: build_stage_task(i, &stage, task, retrying),
                mode: if stage.teams {
                    RunMode::Team
                } else {
                    RunMode::Standalone
                },
            };

            tracing::info!(
                stage = i,
                agent = %stage.agent,
                batch_scope = stage.batch_scope.as_deref().unwrap_or("-"),
                retry = retrying,
                "running stage"
            );

            let outcome = match self.runner.run_agent(invocation).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    state.stage_failed(i, e.to_string(), self.clock.now());
                    pipeline_store::save(project_root, &mut state, self.clock.now())?;
                    return Err(e.into());
                }
            };
            stages_run += 1;
            if stage.teams {
                team_stages += 1;
            } else {
                standalone_stages += 1;
            }
            if let Some(stage_state) = state.stages.get_mut(i) {
                stage_state.session_id = outcome.session_id.clone();
            }

            if role == Some(AgentRole::Architect) {
                let swept = brain::sweep_plan_parts(project_root)?;
                if !swept.is_empty() {
                    tracing::info!(count = swept.len(), "swept PLAN-PART files before validation");
                }
            }

            if let Err(detail) = validate_stage(&stage.agent, project_root, &outcome).await {
                let final_verdict = format!("VALIDATION_FAILED: {detail}");
                state.stage_failed(i, detail.to_string(), self.clock.now());
                state.final_verdict = Some(final_verdict.clone());
                pipeline_store::save(project_root, &mut state, self.clock.now())?;
                return Ok(PipelineReport {
                    completed: false,
                    final_verdict: Some(final_verdict),
                    stages_run,
                    standalone_stages,
                    team_stages,
                    retries: retries.values().sum(),
                });
            }

            state.stage_completed(i, self.clock.now());
            pipeline_store::save(project_root, &mut state, self.clock.now())?;

            if role == Some(AgentRole::Architect) && !expanded {
                if let Some(applied) = self.try_expand(&stages, i, project_root)? {
                    stages = applied;
                    expanded = true;
                    let mut entries: Vec<StageState> = state.stages[..=i].to_vec();
                    entries.extend(stages[i + 1..].iter().map(StageState::pending));
                    state.replace_stages(entries);
                    pipeline_store::save(project_root, &mut state, self.clock.now())?;
                }
            }

            if role == Some(AgentRole::Reviewer) {
                let verdict = outcome
                    .review
                    .as_ref()
                    .map(|r| r.verdict)
                    .or_else(|| brain::parse_verdict_from_review(project_root))
                    // Fail closed: an unreadable verdict never claims success.
                    .unwrap_or(Verdict::Revise);

                if verdict != Verdict::Approve {
                    let batch_key = stage
                        .batch_scope
                        .clone()
                        .unwrap_or_else(|| UNSCOPED_BATCH_KEY.to_string());
                    let used = retries.entry(batch_key.clone()).or_insert(0);
                    if *used >= self.config.max_retries {
                        tracing::warn!(
                            batch = %batch_key,
                            verdict = %verdict,
                            "retry budget exhausted, failing pipeline"
                        );
                        state.fail(verdict.to_string());
                        pipeline_store::save(project_root, &mut state, self.clock.now())?;
                        return Ok(PipelineReport {
                            completed: false,
                            final_verdict: Some(verdict.to_string()),
                            stages_run,
                            standalone_stages,
                            team_stages,
                            retries: retries.values().sum(),
                        });
                    }
                    *used += 1;
                    state.retries = retries.values().sum();

                    // Give the retry prompt a REVIEW.md to read when the
                    // verdict only arrived on the structured channel.
                    if let Some(review) = &outcome.review {
                        brain::write_review_md(project_root, review)?;
                    }

                    let target = match verdict {
                        Verdict::Redesign => stages
                            .iter()
                            .position(|s| AgentRole::detect(&s.agent) == Some(AgentRole::Architect))
                            .unwrap_or(0),
                        _ => stages[..=i]
                            .iter()
                            .rposition(|s| AgentRole::detect(&s.agent) == Some(AgentRole::Builder))
                            .unwrap_or_else(|| i.saturating_sub(1)),
                    };

                    tracing::info!(
                        verdict = %verdict,
                        batch = %batch_key,
                        rewind_to = target,
                        "review loop rewinding"
                    );

                    for idx in target..=i {
                        retry_marks.insert(idx);
                    }
                    state.reset_stages_from(target);
                    pipeline_store::save(project_root, &mut state, self.clock.now())?;
                    i = target;
                    continue;
                }
            }

            i += 1;
        }

        state.complete(Verdict::Approve.to_string());
        pipeline_store::save(project_root, &mut state, self.clock.now())?;

        Ok(PipelineReport {
            completed: true,
            final_verdict: Some(Verdict::Approve.to_string()),
            stages_run,
            standalone_stages,
            team_stages,
            retries: retries.values().sum(),
        })
    }

    /// Parse the fresh plan and expand the stage tail, when applicable.
    fn try_expand(
        &self,
        stages: &[PipelineStage],
        architect_idx: usize,
        project_root: &Path,
    ) -> Result<Option<Vec<PipelineStage>>, EngineError> {
        let Some(plan_text) = brain::read_plan(project_root)? else {
            return Ok(None);
        };
        let tasks = plan::parse_plan_tasks(&plan_text);
        if tasks.is_empty() {
            return Ok(None);
        }
        let expanded = plan::expand_stages(
            stages,
            tasks.len() as u32,
            &self.config.expand_from,
            self.config.batch_size,
        );
        if expanded == stages {
            return Ok(None);
        }
        // The expansion replaces only stages after the architect; the
        // completed prefix must be untouched for the state swap to hold.
        debug_assert!(expanded.len() > architect_idx);
        tracing::info!(
            tasks = tasks.len(),
            stages = expanded.len(),
            "expanded plan into batched build/review stages"
        );
        Ok(Some(expanded))
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
