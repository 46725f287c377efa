// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The heartbeat scheduler.
//!
//! A single tick loop reconciles stalled pipelines, due triggers, queued
//! work, and the prompt budget into at most one active execution. The
//! busy latch here is the daemon's only concurrency constraint: every
//! other component is a queue producer.
//!
//! The heartbeat owns no concrete collaborators; budget checks and
//! pipeline execution arrive through [`HeartbeatDeps`].

use crate::pipeline::PipelineReport;
use crate::trigger::CronTrigger;
use crate::EngineError;
use async_trait::async_trait;
use chrono::Duration;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tend_core::{Clock, QueueItem, TriggerConfig};
use tend_storage::{pipeline_store, ProjectRegistry, WorkQueue};

/// Estimated prompts consumed by one standalone stage.
const PROMPTS_PER_STANDALONE_STAGE: u32 = 10;

/// Estimated prompts consumed by one team stage.
const PROMPTS_PER_TEAM_STAGE: u32 = 50;

/// Conservative estimate recorded when a run yields no structured report.
const FALLBACK_PROMPT_ESTIMATE: u32 = 50;

/// A running pipeline older than this is considered stalled.
const STALL_AFTER_MINS: i64 = 30;

/// Trigger name attached to stall-recovery queue items.
const STALL_RECOVERY_TRIGGER: &str = "stall-recovery";

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickAction {
    Idle,
    RanAgent,
    Queued,
    Busy,
    Error,
}

/// Where the executed work came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunSource {
    Trigger,
    Queue,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickResult {
    pub action: TickAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<RunSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TickResult {
    fn idle() -> Self {
        Self {
            action: TickAction::Idle,
            trigger_name: None,
            source: None,
            error: None,
        }
    }

    fn busy() -> Self {
        Self {
            action: TickAction::Busy,
            trigger_name: None,
            source: None,
            error: None,
        }
    }

    fn queued(trigger_name: impl Into<String>, source: Option<RunSource>) -> Self {
        Self {
            action: TickAction::Queued,
            trigger_name: Some(trigger_name.into()),
            source,
            error: None,
        }
    }

    fn ran(trigger_name: impl Into<String>, source: RunSource) -> Self {
        Self {
            action: TickAction::RanAgent,
            trigger_name: Some(trigger_name.into()),
            source: Some(source),
            error: None,
        }
    }

    fn error(trigger_name: impl Into<String>, source: Option<RunSource>, error: String) -> Self {
        Self {
            action: TickAction::Error,
            trigger_name: Some(trigger_name.into()),
            source,
            error: Some(error),
        }
    }
}

/// The heartbeat's view of its collaborators.
///
/// Modeled as a port so the heartbeat owns no concrete budget tracker
/// or pipeline engine; the daemon binds the real ones, tests bind
/// fakes.
#[async_trait]
pub trait HeartbeatDeps: Send + Sync + 'static {
    /// Whether the budget allows an autonomous run right now.
    fn can_run_agent(&self) -> bool;

    /// Record estimated prompt consumption after a run.
    fn record_usage(&self, prompts: u32);

    /// Execute a queue item's pipeline against the resolved project root.
    async fn run_pipeline(
        &self,
        item: &QueueItem,
        project_root: &Path,
    ) -> Result<PipelineReport, EngineError>;
}

/// The tick loop.
pub struct Heartbeat<D: HeartbeatDeps, C: Clock> {
    deps: D,
    queue: Arc<WorkQueue>,
    registry: Arc<ProjectRegistry>,
    triggers: Mutex<Vec<CronTrigger<C>>>,
    clock: C,
    interval: std::time::Duration,
    busy: AtomicBool,
    running: AtomicBool,
    tick_count: AtomicU64,
    stop_notify: tokio::sync::Notify,
}

/// Releases the busy latch when the tick body finishes, on every path.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<D: HeartbeatDeps, C: Clock> Heartbeat<D, C> {
    pub fn new(
        deps: D,
        queue: Arc<WorkQueue>,
        registry: Arc<ProjectRegistry>,
        triggers: Vec<CronTrigger<C>>,
        clock: C,
        interval: std::time::Duration,
    ) -> Self {
        Self {
            deps,
            queue,
            registry,
            triggers: Mutex::new(triggers),
            clock,
            interval,
            busy: AtomicBool::new(false),
            running: AtomicBool::new(false),
            tick_count: AtomicU64::new(0),
            stop_notify: tokio::sync::Notify::new(),
        }
    }

    /// Run one tick.
    ///
    /// Exactly one tick body runs at a time: a tick arriving while the
    /// previous one is still active returns `busy` without touching any
    /// state. The latch check-and-set must stay first, with no
    /// suspension point before it.
    pub async fn tick(&self) -> TickResult {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return TickResult::busy();
        }
        let _guard = BusyGuard(&self.busy);
        self.tick_count.fetch_add(1, Ordering::SeqCst);
        self.tick_body().await
    }

    async fn tick_body(&self) -> TickResult {
        // 1. Stall sweep.
        if let Some(result) = self.sweep_stalls() {
            return result;
        }

        // 2. Due triggers, in definition order.
        let due = {
            let triggers = self.triggers.lock();
            triggers
                .iter()
                .enumerate()
                .find(|(_, t)| t.is_due())
                .map(|(idx, t)| (idx, t.config().clone()))
        };
        if let Some((idx, config)) = due {
            return self.fire_trigger(idx, config).await;
        }

        // 3. Queue drain.
        if !self.queue.is_empty() && self.deps.can_run_agent() {
            match self.queue.dequeue() {
                Ok(Some(item)) => return self.execute(item, RunSource::Queue).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "queue dequeue failed");
                    return TickResult::error("queue", Some(RunSource::Queue), e.to_string());
                }
            }
        }

        // 4. Nothing to do.
        TickResult::idle()
    }

    /// Flip stale running pipelines to stalled and enqueue recovery.
    fn sweep_stalls(&self) -> Option<TickResult> {
        let projects = match self.registry.list() {
            Ok(projects) => projects,
            Err(e) => {
                tracing::warn!(error = %e, "could not list projects for stall sweep");
                return None;
            }
        };

        let now = self.clock.now();
        for project in projects {
            let mut state = match pipeline_store::load(&project.path) {
                Ok(Some(state)) => state,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        project = %project.path.display(),
                        error = %e,
                        "unreadable pipeline-state during stall sweep"
                    );
                    continue;
                }
            };
            if state.status != tend_core::PipelineStatus::Running {
                continue;
            }
            if now - state.updated_at <= Duration::minutes(STALL_AFTER_MINS) {
                continue;
            }

            tracing::warn!(
                project = %project.path.display(),
                stage = state.current_stage,
                "pipeline stalled, enqueueing recovery"
            );
            state.status = tend_core::PipelineStatus::Stalled;
            if let Err(e) = pipeline_store::save(&project.path, &mut state, now) {
                tracing::error!(error = %e, "failed to mark pipeline stalled");
                continue;
            }

            let agent = state
                .pipeline
                .get(state.current_stage)
                .cloned()
                .unwrap_or_else(|| "builder".to_string());
            let item = QueueItem {
                trigger_name: STALL_RECOVERY_TRIGGER.to_string(),
                project: project.path.display().to_string(),
                agent,
                task: state.task.clone(),
                mode: tend_core::RunMode::Standalone,
                enqueued_at: now,
            };
            return Some(match self.queue.enqueue(item) {
                Ok(()) => TickResult::queued(STALL_RECOVERY_TRIGGER, None),
                Err(e) => TickResult::error(STALL_RECOVERY_TRIGGER, None, e.to_string()),
            });
        }
        None
    }

    /// Execute or enqueue a due trigger; `mark_fired` either way.
    async fn fire_trigger(&self, idx: usize, config: TriggerConfig) -> TickResult {
        let now = self.clock.now();
        let item = QueueItem {
            trigger_name: config.name.clone(),
            project: config.project.clone(),
            agent: config.agent.clone(),
            task: config.task.clone(),
            mode: config.mode,
            enqueued_at: now,
        };

        let result = if self.deps.can_run_agent() {
            // Fired whether the run succeeds or fails, so a
            // misconfigured rule does not loop.
            self.execute(item, RunSource::Trigger).await
        } else {
            tracing::info!(trigger = %config.name, "budget low, deferring trigger to queue");
            match self.queue.enqueue(item) {
                Ok(()) => TickResult::queued(config.name.clone(), Some(RunSource::Trigger)),
                Err(e) => {
                    TickResult::error(config.name.clone(), Some(RunSource::Trigger), e.to_string())
                }
            }
        };

        {
            let mut triggers = self.triggers.lock();
            if let Some(trigger) = triggers.get_mut(idx) {
                trigger.mark_fired();
            }
        }
        result
    }

    /// Run the pipeline for an item and account for its prompt usage.
    async fn execute(&self, item: QueueItem, source: RunSource) -> TickResult {
        let project_root = match self.registry.resolve(&item.project) {
            Ok(Some(path)) => path,
            // Unresolved short names pass through as-is.
            _ => PathBuf::from(&item.project),
        };

        tracing::info!(
            trigger = %item.trigger_name,
            project = %project_root.display(),
            agent = %item.agent,
            mode = %item.mode,
            "executing work item"
        );

        match self.deps.run_pipeline(&item, &project_root).await {
            Ok(report) => {
                self.deps.record_usage(
                    report.standalone_stages * PROMPTS_PER_STANDALONE_STAGE
                        + report.team_stages * PROMPTS_PER_TEAM_STAGE,
                );
                TickResult::ran(item.trigger_name, source)
            }
            Err(e) => {
                tracing::error!(trigger = %item.trigger_name, error = %e, "pipeline run failed");
                self.deps.record_usage(FALLBACK_PROMPT_ESTIMATE);
                TickResult::error(item.trigger_name, Some(source), e.to_string())
            }
        }
    }

    /// Schedule ticks at the configured interval; the first tick runs
    /// immediately.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let heartbeat = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = heartbeat.stop_notify.notified() => break,
                }
                if !heartbeat.running.load(Ordering::SeqCst) {
                    break;
                }
                let result = heartbeat.tick().await;
                if result.action != TickAction::Idle {
                    tracing::debug!(action = ?result.action, trigger = ?result.trigger_name, "tick");
                }
                if !heartbeat.running.load(Ordering::SeqCst) {
                    break;
                }
            }
        })
    }

    /// Prevent future ticks. An in-flight tick is not interrupted;
    /// agent sessions are unsafe to cancel mid-validation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop_notify.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
