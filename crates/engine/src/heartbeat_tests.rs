// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::trigger::CronTrigger;
use parking_lot::Mutex as PlMutex;
use std::collections::VecDeque;
use tend_core::{FakeClock, PipelineStage, PipelineState, PipelineStatus, RunMode};
use tend_storage::TriggerStateStore;
use tokio::sync::Notify;

fn report(standalone: u32, team: u32) -> PipelineReport {
    PipelineReport {
        completed: true,
        final_verdict: Some("APPROVE".to_string()),
        stages_run: standalone + team,
        standalone_stages: standalone,
        team_stages: team,
        retries: 0,
    }
}

#[derive(Default)]
struct DepsState {
    can_run: bool,
    usages: Vec<u32>,
    runs: Vec<(QueueItem, PathBuf)>,
    results: VecDeque<Result<PipelineReport, EngineError>>,
}

#[derive(Clone)]
struct FakeDeps {
    inner: Arc<PlMutex<DepsState>>,
    gate: Option<Arc<Notify>>,
}

impl FakeDeps {
    fn new(can_run: bool) -> Self {
        Self {
            inner: Arc::new(PlMutex::new(DepsState {
                can_run,
                ..DepsState::default()
            })),
            gate: None,
        }
    }

    fn gated(can_run: bool) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut deps = Self::new(can_run);
        deps.gate = Some(Arc::clone(&gate));
        (deps, gate)
    }

    fn set_can_run(&self, can_run: bool) {
        self.inner.lock().can_run = can_run;
    }

    fn push_result(&self, result: Result<PipelineReport, EngineError>) {
        self.inner.lock().results.push_back(result);
    }

    fn usages(&self) -> Vec<u32> {
        self.inner.lock().usages.clone()
    }

    fn runs(&self) -> Vec<(QueueItem, PathBuf)> {
        self.inner.lock().runs.clone()
    }
}

#[async_trait]
impl HeartbeatDeps for FakeDeps {
    fn can_run_agent(&self) -> bool {
        self.inner.lock().can_run
    }

    fn record_usage(&self, prompts: u32) {
        self.inner.lock().usages.push(prompts);
    }

    async fn run_pipeline(
        &self,
        item: &QueueItem,
        project_root: &Path,
    ) -> Result<PipelineReport, EngineError> {
        self.inner
            .lock()
            .runs
            .push((item.clone(), project_root.to_path_buf()));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let scripted = self.inner.lock().results.pop_front();
        scripted.unwrap_or_else(|| Ok(report(1, 0)))
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    state_dir: PathBuf,
    clock: FakeClock,
    queue: Arc<WorkQueue>,
    registry: Arc<ProjectRegistry>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().to_path_buf();
        Self {
            _dir: dir,
            queue: Arc::new(WorkQueue::new(state_dir.join("queue.json"))),
            registry: Arc::new(ProjectRegistry::new(state_dir.join("projects.json"))),
            clock: FakeClock::default(),
            state_dir,
        }
    }

    fn trigger(&self, name: &str, schedule: &str, agent: &str, mode: RunMode) -> CronTrigger<FakeClock> {
        CronTrigger::new(
            TriggerConfig {
                name: name.to_string(),
                schedule: schedule.to_string(),
                project: "proj".to_string(),
                agent: agent.to_string(),
                task: "the task".to_string(),
                mode,
            },
            TriggerStateStore::new(self.state_dir.clone()),
            self.clock.clone(),
        )
        .unwrap()
    }

    fn heartbeat(
        &self,
        deps: FakeDeps,
        triggers: Vec<CronTrigger<FakeClock>>,
    ) -> Arc<Heartbeat<FakeDeps, FakeClock>> {
        Arc::new(Heartbeat::new(
            deps,
            Arc::clone(&self.queue),
            Arc::clone(&self.registry),
            triggers,
            self.clock.clone(),
            std::time::Duration::from_millis(50),
        ))
    }

    fn item(&self, trigger_name: &str, agent: &str) -> QueueItem {
        QueueItem {
            trigger_name: trigger_name.to_string(),
            project: "proj".to_string(),
            agent: agent.to_string(),
            task: "queued task".to_string(),
            mode: RunMode::Standalone,
            enqueued_at: self.clock.now(),
        }
    }
}

// ── Trigger paths ────────────────────────────────────────────────────────────

#[tokio::test]
async fn due_trigger_runs_when_budget_allows() {
    let fx = Fixture::new();
    let deps = FakeDeps::new(true);
    // 10:00:00 on the fake clock; an every-minute schedule is due.
    let hb = fx.heartbeat(deps.clone(), vec![fx.trigger("minutely", "*/1 * * * *", "scout", RunMode::Standalone)]);

    let result = hb.tick().await;

    assert_eq!(result.action, TickAction::RanAgent);
    assert_eq!(result.source, Some(RunSource::Trigger));
    assert_eq!(result.trigger_name.as_deref(), Some("minutely"));

    let runs = deps.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0.agent, "scout");
    assert_eq!(runs[0].0.mode, RunMode::Standalone);
    // One standalone stage: 10 prompts recorded.
    assert_eq!(deps.usages(), vec![10]);
}

#[tokio::test]
async fn due_trigger_queues_when_budget_is_low() {
    let fx = Fixture::new();
    let deps = FakeDeps::new(false);
    let hb = fx.heartbeat(deps.clone(), vec![fx.trigger("minutely", "*/1 * * * *", "scout", RunMode::Standalone)]);

    let result = hb.tick().await;

    assert_eq!(result.action, TickAction::Queued);
    assert_eq!(fx.queue.size(), 1);
    assert!(deps.runs().is_empty());

    // mark_fired happened: the next tick sees nothing due and an
    // unaffordable queue, so it idles.
    let result = hb.tick().await;
    assert_eq!(result.action, TickAction::Idle);
    assert_eq!(fx.queue.size(), 1);
}

#[tokio::test]
async fn queue_drains_when_budget_returns() {
    let fx = Fixture::new();
    fx.queue.enqueue(fx.item("deferred", "scout")).unwrap();
    let deps = FakeDeps::new(true);
    let hb = fx.heartbeat(deps.clone(), vec![]);

    let result = hb.tick().await;

    assert_eq!(result.action, TickAction::RanAgent);
    assert_eq!(result.source, Some(RunSource::Queue));
    assert_eq!(result.trigger_name.as_deref(), Some("deferred"));
    assert!(fx.queue.is_empty());
    assert_eq!(deps.runs().len(), 1);
}

#[tokio::test]
async fn triggers_fire_in_definition_order() {
    let fx = Fixture::new();
    let deps = FakeDeps::new(true);
    let hb = fx.heartbeat(
        deps.clone(),
        vec![
            fx.trigger("first", "*/1 * * * *", "scout", RunMode::Standalone),
            fx.trigger("second", "*/1 * * * *", "builder", RunMode::Standalone),
        ],
    );

    let result = hb.tick().await;
    assert_eq!(result.trigger_name.as_deref(), Some("first"));

    let result = hb.tick().await;
    assert_eq!(result.trigger_name.as_deref(), Some("second"));
}

#[tokio::test]
async fn failed_run_still_marks_the_trigger_fired() {
    let fx = Fixture::new();
    let deps = FakeDeps::new(true);
    deps.push_result(Err(EngineError::EmptyStages));
    let hb = fx.heartbeat(deps.clone(), vec![fx.trigger("minutely", "*/1 * * * *", "scout", RunMode::Standalone)]);

    let result = hb.tick().await;
    assert_eq!(result.action, TickAction::Error);
    assert!(result.error.is_some());
    // Conservative fallback usage recorded for the failed run.
    assert_eq!(deps.usages(), vec![50]);

    // The misconfigured rule does not loop.
    let result = hb.tick().await;
    assert_eq!(result.action, TickAction::Idle);
}

#[tokio::test]
async fn budget_estimate_uses_team_stage_counts() {
    let fx = Fixture::new();
    fx.queue.enqueue(fx.item("t", "crew")).unwrap();
    let deps = FakeDeps::new(true);
    deps.push_result(Ok(report(2, 1)));
    let hb = fx.heartbeat(deps.clone(), vec![]);

    hb.tick().await;
    assert_eq!(deps.usages(), vec![2 * 10 + 50]);
}

#[tokio::test]
async fn registered_short_names_resolve_to_project_roots() {
    let fx = Fixture::new();
    let project_dir = fx.state_dir.join("checkout");
    std::fs::create_dir_all(&project_dir).unwrap();
    fx.registry
        .register(&project_dir, Some("proj".to_string()), fx.clock.now())
        .unwrap();
    fx.queue.enqueue(fx.item("t", "scout")).unwrap();
    let deps = FakeDeps::new(true);
    let hb = fx.heartbeat(deps.clone(), vec![]);

    hb.tick().await;
    assert_eq!(deps.runs()[0].1, project_dir);
}

// ── Stall sweep ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn stalled_pipeline_is_flipped_and_recovery_queued() {
    let fx = Fixture::new();
    let project_dir = fx.state_dir.join("checkout");
    std::fs::create_dir_all(&project_dir).unwrap();
    fx.registry.register(&project_dir, None, fx.clock.now()).unwrap();

    // A running pipeline last updated 45 minutes ago, mid-builder.
    let mut state = PipelineState::new(
        project_dir.clone(),
        "original task",
        &[PipelineStage::new("architect"), PipelineStage::new("builder")],
        fx.clock.now() - Duration::minutes(50),
    );
    state.stage_running(1, fx.clock.now() - Duration::minutes(45));
    tend_storage::pipeline_store::save(
        &project_dir,
        &mut state,
        fx.clock.now() - Duration::minutes(45),
    )
    .unwrap();

    let deps = FakeDeps::new(true);
    let hb = fx.heartbeat(deps.clone(), vec![]);
    let result = hb.tick().await;

    assert_eq!(result.action, TickAction::Queued);
    assert_eq!(result.trigger_name.as_deref(), Some("stall-recovery"));

    let reloaded = tend_storage::pipeline_store::load(&project_dir)
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, PipelineStatus::Stalled);

    let queued = fx.queue.peek().unwrap();
    assert_eq!(queued.trigger_name, "stall-recovery");
    assert_eq!(queued.agent, "builder");
    assert_eq!(queued.task, "original task");
    assert!(deps.runs().is_empty());
}

#[tokio::test]
async fn fresh_running_pipeline_is_not_swept() {
    let fx = Fixture::new();
    let project_dir = fx.state_dir.join("checkout");
    std::fs::create_dir_all(&project_dir).unwrap();
    fx.registry.register(&project_dir, None, fx.clock.now()).unwrap();

    let mut state = PipelineState::new(
        project_dir.clone(),
        "task",
        &[PipelineStage::new("builder")],
        fx.clock.now(),
    );
    tend_storage::pipeline_store::save(&project_dir, &mut state, fx.clock.now()).unwrap();

    let deps = FakeDeps::new(true);
    let hb = fx.heartbeat(deps, vec![]);
    assert_eq!(hb.tick().await.action, TickAction::Idle);
    assert!(fx.queue.is_empty());
}

#[tokio::test]
async fn terminal_pipelines_are_never_swept() {
    let fx = Fixture::new();
    let project_dir = fx.state_dir.join("checkout");
    std::fs::create_dir_all(&project_dir).unwrap();
    fx.registry.register(&project_dir, None, fx.clock.now()).unwrap();

    let mut state = PipelineState::new(
        project_dir.clone(),
        "task",
        &[PipelineStage::new("builder")],
        fx.clock.now() - Duration::hours(2),
    );
    state.complete("APPROVE");
    tend_storage::pipeline_store::save(
        &project_dir,
        &mut state,
        fx.clock.now() - Duration::hours(2),
    )
    .unwrap();

    let deps = FakeDeps::new(true);
    let hb = fx.heartbeat(deps, vec![]);
    assert_eq!(hb.tick().await.action, TickAction::Idle);
}

// ── The busy latch ───────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_tick_returns_busy_without_touching_state() {
    let fx = Fixture::new();
    let (deps, gate) = FakeDeps::gated(true);
    fx.queue.enqueue(fx.item("slow", "scout")).unwrap();
    let hb = fx.heartbeat(deps.clone(), vec![]);

    let first = {
        let hb = Arc::clone(&hb);
        tokio::spawn(async move { hb.tick().await })
    };

    // Wait for the first tick to park inside the pipeline run.
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while deps.runs().is_empty() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    let second = hb.tick().await;
    assert_eq!(second.action, TickAction::Busy);

    gate.notify_one();
    let first = tokio::time::timeout(std::time::Duration::from_secs(5), first)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.action, TickAction::RanAgent);

    // The latch is released; the daemon can tick again.
    assert_eq!(hb.tick().await.action, TickAction::Idle);
}

// ── Lifecycle observables ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_runs_an_immediate_tick_and_stop_halts() {
    let fx = Fixture::new();
    let deps = FakeDeps::new(true);
    let hb = fx.heartbeat(deps, vec![]);

    assert!(!hb.is_running());
    let handle = hb.start();
    assert!(hb.is_running());

    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while hb.tick_count() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    hb.stop();
    assert!(!hb.is_running());
    let count_after_stop = hb.tick_count();
    tokio::time::advance(std::time::Duration::from_millis(500)).await;
    tokio::task::yield_now().await;
    assert_eq!(hb.tick_count(), count_after_stop);
    handle.abort();
}
