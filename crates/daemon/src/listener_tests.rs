// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::deps::DaemonDeps;
use std::path::{Path, PathBuf};
use tend_core::{PipelineStage, PipelineState, RunMode};
use tend_engine::{FakeRunner, PipelineEngine};
use tend_storage::BudgetConfig;
use tokio::io::AsyncWriteExt;

type TestCtx = ListenCtx<DaemonDeps<FakeRunner>>;

fn ctx(dir: &Path) -> Arc<TestCtx> {
    let queue = Arc::new(WorkQueue::new(dir.join("queue.json")));
    let registry = Arc::new(ProjectRegistry::new(dir.join("projects.json")));
    let budget = Arc::new(BudgetTracker::new(
        BudgetConfig::default(),
        dir.join("budget.json"),
        SystemClock,
    ));
    let deps = DaemonDeps::new(
        Arc::clone(&budget),
        PipelineEngine::new(FakeRunner::new(), SystemClock),
        Arc::clone(&registry),
    );
    let heartbeat = Arc::new(Heartbeat::new(
        deps,
        Arc::clone(&queue),
        Arc::clone(&registry),
        vec![],
        SystemClock,
        std::time::Duration::from_secs(60),
    ));
    Arc::new(ListenCtx {
        heartbeat,
        queue,
        registry,
        budget,
        start_time: Instant::now(),
        shutdown: Arc::new(Notify::new()),
    })
}

// ── Handlers ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn status_reports_daemon_internals() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(dir.path());

    let response = handle_request(Request::Status, &ctx);
    assert!(response.ok);
    let data = response.data.unwrap();
    assert_eq!(data["queueSize"], 0);
    assert_eq!(data["heartbeatRunning"], false);
    assert_eq!(data["canRun"], true);
    assert_eq!(data["projects"], 0);
}

#[tokio::test]
async fn run_enqueues_a_manual_item() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(dir.path());

    let response = handle_request(
        Request::Run {
            agent: "builder".to_string(),
            project: "repo".to_string(),
            task: "fix it".to_string(),
            mode: RunMode::Team,
        },
        &ctx,
    );
    assert!(response.ok);
    assert_eq!(response.data.unwrap()["queueSize"], 1);

    let item = ctx.queue.peek().unwrap();
    assert_eq!(item.trigger_name, "manual");
    assert_eq!(item.mode, RunMode::Team);
}

#[tokio::test]
async fn projects_add_list_remove_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(dir.path());
    let project_dir = dir.path().join("repo");

    let response = handle_request(
        Request::ProjectsAdd {
            path: project_dir.clone(),
            name: Some("repo".to_string()),
        },
        &ctx,
    );
    assert!(response.ok);

    // Duplicate registration surfaces as a handler error.
    let response = handle_request(
        Request::ProjectsAdd {
            path: project_dir.clone(),
            name: None,
        },
        &ctx,
    );
    assert!(!response.ok);
    assert!(response.error.unwrap().contains("already registered"));

    let response = handle_request(Request::ProjectsList, &ctx);
    assert_eq!(response.data.unwrap().as_array().unwrap().len(), 1);

    let response = handle_request(
        Request::ProjectsRemove {
            target: "repo".to_string(),
        },
        &ctx,
    );
    assert_eq!(response.data.unwrap()["removed"], true);
}

#[tokio::test]
async fn sessions_list_reads_pipeline_states() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(dir.path());
    let project_dir = dir.path().join("repo");
    std::fs::create_dir_all(&project_dir).unwrap();
    ctx.registry
        .register(&project_dir, None, SystemClock.now())
        .unwrap();

    let mut state = PipelineState::new(
        project_dir.clone(),
        "task",
        &[PipelineStage::new("builder"), PipelineStage::new("reviewer")],
        SystemClock.now(),
    );
    state.stage_running(0, SystemClock.now());
    state.stages[0].session_id = Some("sess-1".to_string());
    pipeline_store::save(&project_dir, &mut state, SystemClock.now()).unwrap();

    let response = handle_request(Request::SessionsList, &ctx);
    let sessions = response.data.unwrap();
    assert_eq!(sessions.as_array().unwrap().len(), 1);
    assert_eq!(sessions[0]["sessionId"], "sess-1");
    assert_eq!(sessions[0]["agent"], "builder");

    let response = handle_request(Request::SessionsActive, &ctx);
    let active = response.data.unwrap();
    assert_eq!(active["sessionId"], "sess-1");
    assert_eq!(active["project"], project_dir.display().to_string());
}

#[tokio::test]
async fn sessions_active_skips_malformed_states_and_keeps_scanning() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(dir.path());

    // First project: running, but with a current_stage pointing past the
    // stage list. The scan must skip it, not give up.
    let broken_dir = dir.path().join("broken");
    std::fs::create_dir_all(&broken_dir).unwrap();
    ctx.registry
        .register(&broken_dir, None, SystemClock.now())
        .unwrap();
    let mut broken = PipelineState::new(
        broken_dir.clone(),
        "task",
        &[PipelineStage::new("builder")],
        SystemClock.now(),
    );
    broken.current_stage = 99;
    pipeline_store::save(&broken_dir, &mut broken, SystemClock.now()).unwrap();

    // Second project: a genuinely active session.
    let active_dir = dir.path().join("active");
    std::fs::create_dir_all(&active_dir).unwrap();
    ctx.registry
        .register(&active_dir, None, SystemClock.now())
        .unwrap();
    let mut state = PipelineState::new(
        active_dir.clone(),
        "task",
        &[PipelineStage::new("builder")],
        SystemClock.now(),
    );
    state.stage_running(0, SystemClock.now());
    state.stages[0].session_id = Some("sess-2".to_string());
    pipeline_store::save(&active_dir, &mut state, SystemClock.now()).unwrap();

    let response = handle_request(Request::SessionsActive, &ctx);
    let active = response.data.unwrap();
    assert_eq!(active["sessionId"], "sess-2");
}

#[tokio::test]
async fn sessions_active_is_null_when_nothing_runs() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(dir.path());
    let response = handle_request(Request::SessionsActive, &ctx);
    assert!(response.ok);
    assert!(response.data.unwrap().is_null());
}

#[tokio::test]
async fn shutdown_notifies_the_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(dir.path());
    let notified = {
        let shutdown = Arc::clone(&ctx.shutdown);
        tokio::spawn(async move { shutdown.notified().await })
    };
    let response = handle_request(Request::Shutdown, &ctx);
    assert!(response.ok);
    tokio::time::timeout(std::time::Duration::from_secs(1), notified)
        .await
        .unwrap()
        .unwrap();
}

// ── Socket round trip ────────────────────────────────────────────────────────

async fn roundtrip(socket_path: &PathBuf, line: &str) -> Response {
    let mut stream = UnixStream::connect(socket_path).await.unwrap();
    stream.write_all(line.as_bytes()).await.unwrap();
    stream.write_all(b"\n").await.unwrap();
    let (read_half, _) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let line = protocol::read_line(&mut reader).await.unwrap();
    protocol::decode(&line).unwrap()
}

#[tokio::test]
async fn serves_one_request_per_connection() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(dir.path());
    let socket_path = dir.path().join("tend.sock");
    let listener = Listener::new(UnixListener::bind(&socket_path).unwrap(), ctx);
    tokio::spawn(listener.run());

    let response = roundtrip(&socket_path, r#"{"cmd":"status"}"#).await;
    assert!(response.ok);

    // A fresh connection serves the next request.
    let response = roundtrip(&socket_path, r#"{"cmd":"queue-list"}"#).await;
    assert!(response.ok);
}

#[tokio::test]
async fn malformed_json_gets_the_canonical_error() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(dir.path());
    let socket_path = dir.path().join("tend.sock");
    let listener = Listener::new(UnixListener::bind(&socket_path).unwrap(), ctx);
    tokio::spawn(listener.run());

    let response = roundtrip(&socket_path, "{nope").await;
    assert!(!response.ok);
    assert_eq!(response.error.as_deref(), Some("Invalid JSON"));
}
