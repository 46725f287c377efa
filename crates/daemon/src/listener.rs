// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC listener.
//!
//! Accepts Unix-socket connections and answers one newline-delimited
//! JSON request per connection. Handlers only read daemon state or
//! produce queue items; execution stays with the heartbeat.

use crate::protocol::{self, Request, Response, SessionEntry, StatusData};
use std::sync::Arc;
use std::time::Instant;
use tend_core::{Clock, PipelineStatus, QueueItem, SystemClock};
use tend_engine::{Heartbeat, HeartbeatDeps};
use tend_storage::{pipeline_store, BudgetTracker, ProjectRegistry, WorkQueue};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

/// Shared daemon context for request handlers.
pub struct ListenCtx<D: HeartbeatDeps> {
    pub heartbeat: Arc<Heartbeat<D, SystemClock>>,
    pub queue: Arc<WorkQueue>,
    pub registry: Arc<ProjectRegistry>,
    pub budget: Arc<BudgetTracker<SystemClock>>,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
}

/// Listener task accepting socket connections.
pub struct Listener<D: HeartbeatDeps> {
    socket: UnixListener,
    ctx: Arc<ListenCtx<D>>,
}

impl<D: HeartbeatDeps> Listener<D> {
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx<D>>) -> Self {
        Self { socket, ctx }
    }

    /// Accept loop; one spawned task per connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                protocol::ProtocolError::ConnectionClosed => {
                                    debug!("client disconnected")
                                }
                                _ => warn!("connection error: {e}"),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("accept error: {e}");
                }
            }
        }
    }
}

/// Handle one request-response pair, then let the connection close.
async fn handle_connection<D: HeartbeatDeps>(
    stream: UnixStream,
    ctx: &ListenCtx<D>,
) -> Result<(), protocol::ProtocolError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let line = protocol::read_line(&mut reader).await?;
    let response = match protocol::decode::<Request>(&line) {
        Ok(request) => {
            debug!(request = ?request, "received request");
            handle_request(request, ctx)
        }
        Err(_) => Response::err("Invalid JSON"),
    };

    protocol::write_line(&mut write_half, &response).await
}

/// Dispatch a request; handler failures surface as `{ok:false}`.
pub fn handle_request<D: HeartbeatDeps>(request: Request, ctx: &ListenCtx<D>) -> Response {
    match request {
        Request::Status => handle_status(ctx),

        Request::Run {
            agent,
            project,
            task,
            mode,
        } => {
            let item = QueueItem {
                trigger_name: "manual".to_string(),
                project,
                agent,
                task,
                mode,
                enqueued_at: SystemClock.now(),
            };
            match ctx.queue.enqueue(item) {
                Ok(()) => Response::ok(serde_json::json!({
                    "queued": true,
                    "queueSize": ctx.queue.size(),
                })),
                Err(e) => Response::err(e.to_string()),
            }
        }

        Request::ProjectsList => match ctx.registry.list() {
            Ok(projects) => Response::ok(projects),
            Err(e) => Response::err(e.to_string()),
        },

        Request::ProjectsAdd { path, name } => {
            match ctx.registry.register(&path, name, SystemClock.now()) {
                Ok(project) => Response::ok(project),
                Err(e) => Response::err(e.to_string()),
            }
        }

        Request::ProjectsRemove { target } => match ctx.registry.unregister(&target) {
            Ok(removed) => Response::ok(serde_json::json!({ "removed": removed })),
            Err(e) => Response::err(e.to_string()),
        },

        Request::QueueList => Response::ok(ctx.queue.items()),

        Request::SessionsList => Response::ok(collect_sessions(ctx)),

        Request::SessionsActive => Response::ok(active_session(ctx)),

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ok(serde_json::json!({ "shuttingDown": true }))
        }
    }
}

fn handle_status<D: HeartbeatDeps>(ctx: &ListenCtx<D>) -> Response {
    Response::ok(StatusData {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: ctx.start_time.elapsed().as_secs(),
        heartbeat_running: ctx.heartbeat.is_running(),
        tick_count: ctx.heartbeat.tick_count(),
        queue_size: ctx.queue.size(),
        budget_remaining: ctx.budget.remaining().unwrap_or(0),
        can_run: ctx.budget.can_run().unwrap_or(false),
        projects: ctx.registry.list().map(|p| p.len()).unwrap_or(0),
    })
}

/// All recorded sessions across registered projects, in registry order.
fn collect_sessions<D: HeartbeatDeps>(ctx: &ListenCtx<D>) -> Vec<SessionEntry> {
    let mut sessions = Vec::new();
    let projects = ctx.registry.list().unwrap_or_default();
    for project in projects {
        let Ok(Some(state)) = pipeline_store::load(&project.path) else {
            continue;
        };
        for stage in &state.stages {
            if let Some(session_id) = &stage.session_id {
                sessions.push(SessionEntry {
                    project: project.path.clone(),
                    agent: stage.agent.clone(),
                    session_id: session_id.clone(),
                    started_at: stage.started_at,
                });
            }
        }
    }
    sessions
}

/// The session of the currently running pipeline, if any.
fn active_session<D: HeartbeatDeps>(ctx: &ListenCtx<D>) -> Option<SessionEntry> {
    let projects = ctx.registry.list().unwrap_or_default();
    for project in projects {
        let Ok(Some(state)) = pipeline_store::load(&project.path) else {
            continue;
        };
        if state.status != PipelineStatus::Running {
            continue;
        }
        let Some(stage) = state.stages.get(state.current_stage) else {
            continue;
        };
        return Some(SessionEntry {
            project: project.path.clone(),
            agent: stage.agent.clone(),
            session_id: stage.session_id.clone().unwrap_or_default(),
            started_at: stage.started_at,
        });
    }
    None
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
