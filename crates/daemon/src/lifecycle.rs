// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, shutdown, single-instance locking.

use crate::config::DaemonConfig;
use crate::deps::DaemonDeps;
use crate::runner::CommandAgentRunner;
use fs2::FileExt;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tend_core::{Clock, SystemClock};
use tend_engine::{CronTrigger, EngineError, Heartbeat, PipelineEngine};
use tend_storage::{BudgetTracker, ProjectRegistry, TriggerStateStore, WorkQueue};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

/// Daemon heartbeat with concrete collaborator types.
pub type DaemonHeartbeat = Heartbeat<DaemonDeps<CommandAgentRunner>, SystemClock>;

/// Lifecycle errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Storage error: {0}")]
    Storage(#[from] tend_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filesystem layout under the state directory.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    pub config_path: PathBuf,
    pub budget_path: PathBuf,
    pub queue_path: PathBuf,
    pub projects_path: PathBuf,
    /// Directory holding per-trigger `cron-<name>.json` files.
    pub triggers_dir: PathBuf,
}

impl DaemonPaths {
    /// Resolve the user-level layout.
    pub fn resolve() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir().ok_or(LifecycleError::NoStateDir)?;
        Ok(Self::in_dir(state_dir))
    }

    /// Layout rooted at an explicit directory (tests use this).
    pub fn in_dir(state_dir: PathBuf) -> Self {
        Self {
            socket_path: state_dir.join("tendd.sock"),
            lock_path: state_dir.join("tendd.pid"),
            log_path: state_dir.join("tendd.log"),
            config_path: state_dir.join("config.json"),
            budget_path: state_dir.join("budget.json"),
            queue_path: state_dir.join("queue.json"),
            projects_path: state_dir.join("projects.json"),
            triggers_dir: state_dir.join("triggers"),
            state_dir,
        }
    }
}

/// Live daemon state.
pub struct DaemonState {
    pub paths: DaemonPaths,
    // NOTE(lifetime): held to maintain the exclusive lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub heartbeat: Arc<DaemonHeartbeat>,
    pub queue: Arc<WorkQueue>,
    pub registry: Arc<ProjectRegistry>,
    pub budget: Arc<BudgetTracker<SystemClock>>,
    pub start_time: Instant,
}

/// Result of startup; the listener is spawned by the caller.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
}

impl DaemonState {
    /// Stop scheduling ticks and remove the socket and PID files.
    ///
    /// An in-flight pipeline is not cancelled; it runs to completion
    /// before the process exits.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("shutting down daemon");
        self.heartbeat.stop();

        if self.paths.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.paths.socket_path) {
                warn!("failed to remove socket file: {e}");
            }
        }
        if self.paths.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.paths.lock_path) {
                warn!("failed to remove PID file: {e}");
            }
        }
        // Lock released when self.lock_file drops.
        info!("daemon shutdown complete");
        Ok(())
    }
}

/// Start the daemon: lock, load state, wire the heartbeat, bind the socket.
pub async fn startup(
    config: &DaemonConfig,
    paths: DaemonPaths,
) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&paths.state_dir)?;
    std::fs::create_dir_all(&paths.triggers_dir)?;

    // Lock first; everything else belongs to the winner.
    // OpenOptions avoids truncating a running daemon's PID before we
    // hold the lock.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    {
        use std::io::Write;
        let mut lock_file = &lock_file;
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;
    }

    let clock = SystemClock;
    let budget = Arc::new(BudgetTracker::new(
        config.budget.clone(),
        paths.budget_path.clone(),
        clock,
    ));
    let queue = Arc::new(WorkQueue::new(paths.queue_path.clone()));
    let registry = Arc::new(ProjectRegistry::new(paths.projects_path.clone()));

    // Merge configured projects into the registry; entries that are
    // already registered stay as they are.
    for entry in &config.projects {
        match registry.register(&entry.path, entry.name.clone(), clock.now()) {
            Ok(_) => info!(path = %entry.path.display(), "registered project"),
            Err(tend_storage::StorageError::Conflict(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    // Triggers fail loudly on a bad schedule; fired-at state is
    // best-effort (a missing file just means a fresh trigger).
    let mut triggers = Vec::with_capacity(config.triggers.len());
    for trigger_config in &config.triggers {
        let mut trigger = CronTrigger::new(
            trigger_config.clone(),
            TriggerStateStore::new(paths.triggers_dir.clone()),
            clock,
        )?;
        if let Err(e) = trigger.load_state() {
            warn!(trigger = %trigger_config.name, error = %e, "could not load trigger state");
        }
        triggers.push(trigger);
    }

    let runner = CommandAgentRunner::new(config.agent_command());
    let engine = PipelineEngine::new(runner, clock);
    let deps = DaemonDeps::new(Arc::clone(&budget), engine, Arc::clone(&registry));
    let heartbeat = Arc::new(Heartbeat::new(
        deps,
        Arc::clone(&queue),
        Arc::clone(&registry),
        triggers,
        clock,
        config.heartbeat_interval(),
    ));

    // Clear a stale socket from a crashed daemon, then bind.
    if paths.socket_path.exists() {
        std::fs::remove_file(&paths.socket_path)?;
    }
    let listener = UnixListener::bind(&paths.socket_path)
        .map_err(|e| LifecycleError::BindFailed(paths.socket_path.clone(), e))?;

    info!(
        socket = %paths.socket_path.display(),
        triggers = config.triggers.len(),
        "daemon started"
    );

    Ok(StartupResult {
        daemon: DaemonState {
            paths,
            lock_file,
            heartbeat,
            queue,
            registry,
            budget,
            start_time: Instant::now(),
        },
        listener,
    })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
