// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tendd: the tend orchestration daemon.
//!
//! Background process hosting the heartbeat scheduler, the webhook
//! ingester, and the IPC listener. Typically started by the `tend` CLI.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::sync::Arc;

use tend_daemon::config::DaemonConfig;
use tend_daemon::lifecycle::{self, DaemonPaths, LifecycleError, StartupResult};
use tend_daemon::listener::{ListenCtx, Listener};
use tend_daemon::webhook::{self, WebhookCtx};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config_override: Option<PathBuf> = None;
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("tendd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            path if !path.starts_with('-') => {
                config_override = Some(PathBuf::from(path));
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: tendd [config.json]");
                std::process::exit(1);
            }
        }
    }

    let paths = DaemonPaths::resolve()?;
    rotate_log_if_needed(&paths.log_path);
    let _log_guard = setup_logging(&paths)?;

    let config_path = config_override.unwrap_or_else(|| paths.config_path.clone());
    let config = DaemonConfig::load(&config_path)?;

    info!(config = %config_path.display(), "starting daemon");

    let StartupResult {
        mut daemon,
        listener: unix_listener,
    } = match lifecycle::startup(&config, paths).await {
        Ok(result) => result,
        Err(LifecycleError::LockFailed(_)) => {
            eprintln!("tendd is already running");
            std::process::exit(1);
        }
        Err(e) => {
            error!("failed to start daemon: {e}");
            return Err(e.into());
        }
    };

    let shutdown = Arc::new(Notify::new());

    // IPC listener task.
    let ctx = Arc::new(ListenCtx {
        heartbeat: Arc::clone(&daemon.heartbeat),
        queue: Arc::clone(&daemon.queue),
        registry: Arc::clone(&daemon.registry),
        budget: Arc::clone(&daemon.budget),
        start_time: daemon.start_time,
        shutdown: Arc::clone(&shutdown),
    });
    tokio::spawn(Listener::new(unix_listener, ctx).run());

    // Webhook listener task, when configured. The sink only enqueues;
    // the heartbeat picks items up on its next tick.
    if let Some(webhook_config) = &config.webhook {
        let queue = Arc::clone(&daemon.queue);
        let webhook_ctx = Arc::new(WebhookCtx {
            secret: webhook_config.github.secret.clone(),
            mappings: webhook_config.github.events.clone(),
            sink: Arc::new(move |item| {
                if let Err(e) = queue.enqueue(item) {
                    error!(error = %e, "failed to enqueue webhook item");
                }
            }),
        });
        let port = webhook_config.port;
        tokio::spawn(async move {
            if let Err(e) = webhook::serve(webhook_ctx, port).await {
                error!(error = %e, "webhook listener failed");
            }
        });
    }

    // Heartbeat tick loop.
    let heartbeat_task = daemon.heartbeat.start();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!("daemon ready");
    println!("READY");

    tokio::select! {
        _ = shutdown.notified() => info!("shutdown requested via IPC"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    // Stop scheduling ticks; an in-flight pipeline runs to completion.
    daemon.heartbeat.stop();
    if let Err(e) = heartbeat_task.await {
        warn!("heartbeat task ended abnormally: {e}");
    }
    if let Err(e) = daemon.shutdown() {
        warn!("shutdown error: {e}");
    }
    info!("daemon stopped");
    Ok(())
}

fn print_help() {
    println!("tendd {}", env!("CARGO_PKG_VERSION"));
    println!("tend orchestration daemon - drives agent pipelines across registered projects");
    println!();
    println!("USAGE:");
    println!("    tendd [config.json]");
    println!();
    println!("The daemon is typically started by the `tend` CLI and should not");
    println!("be invoked directly. It listens on a Unix socket for commands.");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep.
const MAX_ROTATED_LOGS: u32 = 3;

/// Shift `tendd.log` through `.1`/`.2`/`.3` when it grows too large.
/// Best-effort: rotation failures never block startup.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    paths: &DaemonPaths,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(&paths.state_dir)?;

    let file_appender = tracing_appender::rolling::never(
        &paths.state_dir,
        paths
            .log_path
            .file_name()
            .ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
