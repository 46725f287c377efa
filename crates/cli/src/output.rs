// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable rendering of daemon responses.

use crate::Command;
use serde_json::Value;

/// Render a successful response for the given command.
pub fn render(command: &Command, data: &Value) {
    match command {
        Command::Status => render_status(data),
        Command::Run { .. } => {
            println!(
                "queued (queue size: {})",
                data.get("queueSize").and_then(Value::as_u64).unwrap_or(0)
            );
        }
        Command::Projects { .. } => render_projects(data),
        Command::Queue => render_queue(data),
        Command::Sessions { .. } => render_sessions(data),
        Command::Shutdown => println!("daemon shutting down"),
    }
}

fn render_status(data: &Value) {
    println!(
        "tendd {}  (up {}s)",
        str_field(data, "version"),
        data.get("uptimeSecs").and_then(Value::as_u64).unwrap_or(0)
    );
    println!(
        "heartbeat: {}  ticks: {}",
        if data.get("heartbeatRunning").and_then(Value::as_bool) == Some(true) {
            "running"
        } else {
            "stopped"
        },
        data.get("tickCount").and_then(Value::as_u64).unwrap_or(0)
    );
    println!(
        "queue: {} item(s)  projects: {}",
        data.get("queueSize").and_then(Value::as_u64).unwrap_or(0),
        data.get("projects").and_then(Value::as_u64).unwrap_or(0)
    );
    println!(
        "budget: {} prompt(s) remaining  can run: {}",
        data.get("budgetRemaining")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        if data.get("canRun").and_then(Value::as_bool) == Some(true) {
            "yes"
        } else {
            "no"
        }
    );
}

fn render_projects(data: &Value) {
    match data.as_array() {
        Some(projects) if !projects.is_empty() => {
            for project in projects {
                let name = project
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("-");
                let last = project
                    .get("lastSession")
                    .and_then(Value::as_str)
                    .unwrap_or("never");
                println!("{:20} {}  (last session: {})", name, str_field(project, "path"), last);
            }
        }
        Some(_) => println!("no projects registered"),
        None => print_raw(data),
    }
}

fn render_queue(data: &Value) {
    match data.as_array() {
        Some(items) if !items.is_empty() => {
            for item in items {
                println!(
                    "{:24} {:12} {:10} {}",
                    str_field(item, "triggerName"),
                    str_field(item, "agent"),
                    str_field(item, "mode"),
                    str_field(item, "projectPath"),
                );
            }
        }
        Some(_) => println!("queue is empty"),
        None => print_raw(data),
    }
}

fn render_sessions(data: &Value) {
    match data {
        Value::Null => println!("no active session"),
        Value::Array(sessions) if sessions.is_empty() => println!("no sessions recorded"),
        Value::Array(sessions) => {
            for session in sessions {
                print_session(session);
            }
        }
        other => print_session(other),
    }
}

fn print_session(session: &Value) {
    println!(
        "{:12} {:38} {}",
        str_field(session, "agent"),
        str_field(session, "sessionId"),
        str_field(session, "project"),
    );
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("?")
}

fn print_raw(data: &Value) {
    println!("{data}");
}
