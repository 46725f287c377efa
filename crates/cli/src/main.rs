// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tend: CLI for the tend orchestration daemon.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod output;

use clap::{Parser, Subcommand};
use client::DaemonClient;
use std::path::PathBuf;
use std::process::ExitCode;
use tend_core::RunMode;
use tend_daemon::protocol::Request;

#[derive(Parser)]
#[command(name = "tend", version, about = "Control the tend orchestration daemon")]
struct Cli {
    /// Print the raw JSON response instead of formatted output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show daemon status
    Status,

    /// Queue an agent run
    Run {
        /// Agent name or comma-separated stage list
        agent: String,
        /// Project path or registered short name
        #[arg(long)]
        project: String,
        /// Task for the agent
        #[arg(long)]
        task: String,
        /// Run as a multi-agent team session
        #[arg(long)]
        team: bool,
    },

    /// Manage registered projects
    Projects {
        #[command(subcommand)]
        command: ProjectsCommand,
    },

    /// List queued work items
    Queue,

    /// List recorded agent sessions
    Sessions {
        /// Only the currently active session
        #[arg(long)]
        active: bool,
    },

    /// Stop the daemon
    Shutdown,
}

#[derive(Subcommand)]
enum ProjectsCommand {
    /// List registered projects
    List,
    /// Register a project
    Add {
        path: PathBuf,
        /// Short name, unique across the registry
        #[arg(long)]
        name: Option<String>,
    },
    /// Unregister a project by path or name
    Remove { target: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let request = to_request(&cli.command);
    let client = DaemonClient::connect()?;
    let response = client.request(&request).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(if response.ok {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    if !response.ok {
        eprintln!(
            "error: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
        return Ok(ExitCode::FAILURE);
    }

    let data = response.data.unwrap_or(serde_json::Value::Null);
    output::render(&cli.command, &data);
    Ok(ExitCode::SUCCESS)
}

fn to_request(command: &Command) -> Request {
    match command {
        Command::Status => Request::Status,
        Command::Run {
            agent,
            project,
            task,
            team,
        } => Request::Run {
            agent: agent.clone(),
            project: project.clone(),
            task: task.clone(),
            mode: if *team {
                RunMode::Team
            } else {
                RunMode::Standalone
            },
        },
        Command::Projects { command } => match command {
            ProjectsCommand::List => Request::ProjectsList,
            ProjectsCommand::Add { path, name } => Request::ProjectsAdd {
                // Register absolute paths so the daemon resolves them
                // regardless of its own working directory.
                path: std::fs::canonicalize(path).unwrap_or_else(|_| path.clone()),
                name: name.clone(),
            },
            ProjectsCommand::Remove { target } => Request::ProjectsRemove {
                target: target.clone(),
            },
        },
        Command::Queue => Request::QueueList,
        Command::Sessions { active } => {
            if *active {
                Request::SessionsActive
            } else {
                Request::SessionsList
            }
        }
        Command::Shutdown => Request::Shutdown,
    }
}
