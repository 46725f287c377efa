// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tend-engine: pipeline engine, triggers, and the heartbeat scheduler.

pub mod brain;
pub mod heartbeat;
pub mod pipeline;
pub mod plan;
pub mod prompts;
pub mod runner;
pub mod trigger;
pub mod validate;

pub use heartbeat::{Heartbeat, HeartbeatDeps, RunSource, TickAction, TickResult};
pub use pipeline::{EngineConfig, PipelineEngine, PipelineReport};
pub use runner::{AgentInvocation, AgentOutcome, AgentRunner, RunnerError};
#[cfg(any(test, feature = "test-support"))]
pub use runner::{FakeRunner, RunnerCall};
pub use trigger::CronTrigger;
pub use validate::ValidationError;

use thiserror::Error;

/// Engine-level errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Pipeline received empty stages array")]
    EmptyStages,

    #[error("invalid cron schedule '{schedule}' for trigger '{name}': {source}")]
    InvalidSchedule {
        name: String,
        schedule: String,
        source: cron::error::Error,
    },

    #[error("storage error: {0}")]
    Storage(#[from] tend_storage::StorageError),

    #[error("agent runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
