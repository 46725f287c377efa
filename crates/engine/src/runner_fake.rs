// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake agent runner for deterministic testing.
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{AgentInvocation, AgentOutcome, AgentRunner, RunnerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Recorded call to [`FakeRunner`].
#[derive(Debug, Clone)]
pub struct RunnerCall {
    pub agent: String,
    pub task: String,
    pub mode: tend_core::RunMode,
}

type Effect = Box<dyn Fn(&AgentInvocation) + Send + Sync>;

struct Scripted {
    outcome: Result<AgentOutcome, RunnerError>,
    /// Runs before the outcome is returned; used to fake artifact writes.
    effect: Option<Effect>,
}

#[derive(Default)]
struct FakeRunnerState {
    calls: Vec<RunnerCall>,
    script: VecDeque<Scripted>,
}

/// Fake runner: records calls and plays back scripted outcomes in order.
///
/// When the script runs dry, calls succeed with a generated session id
/// and no structured review.
#[derive(Clone, Default)]
pub struct FakeRunner {
    inner: Arc<Mutex<FakeRunnerState>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next unscripted call.
    pub fn push_outcome(&self, outcome: Result<AgentOutcome, RunnerError>) {
        self.inner.lock().script.push_back(Scripted {
            outcome,
            effect: None,
        });
    }

    /// Queue an outcome with a side effect that runs when the call arrives
    /// (e.g. writing `.brain/PLAN.md` the way a real architect would).
    pub fn push_outcome_with<F>(&self, outcome: Result<AgentOutcome, RunnerError>, effect: F)
    where
        F: Fn(&AgentInvocation) + Send + Sync + 'static,
    {
        self.inner.lock().script.push_back(Scripted {
            outcome,
            effect: Some(Box::new(effect)),
        });
    }

    /// All recorded calls in order.
    pub fn calls(&self) -> Vec<RunnerCall> {
        self.inner.lock().calls.clone()
    }

    /// Agent names of all recorded calls, in order.
    pub fn called_agents(&self) -> Vec<String> {
        self.inner.lock().calls.iter().map(|c| c.agent.clone()).collect()
    }
}

#[async_trait]
impl AgentRunner for FakeRunner {
    async fn run_agent(&self, invocation: AgentInvocation) -> Result<AgentOutcome, RunnerError> {
        let (scripted, call_index) = {
            let mut inner = self.inner.lock();
            inner.calls.push(RunnerCall {
                agent: invocation.agent.clone(),
                task: invocation.task.clone(),
                mode: invocation.mode,
            });
            (inner.script.pop_front(), inner.calls.len())
        };

        match scripted {
            Some(Scripted { outcome, effect }) => {
                if let Some(effect) = effect {
                    effect(&invocation);
                }
                outcome
            }
            None => Ok(AgentOutcome {
                session_id: Some(format!("fake-session-{call_index}")),
                review: None,
            }),
        }
    }
}
