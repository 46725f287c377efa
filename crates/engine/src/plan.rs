// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan parsing and stage-list expansion.
//!
//! After the architect writes `PLAN.md`, the generic (builder, reviewer)
//! tail of the pipeline is rewritten into per-batch repetitions so each
//! batch of plan tasks gets its own build/review cycle.

use regex::Regex;
use std::sync::OnceLock;
use tend_core::{AgentRole, PipelineStage};

/// Default number of plan tasks per (builder, reviewer) batch.
pub const DEFAULT_BATCH_SIZE: u32 = 3;

/// Stage agent the expansion starts from.
pub const DEFAULT_EXPAND_FROM: &str = "builder";

/// A numbered task heading from `PLAN.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTask {
    pub number: u32,
    pub title: String,
}

fn task_heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        let re = Regex::new(r"(?m)^### Task (\d+):\s*(.+?)\s*$").unwrap();
        re
    })
}

/// Extract `### Task N: title` headings in source order.
pub fn parse_plan_tasks(plan: &str) -> Vec<PlanTask> {
    task_heading_regex()
        .captures_iter(plan)
        .filter_map(|caps| {
            let number = caps.get(1)?.as_str().parse().ok()?;
            let title = caps.get(2)?.as_str().to_string();
            Some(PlanTask { number, title })
        })
        .collect()
}

/// Whether tasks are numbered 1..=n with no gaps, in order.
pub fn numbering_is_contiguous(tasks: &[PlanTask]) -> bool {
    tasks
        .iter()
        .enumerate()
        .all(|(i, t)| t.number == (i as u32) + 1)
}

/// Human-readable batch label: "Tasks 1-3" or "Task 4" for a singleton.
pub fn batch_label(start: u32, end: u32) -> String {
    if start == end {
        format!("Task {start}")
    } else {
        format!("Tasks {start}-{end}")
    }
}

/// Rewrite the stage list into per-batch (builder, reviewer) pairs.
///
/// Finds the first stage whose agent contains `expand_from` and the
/// first reviewer after it, then replaces everything from the
/// expand-from stage onward with one (builder, reviewer) pair per batch
/// of `batch_size` tasks. Stages after the reviewer are discarded; the
/// build/review is assumed to be the tail of the pipeline. Returns the
/// input unchanged when there is nothing to expand.
pub fn expand_stages(
    stages: &[PipelineStage],
    task_count: u32,
    expand_from: &str,
    batch_size: u32,
) -> Vec<PipelineStage> {
    if task_count == 0 || batch_size == 0 {
        return stages.to_vec();
    }

    let Some(expand_idx) = stages.iter().position(|s| s.agent.contains(expand_from)) else {
        return stages.to_vec();
    };
    let Some(reviewer_idx) = stages[expand_idx + 1..]
        .iter()
        .position(|s| AgentRole::detect(&s.agent) == Some(AgentRole::Reviewer))
        .map(|offset| expand_idx + 1 + offset)
    else {
        return stages.to_vec();
    };

    let builder = &stages[expand_idx];
    let reviewer = &stages[reviewer_idx];

    let mut expanded: Vec<PipelineStage> = stages[..expand_idx].to_vec();
    let mut start = 1u32;
    while start <= task_count {
        let end = (start + batch_size - 1).min(task_count);
        let scope = batch_label(start, end);
        expanded.push(builder.clone().with_batch_scope(scope.clone()));
        expanded.push(reviewer.clone().with_batch_scope(scope));
        start = end + 1;
    }
    expanded
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
