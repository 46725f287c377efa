// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage task construction.
//!
//! Stage 0 receives the trigger's task verbatim; later stages get a
//! role-specific wrapper referencing the prior stage's artifact. The
//! wrappers are deliberately small; prompt engineering lives with the
//! agents, not here.

use tend_core::{AgentRole, PipelineStage};

/// Appended when a stage re-runs after a REVISE or REDESIGN verdict.
const RETRY_ADDENDUM: &str =
    "A reviewer has rejected the previous attempt. Read .brain/REVIEW.md first \
     and address every listed issue.";

/// Build the task prompt for stage `index`.
pub fn build_stage_task(index: usize, stage: &PipelineStage, task: &str, retry: bool) -> String {
    let mut prompt = if index == 0 {
        task.to_string()
    } else {
        wrap_for_role(stage, task)
    };

    if retry {
        prompt.push_str("\n\n");
        prompt.push_str(RETRY_ADDENDUM);
    }
    prompt
}

fn wrap_for_role(stage: &PipelineStage, task: &str) -> String {
    match AgentRole::detect(&stage.agent) {
        Some(AgentRole::Scout) => format!(
            "Research the following task and write your findings as markdown \
             files to .brain/RESEARCH/: {task}"
        ),
        Some(AgentRole::Architect) => format!(
            "Read the research in .brain/RESEARCH/, then write .brain/PLAN.md \
             breaking this work into numbered '### Task N: <title>' sections: {task}"
        ),
        Some(AgentRole::Builder) => match &stage.batch_scope {
            Some(scope) => format!(
                "Read .brain/PLAN.md and .brain/DECISIONS.md, then implement {scope} \
                 from the plan. Overall goal: {task}"
            ),
            None => format!(
                "Read .brain/PLAN.md and .brain/DECISIONS.md, then implement the plan. \
                 Overall goal: {task}"
            ),
        },
        Some(AgentRole::Reviewer) => match &stage.batch_scope {
            Some(scope) => format!(
                "Review the work done for {scope} against .brain/PLAN.md. Write \
                 .brain/REVIEW.md with a score (1-10), the issues you found, and a \
                 'Verdict: APPROVE|REVISE|REDESIGN' line."
            ),
            None => "Review the prior work against .brain/PLAN.md. Write .brain/REVIEW.md \
                 with a score (1-10), the issues you found, and a \
                 'Verdict: APPROVE|REVISE|REDESIGN' line."
                .to_string(),
        },
        None => task.to_string(),
    }
}

#[cfg(test)]
#[path = "prompts_tests.rs"]
mod tests;
