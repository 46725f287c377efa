// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent role detection.
//!
//! Stage agents are free-form names ("scout", "builder-2", "reviewer:strict").
//! The engine recognizes the role of a stage by prefix-matching the agent
//! name against the four known roles; unknown names get no validation but
//! still produce a pipeline-state entry.

use std::fmt;

/// The four pipeline roles the engine knows how to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Scout,
    Architect,
    Builder,
    Reviewer,
}

impl AgentRole {
    /// Detect the role of an agent name by prefix match.
    ///
    /// Matching is case-insensitive so "Reviewer" and "reviewer-fast"
    /// both resolve to [`AgentRole::Reviewer`].
    pub fn detect(agent: &str) -> Option<Self> {
        let name = agent.to_ascii_lowercase();
        if name.starts_with("scout") {
            Some(Self::Scout)
        } else if name.starts_with("architect") {
            Some(Self::Architect)
        } else if name.starts_with("builder") {
            Some(Self::Builder)
        } else if name.starts_with("reviewer") {
            Some(Self::Reviewer)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scout => "scout",
            Self::Architect => "architect",
            Self::Builder => "builder",
            Self::Reviewer => "reviewer",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "role_tests.rs"]
mod tests;
