// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reviewer verdicts and the structured review schema.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The reviewer's decision on the current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Work is acceptable; the pipeline advances.
    Approve,
    /// Re-run the most recent builder with the review feedback.
    Revise,
    /// Plan is flawed; re-run from the architect.
    Redesign,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Approve => write!(f, "APPROVE"),
            Verdict::Revise => write!(f, "REVISE"),
            Verdict::Redesign => write!(f, "REDESIGN"),
        }
    }
}

/// Error parsing a [`Verdict`].
#[derive(Debug, Error)]
#[error("unknown verdict '{0}'")]
pub struct ParseVerdictError(String);

impl FromStr for Verdict {
    type Err = ParseVerdictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "APPROVE" => Ok(Verdict::Approve),
            "REVISE" => Ok(Verdict::Revise),
            "REDESIGN" => Ok(Verdict::Redesign),
            other => Err(ParseVerdictError(other.to_string())),
        }
    }
}

/// Severity of a review issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Nit,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Major => write!(f, "major"),
            Severity::Minor => write!(f, "minor"),
            Severity::Nit => write!(f, "nit"),
        }
    }
}

/// A single issue raised by the reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Structured review returned by a reviewer agent.
///
/// This is the strict schema of the structured verdict channel; when a
/// reviewer only writes `REVIEW.md`, the engine falls back to scanning
/// that file for a verdict line instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub verdict: Verdict,
    /// Score in `[1, 10]`.
    pub score: f64,
    pub summary: String,
    #[serde(default)]
    pub issues: Vec<Issue>,
    pub patterns_compliance: bool,
}

#[cfg(test)]
#[path = "review_tests.rs"]
mod tests;
