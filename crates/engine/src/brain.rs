// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `.brain/` artifact handling.
//!
//! Pipelines communicate through markdown files in the project's
//! `.brain/` directory: research notes, the plan, the review, and the
//! project context stub.

use crate::EngineError;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tend_core::Verdict;

/// A PROJECT.md shorter than this is considered a placeholder and may
/// be overwritten by the bootstrap stub.
const PROJECT_MD_MIN_LEN: u64 = 80;

pub fn brain_dir(project_root: &Path) -> PathBuf {
    project_root.join(".brain")
}

pub fn research_dir(project_root: &Path) -> PathBuf {
    brain_dir(project_root).join("RESEARCH")
}

pub fn plan_path(project_root: &Path) -> PathBuf {
    brain_dir(project_root).join("PLAN.md")
}

pub fn review_path(project_root: &Path) -> PathBuf {
    brain_dir(project_root).join("REVIEW.md")
}

pub fn project_md_path(project_root: &Path) -> PathBuf {
    brain_dir(project_root).join("PROJECT.md")
}

/// Write a PROJECT.md stub derived from the task when none exists.
///
/// A substantive PROJECT.md is never overwritten; only a missing or
/// near-empty file gets the stub. Returns whether the stub was written.
pub fn ensure_project_context(project_root: &Path, task: &str) -> Result<bool, EngineError> {
    let path = project_md_path(project_root);
    match std::fs::metadata(&path) {
        Ok(meta) if meta.len() >= PROJECT_MD_MIN_LEN => return Ok(false),
        Ok(_) | Err(_) => {}
    }

    std::fs::create_dir_all(brain_dir(project_root))?;
    let stub = format!(
        "# Project\n\nThis project is being worked autonomously.\n\n## Current focus\n\n{task}\n"
    );
    std::fs::write(&path, stub)?;
    tracing::info!(path = %path.display(), "wrote PROJECT.md stub");
    Ok(true)
}

/// Delete leftover `PLAN-PART-*.md` fragments, returning their names.
///
/// Architects sometimes leave partial plan files behind; they must not
/// survive into validation.
pub fn sweep_plan_parts(project_root: &Path) -> Result<Vec<String>, EngineError> {
    let dir = brain_dir(project_root);
    let mut swept = Vec::new();
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(swept),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("PLAN-PART-") && name.ends_with(".md") {
            std::fs::remove_file(entry.path())?;
            tracing::warn!(file = %name, "swept partial plan file");
            swept.push(name);
        }
    }
    swept.sort();
    Ok(swept)
}

/// Read `PLAN.md`, `None` when absent.
pub fn read_plan(project_root: &Path) -> Result<Option<String>, EngineError> {
    match std::fs::read_to_string(plan_path(project_root)) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn verdict_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        let re = Regex::new(r"(?i)Verdict:?\s*(APPROVE|REVISE|REDESIGN)").unwrap();
        re
    })
}

/// Scan free text for a verdict line.
pub fn parse_verdict_text(text: &str) -> Option<Verdict> {
    verdict_regex()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Scan `REVIEW.md` for a verdict; `None` when the file is absent or
/// carries no verdict line.
pub fn parse_verdict_from_review(project_root: &Path) -> Option<Verdict> {
    std::fs::read_to_string(review_path(project_root))
        .ok()
        .and_then(|text| parse_verdict_text(&text))
}

/// Deterministic markdown rendering of a structured review.
///
/// Written so the retry prompt has a REVIEW.md to read even when the
/// reviewer only used the structured channel.
pub fn render_review_md(review: &tend_core::Review) -> String {
    let mut out = String::new();
    out.push_str("# Review\n\n");
    out.push_str(&format!("Verdict: {}\n", review.verdict));
    out.push_str(&format!("Score: {}/10\n", review.score));
    out.push_str(&format!(
        "Patterns compliance: {}\n\n",
        if review.patterns_compliance { "yes" } else { "no" }
    ));
    out.push_str(&review.summary);
    out.push('\n');
    if !review.issues.is_empty() {
        out.push_str("\n## Issues\n\n");
        for issue in &review.issues {
            match &issue.file {
                Some(file) => out.push_str(&format!(
                    "- [{}] {} ({})\n",
                    issue.severity, issue.description, file
                )),
                None => out.push_str(&format!("- [{}] {}\n", issue.severity, issue.description)),
            }
        }
    }
    out
}

/// Render and write `REVIEW.md` from a structured review.
pub fn write_review_md(project_root: &Path, review: &tend_core::Review) -> Result<(), EngineError> {
    std::fs::create_dir_all(brain_dir(project_root))?;
    std::fs::write(review_path(project_root), render_review_md(review))?;
    Ok(())
}

#[cfg(test)]
#[path = "brain_tests.rs"]
mod tests;
