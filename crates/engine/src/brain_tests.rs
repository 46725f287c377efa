// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tend_core::{Issue, Review, Severity};
use yare::parameterized;

// ── PROJECT.md bootstrap ─────────────────────────────────────────────────────

#[test]
fn writes_stub_when_project_md_absent() {
    let dir = tempfile::tempdir().unwrap();
    let wrote = ensure_project_context(dir.path(), "add dark mode").unwrap();
    assert!(wrote);
    let text = std::fs::read_to_string(project_md_path(dir.path())).unwrap();
    assert!(text.contains("add dark mode"));
}

#[test]
fn overwrites_near_empty_project_md() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(brain_dir(dir.path())).unwrap();
    std::fs::write(project_md_path(dir.path()), "# stub\n").unwrap();
    assert!(ensure_project_context(dir.path(), "task").unwrap());
}

#[test]
fn never_overwrites_substantive_project_md() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(brain_dir(dir.path())).unwrap();
    let original = "# My Project\n\nA carefully maintained description that is \
                    long enough to be considered substantive content.\n";
    std::fs::write(project_md_path(dir.path()), original).unwrap();

    assert!(!ensure_project_context(dir.path(), "task").unwrap());
    let text = std::fs::read_to_string(project_md_path(dir.path())).unwrap();
    assert_eq!(text, original);
}

// ── Plan part sweep ──────────────────────────────────────────────────────────

#[test]
fn sweeps_only_plan_part_files() {
    let dir = tempfile::tempdir().unwrap();
    let brain = brain_dir(dir.path());
    std::fs::create_dir_all(&brain).unwrap();
    std::fs::write(brain.join("PLAN.md"), "### Task 1: x").unwrap();
    std::fs::write(brain.join("PLAN-PART-1.md"), "fragment").unwrap();
    std::fs::write(brain.join("PLAN-PART-2.md"), "fragment").unwrap();

    let swept = sweep_plan_parts(dir.path()).unwrap();
    assert_eq!(swept, vec!["PLAN-PART-1.md", "PLAN-PART-2.md"]);
    assert!(brain.join("PLAN.md").exists());
    assert!(!brain.join("PLAN-PART-1.md").exists());
}

#[test]
fn sweep_without_brain_dir_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(sweep_plan_parts(dir.path()).unwrap().is_empty());
}

// ── Verdict parsing ──────────────────────────────────────────────────────────

#[parameterized(
    plain = { "Verdict: APPROVE", Some(Verdict::Approve) },
    no_colon = { "Verdict REVISE", Some(Verdict::Revise) },
    lower = { "verdict: redesign", Some(Verdict::Redesign) },
    embedded = { "## Summary\n\nVerdict: REVISE\n\nDetails follow.", Some(Verdict::Revise) },
    missing = { "looks good to me", None },
)]
fn parses_verdict_lines(text: &str, expected: Option<Verdict>) {
    assert_eq!(parse_verdict_text(text), expected);
}

#[test]
fn first_verdict_wins() {
    let text = "Verdict: REVISE\n\nIf fixed, Verdict: APPROVE";
    assert_eq!(parse_verdict_text(text), Some(Verdict::Revise));
}

#[test]
fn reads_verdict_from_review_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(brain_dir(dir.path())).unwrap();
    std::fs::write(review_path(dir.path()), "Score: 8\nVerdict: APPROVE\n").unwrap();
    assert_eq!(
        parse_verdict_from_review(dir.path()),
        Some(Verdict::Approve)
    );
}

#[test]
fn missing_review_file_yields_none() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(parse_verdict_from_review(dir.path()), None);
}

// ── Review rendering ─────────────────────────────────────────────────────────

#[test]
fn renders_review_deterministically() {
    let review = Review {
        verdict: Verdict::Revise,
        score: 6.0,
        summary: "Two issues block approval.".to_string(),
        issues: vec![
            Issue {
                severity: Severity::Major,
                description: "missing error path".to_string(),
                file: Some("src/io.rs".to_string()),
            },
            Issue {
                severity: Severity::Nit,
                description: "typo in comment".to_string(),
                file: None,
            },
        ],
        patterns_compliance: false,
    };

    let rendered = render_review_md(&review);
    assert!(rendered.contains("Verdict: REVISE"));
    assert!(rendered.contains("Score: 6/10"));
    assert!(rendered.contains("Patterns compliance: no"));
    assert!(rendered.contains("- [major] missing error path (src/io.rs)"));
    assert!(rendered.contains("- [nit] typo in comment"));
    // Deterministic: same input, same output.
    assert_eq!(rendered, render_review_md(&review));
}

#[test]
fn written_review_is_parseable_again() {
    let dir = tempfile::tempdir().unwrap();
    let review = Review {
        verdict: Verdict::Redesign,
        score: 3.0,
        summary: "Plan does not fit the architecture.".to_string(),
        issues: vec![],
        patterns_compliance: true,
    };
    write_review_md(dir.path(), &review).unwrap();
    assert_eq!(
        parse_verdict_from_review(dir.path()),
        Some(Verdict::Redesign)
    );
}
