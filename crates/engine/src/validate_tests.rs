// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::brain::{brain_dir, plan_path, research_dir, review_path};
use tend_core::{Review, Verdict};

fn outcome() -> AgentOutcome {
    AgentOutcome::default()
}

fn git_init(dir: &Path) {
    let status = std::process::Command::new("git")
        .args(["init", "-q"])
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success());
}

// ── Scout ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn scout_fails_without_research_dir() {
    let dir = tempfile::tempdir().unwrap();
    let err = validate_stage("scout", dir.path(), &outcome()).await;
    assert!(matches!(err, Err(ValidationError::MissingResearch)));
}

#[tokio::test]
async fn scout_fails_with_empty_research_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(research_dir(dir.path())).unwrap();
    let err = validate_stage("scout", dir.path(), &outcome()).await;
    assert!(matches!(err, Err(ValidationError::MissingResearch)));
}

#[tokio::test]
async fn scout_passes_with_one_markdown_file() {
    let dir = tempfile::tempdir().unwrap();
    let research = research_dir(dir.path());
    std::fs::create_dir_all(&research).unwrap();
    std::fs::write(research.join("findings.md"), "# Findings").unwrap();
    assert!(validate_stage("scout", dir.path(), &outcome()).await.is_ok());
}

// ── Architect ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn architect_fails_without_plan() {
    let dir = tempfile::tempdir().unwrap();
    let err = validate_stage("architect", dir.path(), &outcome()).await;
    assert!(matches!(err, Err(ValidationError::MissingPlan)));
}

#[tokio::test]
async fn architect_fails_with_whitespace_plan() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(brain_dir(dir.path())).unwrap();
    std::fs::write(plan_path(dir.path()), "  \n\n").unwrap();
    let err = validate_stage("architect", dir.path(), &outcome()).await;
    assert!(matches!(err, Err(ValidationError::MissingPlan)));
}

#[tokio::test]
async fn architect_fails_on_numbering_gap() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(brain_dir(dir.path())).unwrap();
    std::fs::write(plan_path(dir.path()), "### Task 1: a\n### Task 3: c\n").unwrap();
    let err = validate_stage("architect", dir.path(), &outcome()).await;
    assert!(matches!(err, Err(ValidationError::BadPlanNumbering)));
}

#[tokio::test]
async fn architect_passes_with_contiguous_tasks() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(brain_dir(dir.path())).unwrap();
    std::fs::write(plan_path(dir.path()), "### Task 1: a\n### Task 2: b\n").unwrap();
    assert!(validate_stage("architect", dir.path(), &outcome())
        .await
        .is_ok());
}

#[tokio::test]
async fn architect_passes_with_unnumbered_prose_plan() {
    // A plan without task headings is still a plan; expansion just won't fire.
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(brain_dir(dir.path())).unwrap();
    std::fs::write(plan_path(dir.path()), "Do the thing in one go.").unwrap();
    assert!(validate_stage("architect", dir.path(), &outcome())
        .await
        .is_ok());
}

// ── Builder ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn builder_fails_with_clean_working_tree() {
    let dir = tempfile::tempdir().unwrap();
    git_init(dir.path());
    let err = validate_stage("builder", dir.path(), &outcome()).await;
    assert!(matches!(err, Err(ValidationError::NoDiff)));
}

#[tokio::test]
async fn builder_passes_with_untracked_changes() {
    let dir = tempfile::tempdir().unwrap();
    git_init(dir.path());
    std::fs::write(dir.path().join("new.rs"), "fn main() {}").unwrap();
    assert!(validate_stage("builder", dir.path(), &outcome())
        .await
        .is_ok());
}

#[tokio::test]
async fn builder_fails_outside_a_git_repository() {
    let dir = tempfile::tempdir().unwrap();
    let err = validate_stage("builder", dir.path(), &outcome()).await;
    assert!(matches!(err, Err(ValidationError::GitStatus(_))));
}

#[test]
fn test_script_detection_reads_package_json() {
    let dir = tempfile::tempdir().unwrap();
    assert!(!has_test_script(dir.path()));

    std::fs::write(
        dir.path().join("package.json"),
        r#"{ "scripts": { "build": "tsc" } }"#,
    )
    .unwrap();
    assert!(!has_test_script(dir.path()));

    std::fs::write(
        dir.path().join("package.json"),
        r#"{ "scripts": { "test": "vitest run" } }"#,
    )
    .unwrap();
    assert!(has_test_script(dir.path()));
}

#[test]
fn malformed_package_json_means_no_test_script() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("package.json"), "{oops").unwrap();
    assert!(!has_test_script(dir.path()));
}

// ── Reviewer ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reviewer_passes_via_structured_channel() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = AgentOutcome {
        session_id: None,
        review: Some(Review {
            verdict: Verdict::Approve,
            score: 9.0,
            summary: "fine".to_string(),
            issues: vec![],
            patterns_compliance: true,
        }),
    };
    assert!(validate_stage("reviewer", dir.path(), &outcome).await.is_ok());
}

#[tokio::test]
async fn reviewer_passes_via_review_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(brain_dir(dir.path())).unwrap();
    std::fs::write(review_path(dir.path()), "Verdict: APPROVE").unwrap();
    assert!(validate_stage("reviewer", dir.path(), &outcome())
        .await
        .is_ok());
}

#[tokio::test]
async fn reviewer_fails_with_neither_channel() {
    let dir = tempfile::tempdir().unwrap();
    let err = validate_stage("reviewer", dir.path(), &outcome()).await;
    assert!(matches!(err, Err(ValidationError::MissingVerdict)));
}

// ── Unknown roles ────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_role_gets_no_validation() {
    let dir = tempfile::tempdir().unwrap();
    assert!(validate_stage("team-lead", dir.path(), &outcome())
        .await
        .is_ok());
}
