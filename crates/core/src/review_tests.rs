// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    approve = { "APPROVE", Verdict::Approve },
    revise = { "REVISE", Verdict::Revise },
    redesign = { "REDESIGN", Verdict::Redesign },
    lower = { "approve", Verdict::Approve },
    mixed = { "Revise", Verdict::Revise },
)]
fn parses_verdicts_case_insensitively(input: &str, expected: Verdict) {
    assert_eq!(input.parse::<Verdict>().unwrap(), expected);
}

#[test]
fn rejects_unknown_verdict() {
    assert!("MAYBE".parse::<Verdict>().is_err());
}

#[test]
fn verdict_serializes_uppercase() {
    assert_eq!(serde_json::to_value(Verdict::Redesign).unwrap(), "REDESIGN");
}

#[test]
fn review_deserializes_strict_schema() {
    let json = r#"{
        "verdict": "REVISE",
        "score": 6,
        "summary": "solid start, two majors",
        "issues": [
            { "severity": "major", "description": "missing error path", "file": "src/io.rs" },
            { "severity": "nit", "description": "typo" }
        ],
        "patternsCompliance": false
    }"#;
    let review: Review = serde_json::from_str(json).unwrap();
    assert_eq!(review.verdict, Verdict::Revise);
    assert_eq!(review.score, 6.0);
    assert_eq!(review.issues.len(), 2);
    assert_eq!(review.issues[0].file.as_deref(), Some("src/io.rs"));
    assert!(review.issues[1].file.is_none());
    assert!(!review.patterns_compliance);
}

#[test]
fn review_issues_default_to_empty() {
    let json = r#"{
        "verdict": "APPROVE",
        "score": 9,
        "summary": "ship it",
        "patternsCompliance": true
    }"#;
    let review: Review = serde_json::from_str(json).unwrap();
    assert!(review.issues.is_empty());
}
