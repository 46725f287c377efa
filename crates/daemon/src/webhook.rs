// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GitHub webhook ingester.
//!
//! Verifies `X-Hub-Signature-256` over the raw body, maps events to
//! queue items through the configured rules, and hands matches to the
//! queue sink. The ingester is a queue producer only; it never executes
//! work.

use crate::config::EventMapping;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use tend_core::QueueItem;

/// Default agent for matched issue events.
const DEFAULT_ISSUE_AGENT: &str = "team-lead";

/// Default agent for matched pull-request events.
const DEFAULT_PR_AGENT: &str = "reviewer";

/// Receives matched queue items.
pub type QueueSink = Arc<dyn Fn(QueueItem) + Send + Sync>;

/// Shared state for the webhook routes.
pub struct WebhookCtx {
    pub secret: String,
    pub mappings: Vec<EventMapping>,
    pub sink: QueueSink,
}

/// Build the webhook router.
///
/// Unknown paths and methods both answer 404.
pub fn router(ctx: Arc<WebhookCtx>) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .with_state(ctx)
}

/// Bind and serve the webhook listener.
pub async fn serve(ctx: Arc<WebhookCtx>, port: u16) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "webhook listener ready");
    axum::serve(listener, router(ctx)).await
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" })))
}

async fn handle_webhook(
    State(ctx): State<Arc<WebhookCtx>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify_signature(&ctx.secret, &body, signature) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid signature" })),
        );
    }

    let Some(event) = headers.get("x-github-event").and_then(|v| v.to_str().ok()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing X-GitHub-Event header" })),
        );
    };

    let payload: Payload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid JSON body" })),
            )
        }
    };

    match match_event(&ctx.mappings, event, &payload) {
        Some(item) => {
            tracing::info!(
                trigger = %item.trigger_name,
                project = %item.project,
                agent = %item.agent,
                "webhook matched, queueing work"
            );
            (ctx.sink)(item);
            (StatusCode::OK, Json(json!({ "ok": true, "matched": true })))
        }
        None => (StatusCode::OK, Json(json!({ "ok": true, "matched": false }))),
    }
}

/// Constant-time HMAC-SHA256 check of `sha256=<hex>` over the raw body.
fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(hex_digest) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    label: Option<Label>,
    #[serde(default)]
    issue: Option<IssuePayload>,
    #[serde(default)]
    pull_request: Option<PullRequestPayload>,
    #[serde(default)]
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
struct Label {
    name: String,
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
}

/// Apply the mapping rules in order; first match wins.
fn match_event(mappings: &[EventMapping], event: &str, payload: &Payload) -> Option<QueueItem> {
    let action = payload.action.as_deref().unwrap_or_default();
    let project = payload
        .repository
        .as_ref()
        .map(|r| short_project_name(&r.full_name))
        .unwrap_or_default();

    for mapping in mappings {
        let Some((map_event, map_action)) = mapping.event.split_once('.') else {
            continue;
        };
        if map_event != event || map_action != action {
            continue;
        }
        match (map_event, map_action) {
            ("issues", "labeled") => {
                let issue = payload.issue.as_ref()?;
                if let Some(required) = &mapping.label {
                    let labeled = payload.label.as_ref().map(|l| l.name.as_str());
                    if labeled != Some(required.as_str()) {
                        continue;
                    }
                }
                return Some(build_item(
                    mapping,
                    format!("webhook:issue-{}", issue.number),
                    project,
                    DEFAULT_ISSUE_AGENT,
                    format!(
                        "Handle issue #{}: {}\n\n{}",
                        issue.number,
                        issue.title.as_deref().unwrap_or_default(),
                        issue.body.as_deref().unwrap_or_default()
                    ),
                ));
            }
            ("pull_request", "opened") => {
                let pr = payload.pull_request.as_ref()?;
                return Some(build_item(
                    mapping,
                    format!("webhook:pr-{}", pr.number),
                    project,
                    DEFAULT_PR_AGENT,
                    format!(
                        "Review pull request #{}: {}\n\n{}",
                        pr.number,
                        pr.title.as_deref().unwrap_or_default(),
                        pr.body.as_deref().unwrap_or_default()
                    ),
                ));
            }
            _ => continue,
        }
    }
    None
}

fn build_item(
    mapping: &EventMapping,
    trigger_name: String,
    project: String,
    default_agent: &str,
    default_task: String,
) -> QueueItem {
    QueueItem {
        trigger_name,
        project,
        agent: mapping
            .agent
            .clone()
            .unwrap_or_else(|| default_agent.to_string()),
        task: mapping.task.clone().unwrap_or(default_task),
        mode: mapping.mode,
        enqueued_at: chrono::Utc::now(),
    }
}

/// Short project name: the last segment of `owner/repo`.
fn short_project_name(full_name: &str) -> String {
    full_name
        .rsplit('/')
        .next()
        .unwrap_or(full_name)
        .to_string()
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
