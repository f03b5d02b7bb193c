//! API request handlers with proper error propagation.
//!
//! All handlers return `Result<impl IntoResponse, PostwatchError>` so that
//! errors are converted to HTTP status codes via `IntoResponse`.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::db::{HistoryEntry, StoredPost};
use crate::error::PostwatchError;
use crate::jobs::RunStatus;

/// Default page size for list endpoints.
pub const DEFAULT_LIMIT: i64 = 10;

/// Largest accepted page size.
pub const MAX_LIMIT: i64 = 500;

// ═══════════════════════════════════════════════════════════════════════════════
// Run Handlers
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub message: String,
    pub status: RunStatus,
}

pub async fn trigger_scrape(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, PostwatchError> {
    let status = state.controller.trigger()?;

    Ok(Json(TriggerResponse {
        message: "Scraping job started".to_string(),
        status,
    }))
}

pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.controller.status())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Query Handlers
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

fn resolve_limit(query: Result<Query<LimitQuery>, QueryRejection>) -> Result<i64, PostwatchError> {
    let Query(query) =
        query.map_err(|e| PostwatchError::invalid_input(format!("Invalid query: {}", e)))?;

    match query.limit {
        None => Ok(DEFAULT_LIMIT),
        Some(limit) if (1..=MAX_LIMIT).contains(&limit) => Ok(limit),
        Some(limit) => Err(PostwatchError::invalid_input(format!(
            "limit must be between 1 and {}, got {}",
            MAX_LIMIT, limit
        ))),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostsResponse {
    pub posts: Vec<StoredPost>,
}

pub async fn get_posts(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, PostwatchError> {
    let limit = resolve_limit(query)?;
    let posts = state.store.latest_posts(limit).await?;

    Ok(Json(PostsResponse { posts }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

pub async fn get_history(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, PostwatchError> {
    let limit = resolve_limit(query)?;
    let history = state.store.history(limit).await?;

    Ok(Json(HistoryResponse { history }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Health & Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.store.database().ping().await {
        Ok(()) => "connected",
        Err(e) => {
            e.log();
            "disconnected"
        }
    };
    let status = if database == "connected" {
        "healthy"
    } else {
        "degraded"
    };

    Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "database": database,
    }))
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
