use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use robogram_types::{AutomationStatus, CycleKind, CycleReport, ReconcileReport};

use super::{ApiError, ApiResult};
use crate::config::Automation;
use crate::counters;
use crate::state::AppState;

const MAX_CYCLE_COUNT: usize = 20;
const CRON_SECRET_HEADER: &str = "x-cron-secret";

/// Whether a request may trigger automation: matching cron secret (header or
/// `secret` query parameter) or an allow-listed Origin/Referer.
fn is_authorized(automation: &Automation, headers: &HeaderMap, query_secret: Option<&str>) -> bool {
    if let Some(secret) = automation.cron_secret.as_deref().filter(|s| !s.is_empty()) {
        let header_secret = headers
            .get(CRON_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if header_secret == Some(secret) || query_secret == Some(secret) {
            return true;
        }
    }

    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    let referer = headers.get(header::REFERER).and_then(|v| v.to_str().ok());
    automation.allowed_origins.iter().any(|allowed| {
        let allowed = allowed.trim_end_matches('/');
        origin.is_some_and(|o| o.trim_end_matches('/') == allowed)
            || referer.is_some_and(|r| r == allowed || r.starts_with(&format!("{}/", allowed)))
    })
}

/// Middleware guarding every `/internal` route
pub async fn require_automation_access(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let query_secret = Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(params)| params.get("secret").cloned());

    if !is_authorized(&state.settings.automation, request.headers(), query_secret.as_deref()) {
        tracing::warn!("Rejected internal request to {}", request.uri().path());
        return ApiError::Unauthorized("Missing or invalid cron secret".to_string()).into_response();
    }

    next.run(request).await
}

#[derive(Debug, Deserialize)]
pub struct CycleQuery {
    count: Option<usize>,
}

/// POST /internal/cycles/:kind
pub async fn run_cycle(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<CycleQuery>,
) -> ApiResult<Json<CycleReport>> {
    let kind = CycleKind::parse(&kind)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown cycle '{}'", kind)))?;

    if let Some(count) = query.count {
        if count > MAX_CYCLE_COUNT {
            return Err(ApiError::BadRequest(format!(
                "count cannot exceed {}",
                MAX_CYCLE_COUNT
            )));
        }
    }

    match state.scheduler.run_automated(kind, query.count).await? {
        Some(report) => Ok(Json(report)),
        None => Err(ApiError::Conflict("Automation is disabled".to_string())),
    }
}

/// GET /internal/automation
pub async fn get_automation(State(state): State<AppState>) -> ApiResult<Json<AutomationStatus>> {
    let enabled = state.scheduler.automation_enabled()?;
    Ok(Json(AutomationStatus { enabled }))
}

/// PUT /internal/automation
pub async fn set_automation(
    State(state): State<AppState>,
    Json(payload): Json<AutomationStatus>,
) -> ApiResult<Json<AutomationStatus>> {
    state.scheduler.set_automation_enabled(payload.enabled)?;
    Ok(Json(payload))
}

/// POST /internal/reconcile
pub async fn reconcile(State(state): State<AppState>) -> ApiResult<Json<ReconcileReport>> {
    Ok(Json(counters::reconcile_all(&state.db)?))
}

/// POST /internal/stories/cleanup
pub async fn cleanup_stories(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let removed = counters::cleanup_expired_stories(&state.db, Utc::now())?;
    Ok(Json(json!({ "removed": removed })))
}
