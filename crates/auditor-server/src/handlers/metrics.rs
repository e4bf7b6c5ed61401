//! Dashboard metrics, activity log and health handlers

use std::sync::Arc;

use axum::{
    extract::State,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{ApiQuery, AppError, AppState, MAX_PAGE_LIMIT};
use auditor_core::ai::AiStatus;
use auditor_core::db::ActivityEntry;
use auditor_core::models::DashboardMetrics;

/// Query parameters for dashboard metrics
#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub user_id: Option<String>,
}

/// Query parameters for the activity log
#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default = "default_activity_limit")]
    pub limit: i64,
}

fn default_activity_limit() -> i64 {
    100
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ai: Option<AiStatus>,
}

/// GET /api/metrics - Headline numbers for a user's dashboard
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<MetricsQuery>,
) -> Result<Json<DashboardMetrics>, AppError> {
    let user_id = params
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::bad_request("user_id is required"))?;

    Ok(Json(state.db.dashboard_metrics(user_id)?))
}

/// GET /api/activity - Recent activity log entries
pub async fn list_activity(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ActivityQuery>,
) -> Result<Json<Vec<ActivityEntry>>, AppError> {
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    Ok(Json(state.db.list_activity(limit)?))
}

/// GET /api/health - Liveness plus AI backend status
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ai = match state.ai {
        Some(ref client) => Some(client.status().await),
        None => None,
    };

    Json(HealthResponse { status: "ok", ai })
}
