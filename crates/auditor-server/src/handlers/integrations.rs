//! Integration (platform connection) handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use crate::{get_actor, ApiJson, ApiPath, ApiQuery, AppError, AppState, SuccessResponse};
use auditor_core::models::{Integration, IntegrationStatus, NewIntegration};

/// Query parameters for listing integrations
#[derive(Debug, Deserialize)]
pub struct IntegrationsQuery {
    pub user_id: Option<String>,
}

/// Request body for a status change
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// GET /api/integrations - List integrations (credentials are never included)
pub async fn list_integrations(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<IntegrationsQuery>,
) -> Result<Json<Vec<Integration>>, AppError> {
    let integrations = state.db.list_integrations(params.user_id.as_deref())?;
    Ok(Json(integrations))
}

/// POST /api/integrations - Connect a platform
pub async fn create_integration(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<NewIntegration>,
) -> Result<Json<Integration>, AppError> {
    if body.user_id.trim().is_empty() {
        return Err(AppError::bad_request("user_id is required"));
    }
    if body.platform.trim().is_empty() {
        return Err(AppError::bad_request("platform is required"));
    }

    let id = state.db.create_integration(&body)?;

    state.db.log_activity(
        &get_actor(&headers),
        "create",
        Some("integration"),
        Some(id),
        Some(&format!(
            "user_id={}, platform={}, category={}",
            body.user_id, body.platform, body.category
        )),
    )?;

    let integration = state
        .db
        .get_integration(id)?
        .ok_or_else(|| AppError::internal("Integration not found after creation"))?;
    Ok(Json(integration))
}

/// DELETE /api/integrations/:id - Disconnect and remove a platform
pub async fn delete_integration(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.db.delete_integration(id)? {
        return Err(AppError::not_found("Integration not found"));
    }

    state.db.log_activity(
        &get_actor(&headers),
        "delete",
        Some("integration"),
        Some(id),
        None,
    )?;

    Ok(Json(SuccessResponse { success: true }))
}

/// PATCH /api/integrations/:id/status - Record a connection status change
pub async fn update_integration_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateStatusRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    let status: IntegrationStatus = body
        .status
        .parse()
        .map_err(|e: String| AppError::bad_request(&e))?;

    if !state.db.update_integration_status(id, status)? {
        return Err(AppError::not_found("Integration not found"));
    }

    state.db.log_activity(
        &get_actor(&headers),
        "update_status",
        Some("integration"),
        Some(id),
        Some(&format!("status={}", status)),
    )?;

    Ok(Json(SuccessResponse { success: true }))
}
