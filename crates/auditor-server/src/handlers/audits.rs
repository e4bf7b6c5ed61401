//! Audit generation, listing and chat handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{get_actor, ApiJson, ApiPath, ApiQuery, AppError, AppState};
use auditor_core::models::{Audit, AuditPeriod};
use auditor_core::synthesizer::AuditSynthesizer;

/// Request body for audit generation
#[derive(Debug, Deserialize)]
pub struct GenerateAuditRequest {
    #[serde(alias = "userId")]
    pub user_id: String,
    /// Defaults to the current month
    pub month: Option<u32>,
    /// Defaults to the current year
    pub year: Option<i32>,
}

#[derive(Serialize)]
pub struct GenerateAuditResponse {
    pub success: bool,
    pub audit: Audit,
}

/// Query parameters for audit listing and deletion
#[derive(Debug, Deserialize)]
pub struct AuditsQuery {
    pub user_id: Option<String>,
}

#[derive(Serialize)]
pub struct DeleteAuditsResponse {
    pub success: bool,
    pub deleted: usize,
}

/// Request body for chat
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default, rename = "auditContext", alias = "audit_context")]
    pub audit_context: Value,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub response: String,
}

/// POST /api/generate-audit - Generate (or regenerate) a user's audit for a month
pub async fn generate_audit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<GenerateAuditRequest>,
) -> Result<Json<GenerateAuditResponse>, AppError> {
    let user_id = body.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::bad_request("user_id is required"));
    }

    let current = AuditPeriod::current();
    let period = AuditPeriod::new(
        body.month.unwrap_or(current.month),
        body.year.unwrap_or(current.year),
    )
    .map_err(AppError::from_core)?;

    let ai = state.require_ai()?;
    let audit = AuditSynthesizer::new(&state.db, ai)
        .generate(user_id, period)
        .await
        .map_err(AppError::from_core)?;

    state.db.log_activity(
        &get_actor(&headers),
        "generate",
        Some("audit"),
        Some(audit.id),
        Some(&format!("user_id={}, period={}", user_id, period)),
    )?;

    Ok(Json(GenerateAuditResponse {
        success: true,
        audit,
    }))
}

/// GET /api/audits - List audits, most recent period first
pub async fn list_audits(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<AuditsQuery>,
) -> Result<Json<Vec<Audit>>, AppError> {
    let audits = state.db.list_audits(params.user_id.as_deref())?;
    Ok(Json(audits))
}

/// GET /api/audits/:id - Get a single audit
pub async fn get_audit(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Audit>, AppError> {
    let audit = state
        .db
        .get_audit(id)?
        .ok_or_else(|| AppError::not_found("Audit not found"))?;
    Ok(Json(audit))
}

/// DELETE /api/audits?user_id= - Delete all of a user's audits
pub async fn delete_audits(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiQuery(params): ApiQuery<AuditsQuery>,
) -> Result<Json<DeleteAuditsResponse>, AppError> {
    let user_id = params
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::bad_request("user_id is required"))?;

    let deleted = state.db.delete_audits_for_user(user_id)?;

    state.db.log_activity(
        &get_actor(&headers),
        "delete",
        Some("audit"),
        None,
        Some(&format!("user_id={}, deleted={}", user_id, deleted)),
    )?;

    Ok(Json(DeleteAuditsResponse {
        success: true,
        deleted,
    }))
}

/// POST /api/chat - Answer a question about an audit
pub async fn chat(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if body.query.trim().is_empty() {
        return Err(AppError::bad_request("Query is required"));
    }

    let ai = state.require_ai()?;
    let response = AuditSynthesizer::new(&state.db, ai)
        .chat(&body.query, &body.audit_context)
        .await
        .map_err(AppError::from_core)?;

    Ok(Json(ChatResponse { response }))
}
