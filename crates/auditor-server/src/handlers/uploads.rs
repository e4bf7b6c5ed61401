//! Upload handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{get_actor, ApiMultipart, ApiPath, ApiQuery, AppError, AppState, SuccessResponse};
use auditor_core::ingest::{UploadIntake, UploadRequest};
use auditor_core::models::{FileType, Upload};

/// `{message, data}` envelope for upload operations
#[derive(Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub data: Upload,
}

/// Query parameters for listing uploads
#[derive(Debug, Deserialize)]
pub struct UploadsQuery {
    pub user_id: Option<String>,
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn intake(state: &AppState) -> UploadIntake<'_> {
    UploadIntake::new(&state.db, state.store.as_ref())
        .with_max_size(state.settings.storage.max_upload_bytes)
}

/// POST /api/upload - Store and process a spreadsheet
///
/// Expects multipart form with:
/// - file: CSV or XLSX file (required)
/// - user_id: owner of the upload (required)
/// - file_type: declared type, `csv`/`xlsx` or a mime type (optional)
/// - replace: delete the user's earlier uploads and audits first (optional)
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<Json<UploadResponse>, AppError> {
    let max_size = state.settings.storage.max_upload_bytes;
    let mut file: Option<(String, Vec<u8>, Option<String>)> = None;
    let mut user_id: Option<String> = None;
    let mut file_type: Option<String> = None;
    let mut replace = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read file data"))?;

                if bytes.len() > max_size {
                    return Err(AppError::bad_request(&format!(
                        "File too large. Maximum size is {} MB",
                        max_size / 1024 / 1024
                    )));
                }

                file = Some((filename, bytes.to_vec(), content_type));
            }
            "user_id" | "userId" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read user_id"))?;
                user_id = Some(value.trim().to_string()).filter(|v| !v.is_empty());
            }
            "file_type" | "fileType" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read file_type"))?;
                file_type = Some(value).filter(|v| !v.trim().is_empty());
            }
            "replace" | "clear_previous" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read replace"))?;
                replace = parse_flag(&value);
            }
            _ => {}
        }
    }

    let (filename, bytes, content_type) =
        file.ok_or_else(|| AppError::bad_request("Missing file field"))?;
    let user_id = user_id.ok_or_else(|| AppError::bad_request("Missing user_id field"))?;

    // Browsers label CSV files inconsistently, so the part's content type is
    // only consulted when there is neither a file_type field nor an extension
    let declared_type = file_type.or_else(|| {
        FileType::from_filename(&filename)
            .is_none()
            .then_some(content_type)
            .flatten()
    });

    let upload = intake(&state)
        .submit(&UploadRequest {
            user_id: &user_id,
            filename: &filename,
            bytes: &bytes,
            declared_type: declared_type.as_deref(),
            replace,
        })
        .map_err(AppError::from_core)?;

    info!(upload_id = upload.id, user_id = %user_id, replace, "Upload processed");

    state.db.log_activity(
        &get_actor(&headers),
        "upload",
        Some("upload"),
        Some(upload.id),
        Some(&format!(
            "user_id={}, filename={}, replace={}",
            user_id, upload.filename, replace
        )),
    )?;

    Ok(Json(UploadResponse {
        message: "File uploaded and processed successfully".to_string(),
        data: upload,
    }))
}

/// GET /api/uploads - List uploads, newest first
pub async fn list_uploads(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<UploadsQuery>,
) -> Result<Json<Vec<Upload>>, AppError> {
    let uploads = state.db.list_uploads(params.user_id.as_deref())?;
    Ok(Json(uploads))
}

/// GET /api/uploads/:id - Get a single upload
pub async fn get_upload(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Upload>, AppError> {
    let upload = state
        .db
        .get_upload(id)?
        .ok_or_else(|| AppError::not_found("Upload not found"))?;
    Ok(Json(upload))
}

/// DELETE /api/uploads/:id - Delete an upload and its stored file
pub async fn delete_upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !intake(&state).delete(id).map_err(AppError::from_core)? {
        return Err(AppError::not_found("Upload not found"));
    }

    state
        .db
        .log_activity(&get_actor(&headers), "delete", Some("upload"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/uploads/:id/process - Re-run processing on a stored upload
pub async fn process_upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<UploadResponse>, AppError> {
    let upload = intake(&state).process(id).map_err(AppError::from_core)?;

    state
        .db
        .log_activity(&get_actor(&headers), "process", Some("upload"), Some(id), None)?;

    Ok(Json(UploadResponse {
        message: "File processed successfully".to_string(),
        data: upload,
    }))
}
