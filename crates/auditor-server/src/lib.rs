//! Auditor Web Server
//!
//! Axum-based REST API for the profit auditor. Every route lives under
//! `/api`, speaks JSON and allows any origin. There is no authentication;
//! callers identify the business they act for with a `user_id`.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use auditor_core::ai::{AIBackend, AIClient};
use auditor_core::config::Settings;
use auditor_core::db::Database;
use auditor_core::storage::{BlobStore, LocalBlobStore};

mod extract;
mod handlers;
mod scheduler;

pub use extract::{ApiJson, ApiMultipart, ApiPath, ApiQuery};
pub use scheduler::{
    run_scheduled_audits, start_audit_scheduler, AuditScheduleConfig, ScheduledRunSummary,
};

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Header a client may set to name itself in the activity log
const ACTOR_HEADER: &str = "x-auditor-user";

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub ai: Option<AIClient>,
    /// Raw upload storage
    pub store: Arc<dyn BlobStore>,
    pub settings: Settings,
}

impl AppState {
    /// Build state from settings: local blob store plus the configured AI backend
    pub fn from_settings(db: Database, settings: Settings) -> anyhow::Result<Self> {
        let store = LocalBlobStore::new(&settings.storage.uploads_dir)?;

        let ai = AIClient::from_settings(&settings);
        match ai {
            Some(ref client) => info!(
                "AI backend configured: {} at {} (model: {})",
                client.name(),
                client.host(),
                client.model()
            ),
            None => info!(
                "ℹ️  AI backend not configured (set OPENAI_API_KEY or AI_BACKEND=ollama with OLLAMA_HOST)"
            ),
        }

        Ok(Self {
            db,
            ai,
            store: Arc::new(store),
            settings,
        })
    }

    /// The AI client, or a 503 when none is configured
    pub fn require_ai(&self) -> Result<&AIClient, AppError> {
        self.ai.as_ref().ok_or_else(|| {
            AppError::unavailable("AI backend not configured. Set OPENAI_API_KEY or AI_BACKEND.")
        })
    }
}

/// Name recorded in the activity log for a request
pub fn get_actor(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("api")
        .to_string()
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router from a database and settings
pub fn create_router(
    db: Database,
    settings: Settings,
    static_dir: Option<&str>,
) -> anyhow::Result<Router> {
    let state = Arc::new(AppState::from_settings(db, settings)?);
    Ok(create_router_with_state(state, static_dir))
}

/// Create the application router around existing state (for testing)
pub fn create_router_with_state(state: Arc<AppState>, static_dir: Option<&str>) -> Router {
    // Multipart overhead on top of the file itself
    let body_limit = state.settings.storage.max_upload_bytes + 64 * 1024;

    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health))
        // Uploads
        .route(
            "/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/uploads", get(handlers::list_uploads))
        .route(
            "/uploads/:id",
            get(handlers::get_upload).delete(handlers::delete_upload),
        )
        .route("/uploads/:id/process", post(handlers::process_upload))
        // Audits
        .route("/generate-audit", post(handlers::generate_audit))
        .route(
            "/audits",
            get(handlers::list_audits).delete(handlers::delete_audits),
        )
        .route("/audits/:id", get(handlers::get_audit))
        // Chat
        .route("/chat", post(handlers::chat))
        // Dashboard
        .route("/metrics", get(handlers::get_metrics))
        // Integrations
        .route(
            "/integrations",
            get(handlers::list_integrations).post(handlers::create_integration),
        )
        .route(
            "/integrations/:id",
            axum::routing::delete(handlers::delete_integration),
        )
        .route(
            "/integrations/:id/status",
            patch(handlers::update_integration_status),
        )
        // Record stores
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route(
            "/orders",
            get(handlers::list_orders).post(handlers::create_order),
        )
        .route(
            "/payments",
            get(handlers::list_payments).post(handlers::create_payment),
        )
        .route("/deals", get(handlers::list_deals).post(handlers::create_deal))
        // Activity log
        .route("/activity", get(handlers::list_activity));

    let mut app = Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Serve a dashboard build if provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve(
    db: Database,
    settings: Settings,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_settings(db, settings)?);

    check_ai_connection(state.ai.as_ref()).await;

    match (
        AuditScheduleConfig::from_settings(&state.settings),
        state.ai.clone(),
    ) {
        (Some(config), Some(ai)) => start_audit_scheduler(state.db.clone(), ai, config),
        (Some(_), None) => warn!("⚠️  Audit schedule set but no AI backend configured, scheduler not started"),
        _ => {}
    }

    let app = create_router_with_state(state, static_dir);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection(ai: Option<&AIClient>) {
    let Some(client) = ai else {
        return;
    };

    if client.health_check().await {
        info!(
            "✅ AI backend connected: {} (model: {})",
            client.host(),
            client.model()
        );
    } else {
        warn!(
            "⚠️  AI backend configured but not responding: {} (model: {})",
            client.host(),
            client.model()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unavailable(msg: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Map a core error to a status; caller mistakes become 400/404
    pub fn from_core(err: auditor_core::Error) -> Self {
        use auditor_core::Error;

        match err {
            Error::InvalidData(_) | Error::Upload(_) | Error::UnsupportedFileType(_) => {
                Self::bad_request(&err.to_string())
            }
            Error::NotFound(_) => Self::not_found(&err.to_string()),
            Error::Ai(_) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: err.to_string(),
                internal: Some(err.into()),
            },
            other => other.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
