//! Pluggable language-model backend abstraction
//!
//! # Architecture
//!
//! - `AIBackend` trait: the two operations the auditor needs (audit synthesis
//!   and chat answers) plus health/identity accessors
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `OllamaBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Built from [`Settings`](crate::config::Settings):
//! - `AI_BACKEND`: openai (default), ollama, mock
//! - `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`
//! - `OLLAMA_HOST`, `OLLAMA_MODEL`

mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::AuditDocument;
use crate::prompts::{PromptId, PromptLibrary, RenderedPrompt};

/// Interface implemented by every language-model backend
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Synthesize an audit document from a period's business data
    async fn generate_audit(&self, request: &AuditRequest) -> Result<AuditDocument>;

    /// Answer a free-text question about an audit
    async fn answer_question(&self, query: &str, audit_context: &Value) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Backend name (for logging and status)
    fn name(&self) -> &'static str;

    /// Model name (stored on generated audits)
    fn model(&self) -> &str;

    /// Host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
#[derive(Clone)]
pub enum AIClient {
    /// OpenAI or any server implementing `/v1/chat/completions`
    OpenAICompatible(OpenAICompatibleBackend),
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create a client from resolved settings
    ///
    /// Returns None when the selected backend is missing its required
    /// configuration (no API key or base URL for openai, no host for ollama).
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let ai = &settings.ai;

        match ai.backend.to_lowercase().as_str() {
            "openai" | "openai_compatible" => {
                if ai.openai_api_key.is_none() && ai.openai_base_url.is_none() {
                    return None;
                }
                let mut backend = OpenAICompatibleBackend::new(
                    settings.openai_base_url(),
                    &ai.openai_model,
                    ai.timeout,
                );
                if let Some(ref key) = ai.openai_api_key {
                    backend = backend.with_api_key(key);
                }
                Some(AIClient::OpenAICompatible(backend))
            }
            "ollama" => ai
                .ollama_host
                .as_deref()
                .map(|host| AIClient::Ollama(OllamaBackend::new(host, &ai.ollama_model, ai.timeout))),
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            other => {
                tracing::warn!(backend = %other, "Unknown AI_BACKEND, no AI client configured");
                None
            }
        }
    }

    /// Create a client from environment variables only
    pub fn from_env() -> Option<Self> {
        Self::from_settings(&Settings::from_env())
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Probe the backend and describe it
    pub async fn status(&self) -> AiStatus {
        AiStatus {
            backend: self.name().to_string(),
            model: self.model().to_string(),
            host: self.host().to_string(),
            healthy: self.health_check().await,
        }
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn generate_audit(&self, request: &AuditRequest) -> Result<AuditDocument> {
        match self {
            AIClient::OpenAICompatible(b) => b.generate_audit(request).await,
            AIClient::Ollama(b) => b.generate_audit(request).await,
            AIClient::Mock(b) => b.generate_audit(request).await,
        }
    }

    async fn answer_question(&self, query: &str, audit_context: &Value) -> Result<String> {
        match self {
            AIClient::OpenAICompatible(b) => b.answer_question(query, audit_context).await,
            AIClient::Ollama(b) => b.answer_question(query, audit_context).await,
            AIClient::Mock(b) => b.answer_question(query, audit_context).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AIClient::OpenAICompatible(b) => b.name(),
            AIClient::Ollama(b) => b.name(),
            AIClient::Mock(b) => b.name(),
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Ollama(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Ollama(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

/// Render the audit prompt for a request
pub(crate) fn render_audit_prompt(
    prompts: &RwLock<PromptLibrary>,
    request: &AuditRequest,
) -> Result<RenderedPrompt> {
    let period = request.period.label();
    let payload = serde_json::to_string_pretty(&request.payload)?;
    let previous = request.previous_summary.clone().unwrap_or_default();

    let mut vars = HashMap::new();
    vars.insert("period", period.as_str());
    vars.insert("payload", payload.as_str());
    vars.insert("previous_summary", previous.as_str());

    let mut library = prompts
        .write()
        .map_err(|_| Error::Ai("Failed to acquire prompt library lock".into()))?;
    library.render(PromptId::GenerateAudit, &vars)
}

/// Render the chat prompt for a question
pub(crate) fn render_chat_prompt(
    prompts: &RwLock<PromptLibrary>,
    query: &str,
    audit_context: &Value,
) -> Result<RenderedPrompt> {
    let context = if audit_context.is_null() {
        String::new()
    } else {
        serde_json::to_string_pretty(audit_context)?
    };

    let mut vars = HashMap::new();
    vars.insert("query", query);
    vars.insert("context", context.as_str());

    let mut library = prompts
        .write()
        .map_err(|_| Error::Ai("Failed to acquire prompt library lock".into()))?;
    library.render(PromptId::AuditChat, &vars)
}
