//! Ollama backend implementation
//!
//! Uses the `/api/generate` endpoint with the system and user prompt sections
//! sent separately. Audit requests ask Ollama for JSON output.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::AuditDocument;
use crate::prompts::{PromptLibrary, RenderedPrompt};

use super::parsing::{parse_audit_response, parse_chat_response};
use super::types::AuditRequest;
use super::{render_audit_prompt, render_chat_prompt, AIBackend};

/// Ollama backend
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    async fn generate(&self, prompt: &RenderedPrompt, json_mode: bool) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            system: prompt.system.clone(),
            prompt: prompt.user.clone(),
            format: json_mode.then(|| "json".to_string()),
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Ai(format!("Ollama error {}: {}", status, body)));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        Ok(ollama_response.response)
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn generate_audit(&self, request: &AuditRequest) -> Result<AuditDocument> {
        let prompt = render_audit_prompt(&self.prompts, request)?;

        let response = self.generate(&prompt, true).await?;
        debug!("Ollama audit response: {}", response);

        parse_audit_response(&response)
    }

    async fn answer_question(&self, query: &str, audit_context: &Value) -> Result<String> {
        let prompt = render_chat_prompt(&self.prompts, query, audit_context)?;

        let response = self.generate(&prompt, false).await?;
        debug!("Ollama chat response: {}", response);

        parse_chat_response(&response)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
