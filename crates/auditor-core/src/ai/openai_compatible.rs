//! OpenAI-compatible backend implementation
//!
//! Works with the OpenAI API itself and any server that implements the chat
//! completions API (vLLM, LocalAI, llama-server, Docker Model Runner).

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

/// OpenAI-compatible backend
///
/// ```text
/// export OPENAI_API_KEY="sk-..."
/// export OPENAI_MODEL="gpt-4o-mini"
///
/// // or a local server
/// export OPENAI_BASE_URL="http://192.168.1.100:8000"
/// export OPENAI_MODEL="meta-llama/Llama-3.2-3B-Instruct"
/// ```
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OpenAICompatibleBackend {
    /// Create a new backend with a per-request timeout
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    /// Attach an API key (sent as a Bearer token)
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    /// Use a specific prompt library (tests use embedded-only)
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    /// Make a chat completion request
    async fn chat_completion(&self, prompt: &RenderedPrompt, json_mode: bool) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(ref system) = prompt.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.user.clone(),
        });

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.2),
            response_format: json_mode.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Ai(format!("OpenAI API error {}: {}", status, body)));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Ai("No response from OpenAI API".into()))
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn generate_audit(&self, request: &AuditRequest) -> Result<AuditDocument> {
        let prompt = render_audit_prompt(&self.prompts, request)?;

        let response = self.chat_completion(&prompt, true).await?;
        debug!("OpenAI-compatible audit response: {}", response);

        parse_audit_response(&response)
    }

    async fn answer_question(&self, query: &str, audit_context: &Value) -> Result<String> {
        let prompt = render_chat_prompt(&self.prompts, query, audit_context)?;

        let response = self.chat_completion(&prompt, false).await?;
        debug!("OpenAI-compatible chat response: {}", response);

        parse_chat_response(&response)
    }

    async fn health_check(&self) -> bool {
        let mut req = self.http_client.get(format!("{}/v1/models", self.base_url));
        if let Some(ref api_key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }
        if let Ok(resp) = req.send().await {
            if resp.status().is_success() {
                return true;
            }
        }

        // Some local servers only expose /health
        if let Ok(resp) = self
            .http_client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            if resp.status().is_success() {
                return true;
            }
        }

        false
    }

    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
