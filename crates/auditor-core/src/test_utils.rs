//! Test utilities for auditor-core
//!
//! A mock OpenAI-compatible server for integration tests and local
//! development without an API key.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// What the mock returns for audit (JSON mode) requests
#[derive(Debug, Clone)]
pub enum MockAuditReply {
    /// A well-formed audit built from the prompt
    Generated,
    /// This exact message content
    Raw(String),
}

struct MockState {
    audit_reply: MockAuditReply,
    requests: AtomicUsize,
}

/// Mock OpenAI-compatible server for testing and development
pub struct MockLlmServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockLlmServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::start_with(MockAuditReply::Generated).await
    }

    /// Start a server that replies to audit requests with the given content
    pub async fn start_with(audit_reply: MockAuditReply) -> Self {
        let state = Arc::new(MockState {
            audit_reply,
            requests: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat_completions))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of chat completion requests served
    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockLlmServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(default)]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Model listing (health check)
async fn handle_models() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{"id": "mock-gpt", "object": "model", "owned_by": "test"}]
    }))
}

/// Chat completions: JSON mode requests are audits, everything else is chat
async fn handle_chat_completions(
    State(state): State<Arc<MockState>>,
    Json(request): Json<ChatCompletionRequest>,
) -> Json<Value> {
    state.requests.fetch_add(1, Ordering::SeqCst);

    let user_prompt = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .unwrap_or_default();

    let content = if request.response_format.is_some() {
        match &state.audit_reply {
            MockAuditReply::Generated => generated_audit(user_prompt).to_string(),
            MockAuditReply::Raw(raw) => raw.clone(),
        }
    } else {
        let question = user_prompt
            .lines()
            .find_map(|l| l.strip_prefix("Question: "))
            .unwrap_or(user_prompt);
        format!("Mock answer to: {}", question.trim())
    };

    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": request.model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    }))
}

/// Build an audit from the `"totals"` object embedded in the prompt
fn generated_audit(prompt: &str) -> Value {
    let totals = extract_totals(prompt);
    let revenue = totals.get("revenue").and_then(Value::as_f64).unwrap_or(0.0);
    let cost = totals.get("cost").and_then(Value::as_f64).unwrap_or(0.0);
    let profit = revenue - cost;

    json!({
        "summary": format!("Revenue {:.2} against cost {:.2}, profit {:.2}.", revenue, cost, profit),
        "kpis": [{"name": "Profit", "value": format!("{:.2}", profit), "trend": "flat"}],
        "recommendations": [{"title": "Keep going", "detail": "Mock recommendation", "impact": "low"}],
        "monthly_metrics": {"revenue": revenue, "cost": cost, "profit": profit},
        "alerts": [],
        "source": "mock-llm"
    })
}

/// The payload is the first JSON object in the prompt; the response template follows it
fn extract_totals(prompt: &str) -> Value {
    let payload = prompt
        .find('{')
        .and_then(|start| {
            serde_json::Deserializer::from_str(&prompt[start..])
                .into_iter::<Value>()
                .next()
        })
        .and_then(|r| r.ok())
        .unwrap_or(Value::Null);
    payload.get("totals").cloned().unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_totals_from_prompt() {
        let prompt = "Business data (JSON):\n{\"totals\": {\"revenue\": 10.5, \"cost\": 2}}\n\nReturn JSON {\"summary\": \"\"}";
        let totals = extract_totals(prompt);
        assert_eq!(totals["revenue"], 10.5);
        assert_eq!(totals["cost"], 2);
    }

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockLlmServer::start().await;
        let resp = reqwest::get(format!("{}/v1/models", server.url()))
            .await
            .unwrap();
        assert!(resp.status().is_success());
        assert_eq!(server.request_count(), 0);
    }
}
