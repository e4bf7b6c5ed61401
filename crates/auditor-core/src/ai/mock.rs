//! Mock backend for testing
//!
//! Builds an audit from the payload's own numbers so callers get a realistic
//! document without a running model. A canned raw response can be set to
//! exercise the parsing paths.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::models::AuditDocument;

use super::parsing::{parse_audit_response, parse_chat_response};
use super::types::AuditRequest;
use super::AIBackend;

/// Mock AI backend for testing
#[derive(Clone, Default)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    /// Raw text returned for audit requests instead of the generated document
    pub audit_response: Option<String>,
    /// Whether every call should fail as if the backend were down
    pub failing: bool,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Default::default()
        }
    }

    /// Create an unhealthy mock backend whose calls fail
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            failing: true,
            audit_response: None,
        }
    }

    /// Return this raw text for audit requests
    pub fn with_audit_response(mut self, raw: impl Into<String>) -> Self {
        self.audit_response = Some(raw.into());
        self
    }
}

fn number(payload: &Value, path: &[&str]) -> f64 {
    path.iter()
        .try_fold(payload, |v, key| v.get(*key))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn generate_audit(&self, request: &AuditRequest) -> Result<AuditDocument> {
        if self.failing {
            return Err(Error::Ai("Mock backend unavailable".into()));
        }
        if let Some(ref raw) = self.audit_response {
            return parse_audit_response(raw);
        }

        let revenue = number(&request.payload, &["totals", "revenue"]);
        let cost = number(&request.payload, &["totals", "cost"]);
        let profit = revenue - cost;
        let margin = if revenue == 0.0 {
            0.0
        } else {
            profit / revenue * 100.0
        };

        let mut alerts = Vec::new();
        if profit < 0.0 {
            alerts.push(json!({
                "severity": "critical",
                "message": "Costs exceeded revenue this month"
            }));
        }

        let raw = json!({
            "summary": format!(
                "{}: revenue {:.2}, cost {:.2}, profit {:.2} ({:.1}% margin).",
                request.period.label(), revenue, cost, profit, margin
            ),
            "kpis": [
                {"name": "Revenue", "value": format!("{:.2}", revenue), "trend": "flat"},
                {"name": "Profit Margin", "value": format!("{:.1}%", margin), "trend": "flat"}
            ],
            "recommendations": [
                {"title": "Review top costs", "detail": "Check the largest cost lines for savings", "impact": "medium"}
            ],
            "monthly_metrics": {
                "revenue": revenue,
                "cost": cost,
                "profit": profit,
                "profit_margin": margin
            },
            "alerts": alerts
        });

        AuditDocument::from_value(raw)
    }

    async fn answer_question(&self, query: &str, audit_context: &Value) -> Result<String> {
        if self.failing {
            return Err(Error::Ai("Mock backend unavailable".into()));
        }
        let summary = audit_context
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or("no audit context provided");
        parse_chat_response(&format!("Regarding \"{}\": {}", query, summary))
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditPeriod;

    fn request(payload: Value) -> AuditRequest {
        AuditRequest {
            period: AuditPeriod::new(6, 2024).unwrap(),
            payload,
            previous_summary: None,
        }
    }

    #[tokio::test]
    async fn test_mock_audit_uses_payload_totals() {
        let doc = MockBackend::new()
            .generate_audit(&request(json!({"totals": {"revenue": 200.0, "cost": 250.0}})))
            .await
            .unwrap();

        assert_eq!(doc.monthly_metrics["profit"], -50.0);
        assert_eq!(doc.alerts.len(), 1);
        assert!(doc.summary.starts_with("June 2024"));
    }

    #[tokio::test]
    async fn test_mock_canned_invalid_response() {
        let backend = MockBackend::new().with_audit_response("Sorry, I can't do that.");
        assert!(backend.generate_audit(&request(json!({}))).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_unhealthy() {
        let backend = MockBackend::unhealthy();
        assert!(!backend.health_check().await);
        assert!(backend.answer_question("hi", &Value::Null).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_answer_uses_context() {
        let answer = MockBackend::new()
            .answer_question("How are we doing?", &json!({"summary": "Profitable"}))
            .await
            .unwrap();
        assert!(answer.contains("Profitable"));
    }
}
