//! AI backend request/response types
//!
//! These types are backend-agnostic and used across all AI implementations.

use serde::Serialize;
use serde_json::Value;

use crate::models::AuditPeriod;

/// Everything a backend needs to synthesize an audit
#[derive(Debug, Clone)]
pub struct AuditRequest {
    pub period: AuditPeriod,
    /// Structured business data for the period (spreadsheet totals and records)
    pub payload: Value,
    /// Summary of the most recent earlier audit, for month-over-month comparison
    pub previous_summary: Option<String>,
}

/// Backend status for health endpoints
#[derive(Debug, Clone, Serialize)]
pub struct AiStatus {
    pub backend: String,
    pub model: String,
    pub host: String,
    pub healthy: bool,
}
