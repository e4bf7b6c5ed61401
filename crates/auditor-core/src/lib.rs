//! Auditor Core Library
//!
//! Shared functionality for the profit auditor:
//! - Database access and migrations
//! - Spreadsheet intake (CSV/XLSX reading, blob storage)
//! - Column classification and row aggregation
//! - Pluggable language-model backends (OpenAI-compatible, Ollama)
//! - Prompt library for customizable AI prompts
//! - Audit synthesis and chat

pub mod aggregate;
pub mod ai;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod prompts;
pub mod sheet;
pub mod storage;
pub mod synthesizer;

/// Test utilities including a mock OpenAI-compatible server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::{aggregate, analyze_sheet, coerce_number, parse_number, Aggregation};
pub use ai::{AIBackend, AIClient, AiStatus, AuditRequest, MockBackend, OllamaBackend, OpenAICompatibleBackend};
pub use classify::{classify_header, classify_headers};
pub use config::Settings;
pub use db::{ActivityEntry, Database};
pub use error::{Error, Result};
pub use ingest::{ClearedData, UploadIntake, UploadRequest};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use sheet::{read_sheet, SheetData};
pub use storage::{BlobStore, LocalBlobStore};
pub use synthesizer::AuditSynthesizer;
