//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::path::PathBuf;

use auditor_core::ai::AIClient;
use auditor_core::config::Settings;
use auditor_core::db::Database;
use auditor_core::models::{AuditPeriod, IntegrationStatus};
use auditor_core::prompts::PromptLibrary;
use auditor_core::test_utils::MockLlmServer;
use tempfile::TempDir;

use crate::commands::{self, truncate};

const SALES_CSV: &str = "Date,Product,Units,Sale Price,Cost Price\n\
2024-03-01,Widget,2,10,4\n\
2024-03-02,Gadget,5,3.50,1.25\n";

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

/// Settings whose uploads land in a temp dir
fn test_settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.storage.uploads_dir = dir.path().join("uploads");
    settings
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn march() -> AuditPeriod {
    AuditPeriod::new(3, 2024).unwrap()
}

// ========== Shared Utility Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("exactly10!", 10), "exactly10!");
    assert_eq!(truncate("this is a long summary", 10), "this is...");
    // Multi-byte characters are never split
    assert_eq!(truncate("café café café", 8), "café ...");
}

#[test]
fn test_resolve_period_defaults_to_current() {
    let current = AuditPeriod::current();
    assert_eq!(commands::resolve_period(None, None).unwrap(), current);

    let period = commands::resolve_period(Some(2), Some(2023)).unwrap();
    assert_eq!(period, AuditPeriod::new(2, 2023).unwrap());

    let period = commands::resolve_period(Some(7), None).unwrap();
    assert_eq!(period.month, 7);
    assert_eq!(period.year, current.year);
}

#[test]
fn test_resolve_period_rejects_bad_month() {
    assert!(commands::resolve_period(Some(13), Some(2024)).is_err());
    assert!(commands::resolve_period(Some(0), None).is_err());
}

#[test]
fn test_load_settings_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = commands::load_settings(Some(&dir.path().join("nope.toml")));
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("not found"));
}

#[test]
fn test_load_settings_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "config.toml",
        "[storage]\nmax_upload_mb = 2\n\n[scheduler]\naudit_interval_hours = 12\n",
    );

    let settings = commands::load_settings(Some(&path)).unwrap();
    assert_eq!(settings.storage.max_upload_bytes, 2 * 1024 * 1024);
}

#[test]
fn test_open_db_unencrypted_and_with_key() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::default();

    let plain = dir.path().join("plain.db");
    assert!(commands::open_db(&plain, &settings, true).is_ok());

    let keyed = dir.path().join("keyed.db");
    let settings = Settings {
        db_key: Some("correct horse battery staple".to_string()),
        ..Default::default()
    };
    let db = commands::open_db(&keyed, &settings, false).unwrap();
    db.log_activity("cli", "init", None, None, None).unwrap();
    assert_eq!(db.list_activity(1).unwrap().len(), 1);
}

#[test]
fn test_cmd_init() {
    let dir = TempDir::new().unwrap();
    let settings = test_settings(&dir);
    let path = dir.path().join("auditor.db");

    assert!(commands::cmd_init(&path, &settings, true).is_ok());
    assert!(path.exists());
}

#[test]
fn test_require_ai() {
    let unconfigured = Settings::default();
    let err = commands::require_ai(&unconfigured).err().unwrap();
    assert!(err.to_string().contains("not configured"));

    let mut settings = Settings::default();
    settings.ai.backend = "mock".to_string();
    assert!(matches!(
        commands::require_ai(&settings).unwrap(),
        AIClient::Mock(_)
    ));
}

// ========== Classify / Upload Command Tests ==========

#[test]
fn test_cmd_classify() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "sales.csv", SALES_CSV);

    let analysis = commands::cmd_classify(&path, false).unwrap();
    assert_eq!(analysis.row_count, 2);
    assert_eq!(analysis.metrics.total_revenue, 37.5);
    assert_eq!(analysis.metrics.total_cost, 14.25);
}

#[test]
fn test_cmd_classify_json_output() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "totals.csv", "Revenue,Cost\n100,25\n");

    let analysis = commands::cmd_classify(&path, true).unwrap();
    assert_eq!(analysis.metrics.total_profit, 75.0);
    assert_eq!(analysis.metrics.profit_margin, 75.0);
}

#[test]
fn test_cmd_classify_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "notes.txt", "hello");

    let result = commands::cmd_classify(&path, false);
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Unsupported file type"));
}

#[test]
fn test_cmd_classify_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = commands::cmd_classify(&dir.path().join("missing.csv"), false);
    assert!(result.unwrap_err().to_string().contains("Failed to read"));
}

#[test]
fn test_cmd_upload() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db();
    let settings = test_settings(&dir);
    let path = write_file(&dir, "sales.csv", SALES_CSV);

    let id = commands::cmd_upload(&db, &settings, &path, "shop-1", None, false).unwrap();

    let upload = db.get_upload(id).unwrap().unwrap();
    assert!(upload.processed);
    assert_eq!(upload.user_id, "shop-1");
    assert!(settings
        .storage
        .uploads_dir
        .join(&upload.storage_path)
        .exists());

    let activity = db.list_activity(5).unwrap();
    assert_eq!(activity[0].user, "cli");
    assert_eq!(activity[0].action, "upload");
}

#[test]
fn test_cmd_upload_declared_type_overrides_extension() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db();
    let settings = test_settings(&dir);
    let path = write_file(&dir, "export.dat", "Revenue,Cost\n500,100\n");

    let id = commands::cmd_upload(&db, &settings, &path, "shop-1", Some("csv"), false).unwrap();

    let upload = db.get_upload(id).unwrap().unwrap();
    assert_eq!(upload.analysis.unwrap().metrics.total_revenue, 500.0);
}

#[test]
fn test_cmd_upload_replace() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db();
    let settings = test_settings(&dir);
    let first = write_file(&dir, "jan.csv", SALES_CSV);
    let second = write_file(&dir, "feb.csv", "Revenue,Cost\n900,300\n");

    commands::cmd_upload(&db, &settings, &first, "shop-1", None, false).unwrap();
    commands::cmd_upload(&db, &settings, &second, "shop-1", None, true).unwrap();

    let uploads = db.list_uploads(Some("shop-1")).unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].filename, "feb.csv");
}

#[test]
fn test_cmd_upload_too_large() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db();
    let mut settings = test_settings(&dir);
    settings.storage.max_upload_bytes = 8;
    let path = write_file(&dir, "sales.csv", SALES_CSV);

    let result = commands::cmd_upload(&db, &settings, &path, "shop-1", None, false);
    assert!(result.is_err());
    assert!(db.list_uploads(None).unwrap().is_empty());
}

// ========== Audit Command Tests ==========

#[test]
fn test_cmd_audit_payload() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db();
    let settings = test_settings(&dir);
    let path = write_file(&dir, "totals.csv", "Revenue,Cost\n1000,400\n");
    commands::cmd_upload(&db, &settings, &path, "shop-1", None, false).unwrap();

    let payload = commands::cmd_audit_payload(&db, "shop-1", march()).unwrap();
    assert_eq!(payload["period"], "2024-03");
    assert_eq!(payload["totals"]["revenue"], 1000.0);
    assert_eq!(payload["totals"]["profit"], 600.0);

    // Dry run never stores anything
    assert!(db.list_audits(None).unwrap().is_empty());
}

#[tokio::test]
async fn test_cmd_audit_and_manage() {
    let dir = TempDir::new().unwrap();
    let db = setup_test_db();
    let settings = test_settings(&dir);
    let path = write_file(&dir, "totals.csv", "Revenue,Cost\n1000,400\n");
    commands::cmd_upload(&db, &settings, &path, "shop-1", None, false).unwrap();

    let ai = AIClient::mock();
    let id = commands::cmd_audit(&db, &ai, "shop-1", march())
        .await
        .unwrap();

    let audit = db.get_audit(id).unwrap().unwrap();
    assert_eq!(audit.period(), march());
    assert_eq!(audit.monthly_metrics["profit"], 600.0);

    assert!(commands::cmd_audits_list(&db, None).is_ok());
    assert!(commands::cmd_audits_list(&db, Some("shop-1")).is_ok());
    assert!(commands::cmd_audits_show(&db, id, false).is_ok());
    assert!(commands::cmd_audits_show(&db, id, true).is_ok());

    let answer = commands::cmd_chat(&db, &ai, id, "Is margin healthy?")
        .await
        .unwrap();
    assert!(answer.contains("Is margin healthy?"));

    assert_eq!(commands::cmd_audits_delete(&db, "shop-1").unwrap(), 1);
    assert!(commands::cmd_audits_show(&db, id, false).is_err());
}

#[tokio::test]
async fn test_cmd_audit_without_data() {
    let db = setup_test_db();
    let result = commands::cmd_audit(&db, &AIClient::mock(), "nobody", march()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_cmd_chat_unknown_audit() {
    let db = setup_test_db();
    let result = commands::cmd_chat(&db, &AIClient::mock(), 42, "Hello?").await;
    assert!(result.unwrap_err().to_string().contains("not found"));
}

#[tokio::test]
async fn test_cmd_audit_against_openai_compatible_server() {
    let server = MockLlmServer::start().await;
    let dir = TempDir::new().unwrap();
    let db = setup_test_db();
    let mut settings = test_settings(&dir);
    settings.ai.backend = "openai".to_string();
    settings.ai.openai_base_url = Some(server.url());
    settings.ai.openai_model = "mock-gpt".to_string();

    let path = write_file(&dir, "totals.csv", "Revenue,Cost\n800,200\n");
    commands::cmd_upload(&db, &settings, &path, "shop-1", None, false).unwrap();

    let ai = commands::require_ai(&settings).unwrap();
    let id = commands::cmd_audit(&db, &ai, "shop-1", march())
        .await
        .unwrap();

    let audit = db.get_audit(id).unwrap().unwrap();
    assert_eq!(audit.model.as_deref(), Some("mock-gpt"));
    assert_eq!(audit.monthly_metrics["profit"], 600.0);

    let answer = commands::cmd_chat(&db, &ai, id, "What drove profit?")
        .await
        .unwrap();
    assert!(answer.contains("What drove profit?"));
    assert_eq!(server.request_count(), 2);
}

// ========== Integrations Command Tests ==========

#[test]
fn test_cmd_integrations_lifecycle() {
    let db = setup_test_db();

    assert!(commands::cmd_integrations_list(&db, None).is_ok());

    let id = commands::cmd_integrations_add(&db, "shop-1", "Shopify", "ecommerce").unwrap();
    let integration = db.get_integration(id).unwrap().unwrap();
    assert_eq!(integration.platform, "shopify");
    assert_eq!(integration.status, IntegrationStatus::Connected);

    commands::cmd_integrations_status(&db, id, "error").unwrap();
    assert_eq!(
        db.get_integration(id).unwrap().unwrap().status,
        IntegrationStatus::Error
    );
    assert!(commands::cmd_integrations_list(&db, Some("shop-1")).is_ok());

    commands::cmd_integrations_delete(&db, id).unwrap();
    assert!(db.get_integration(id).unwrap().is_none());
    assert!(commands::cmd_integrations_delete(&db, id).is_err());
}

#[test]
fn test_cmd_integrations_validation() {
    let db = setup_test_db();

    let result = commands::cmd_integrations_add(&db, "shop-1", "shopify", "groceries");
    assert!(result.unwrap_err().to_string().contains("category"));

    let id = commands::cmd_integrations_add(&db, "shop-1", "stripe", "payment").unwrap();
    let result = commands::cmd_integrations_status(&db, id, "asleep");
    assert!(result.unwrap_err().to_string().contains("status"));

    assert!(commands::cmd_integrations_status(&db, 999, "connected").is_err());
}

// ========== Prompts Command Tests ==========

#[test]
fn test_cmd_prompts_list_and_path() {
    let dir = TempDir::new().unwrap();
    let mut library = PromptLibrary::with_override_dir(dir.path().to_path_buf());

    assert!(commands::cmd_prompts_list(&mut library).is_ok());
    assert!(commands::cmd_prompts_path(&library).is_ok());
}

#[test]
fn test_cmd_prompts_show() {
    let mut library = PromptLibrary::embedded_only();

    assert!(commands::cmd_prompts_show(&mut library, "generate_audit", false).is_ok());
    assert!(commands::cmd_prompts_show(&mut library, "audit_chat", true).is_ok());

    let err = commands::cmd_prompts_show(&mut library, "classify_merchant", false).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("generate_audit"));
    assert!(message.contains("audit_chat"));
}
