//! Database tests

use super::*;
use crate::models::*;
use chrono::NaiveDate;
use serde_json::json;

fn new_upload(user_id: &str, hash: &str) -> NewUpload {
    NewUpload {
        user_id: user_id.to_string(),
        filename: "sales.csv".to_string(),
        storage_path: format!("{}/{}-sales.csv", user_id, hash),
        file_type: FileType::Csv,
        content_hash: hash.to_string(),
        size_bytes: 42,
    }
}

fn analysis(revenue: f64, cost: f64) -> UploadAnalysis {
    let mut metrics = AggregateMetrics::from_totals(revenue, cost);
    metrics.rows_processed = 2;
    UploadAnalysis {
        columns: vec![ColumnClassification {
            header: "Revenue".into(),
            role: ColumnRole::Revenue,
        }],
        metrics,
        row_count: 2,
        warnings: vec![],
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert!(db.list_uploads(None).unwrap().is_empty());
    assert!(db.list_audits(None).unwrap().is_empty());
}

#[test]
fn test_schema_tables_exist() {
    let db = Database::in_memory().unwrap();
    let conn = db.conn().unwrap();

    for table in [
        "uploads",
        "audits",
        "integrations",
        "transactions",
        "orders",
        "payments",
        "deals",
        "activity_log",
    ] {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "missing table {}", table);
    }
}

#[test]
fn test_derive_key_is_stable() {
    let a = derive_key("correct horse").unwrap();
    let b = derive_key("correct horse").unwrap();
    let c = derive_key("battery staple").unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64);
}

#[test]
fn test_upload_lifecycle() {
    let db = Database::in_memory().unwrap();
    let id = db.create_upload(&new_upload("u1", "aaa")).unwrap();

    let upload = db.get_upload(id).unwrap().unwrap();
    assert!(!upload.processed);
    assert!(upload.analysis.is_none());
    assert_eq!(upload.file_type, FileType::Csv);

    db.mark_upload_processed(id, &analysis(100.0, 40.0)).unwrap();
    let upload = db.get_upload(id).unwrap().unwrap();
    assert!(upload.processed);
    assert_eq!(upload.row_count, Some(2));
    assert!(upload.processed_at.is_some());
    assert_eq!(upload.analysis.unwrap().metrics.total_profit, 60.0);

    assert!(db.delete_upload(id).unwrap());
    assert!(!db.delete_upload(id).unwrap());
    assert!(db.get_upload(id).unwrap().is_none());
}

#[test]
fn test_upload_failure_recorded() {
    let db = Database::in_memory().unwrap();
    let id = db.create_upload(&new_upload("u1", "bbb")).unwrap();

    db.mark_upload_failed(id, "Spreadsheet has no header row").unwrap();
    let upload = db.get_upload(id).unwrap().unwrap();
    assert!(!upload.processed);
    assert_eq!(upload.error.as_deref(), Some("Spreadsheet has no header row"));
}

#[test]
fn test_uploads_scoped_by_user() {
    let db = Database::in_memory().unwrap();
    db.create_upload(&new_upload("u1", "a")).unwrap();
    db.create_upload(&new_upload("u1", "b")).unwrap();
    db.create_upload(&new_upload("u2", "c")).unwrap();

    assert_eq!(db.list_uploads(Some("u1")).unwrap().len(), 2);
    assert_eq!(db.list_uploads(None).unwrap().len(), 3);
    assert!(db.find_upload_by_hash("u1", "b").unwrap().is_some());
    assert!(db.find_upload_by_hash("u2", "b").unwrap().is_none());

    let removed = db.delete_uploads_for_user("u1").unwrap();
    assert_eq!(removed.len(), 2);
    assert_eq!(db.list_uploads(None).unwrap().len(), 1);
}

#[test]
fn test_spreadsheet_metrics_merge_processed_only() {
    let db = Database::in_memory().unwrap();
    let a = db.create_upload(&new_upload("u1", "a")).unwrap();
    let b = db.create_upload(&new_upload("u1", "b")).unwrap();
    let c = db.create_upload(&new_upload("u1", "c")).unwrap();
    db.mark_upload_processed(a, &analysis(100.0, 50.0)).unwrap();
    db.mark_upload_processed(b, &analysis(300.0, 50.0)).unwrap();
    db.mark_upload_failed(c, "bad").unwrap();

    let (metrics, count) = db.spreadsheet_metrics("u1").unwrap();
    assert_eq!(count, 2);
    assert_eq!(metrics.total_revenue, 400.0);
    assert_eq!(metrics.total_profit, 300.0);
    assert!((metrics.profit_margin - 75.0).abs() < 1e-9);

    assert_eq!(db.users_with_processed_uploads().unwrap(), vec!["u1".to_string()]);
}

#[test]
fn test_replace_audit_keeps_one_per_period() {
    let db = Database::in_memory().unwrap();
    let period = AuditPeriod::new(3, 2024).unwrap();

    let first = AuditDocument::from_value(json!({"summary": "first"})).unwrap();
    let second = AuditDocument::from_value(json!({"summary": "second", "extra": 1})).unwrap();

    db.replace_audit("u1", period, &first, Some("mock")).unwrap();
    let id = db.replace_audit("u1", period, &second, Some("mock")).unwrap();

    let audits = db.list_audits(Some("u1")).unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].id, id);
    assert_eq!(audits[0].summary, "second");
    assert_eq!(audits[0].document["extra"], 1);
    assert_eq!(audits[0].model.as_deref(), Some("mock"));
}

#[test]
fn test_audits_ordered_and_previous() {
    let db = Database::in_memory().unwrap();
    let doc = |s: &str| AuditDocument::from_value(json!({ "summary": s })).unwrap();

    db.replace_audit("u1", AuditPeriod::new(12, 2023).unwrap(), &doc("dec"), None)
        .unwrap();
    db.replace_audit("u1", AuditPeriod::new(2, 2024).unwrap(), &doc("feb"), None)
        .unwrap();
    db.replace_audit("u1", AuditPeriod::new(1, 2024).unwrap(), &doc("jan"), None)
        .unwrap();
    db.replace_audit("u2", AuditPeriod::new(5, 2024).unwrap(), &doc("other"), None)
        .unwrap();

    let summaries: Vec<String> = db
        .list_audits(Some("u1"))
        .unwrap()
        .into_iter()
        .map(|a| a.summary)
        .collect();
    assert_eq!(summaries, vec!["feb", "jan", "dec"]);

    let previous = db
        .previous_audit("u1", AuditPeriod::new(2, 2024).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(previous.summary, "jan");
    assert!(db
        .previous_audit("u1", AuditPeriod::new(12, 2023).unwrap())
        .unwrap()
        .is_none());

    assert_eq!(db.latest_audit("u1").unwrap().unwrap().summary, "feb");
    assert_eq!(db.delete_audits_for_user("u1").unwrap(), 3);
    assert_eq!(db.list_audits(None).unwrap().len(), 1);
}

#[test]
fn test_integration_crud() {
    let db = Database::in_memory().unwrap();
    let id = db
        .create_integration(&NewIntegration {
            user_id: "u1".into(),
            platform: "stripe".into(),
            category: IntegrationCategory::Payment,
            credentials: json!({"secret_key": "sk_live_x"}),
        })
        .unwrap();

    let integration = db.get_integration(id).unwrap().unwrap();
    assert_eq!(integration.status, IntegrationStatus::Connected);
    assert_eq!(integration.credentials["secret_key"], "sk_live_x");
    assert!(integration.last_synced_at.is_none());

    assert!(db
        .update_integration_status(id, IntegrationStatus::Error)
        .unwrap());
    assert!(db.get_integration(id).unwrap().unwrap().last_synced_at.is_none());

    assert!(db
        .update_integration_status(id, IntegrationStatus::Connected)
        .unwrap());
    assert!(db.get_integration(id).unwrap().unwrap().last_synced_at.is_some());

    assert_eq!(db.list_integrations(Some("u1")).unwrap().len(), 1);
    assert!(db.list_integrations(Some("u2")).unwrap().is_empty());
    assert!(db.delete_integration(id).unwrap());
    assert!(!db.update_integration_status(id, IntegrationStatus::Error).unwrap());
}

#[test]
fn test_records_filtered_by_period() {
    let db = Database::in_memory().unwrap();
    let march = AuditPeriod::new(3, 2024).unwrap();

    for (d, amount) in [(date(2024, 3, 1), 500.0), (date(2024, 3, 31), -200.0), (date(2024, 4, 1), 999.0)] {
        db.add_transaction(&NewTransaction {
            user_id: "u1".into(),
            date: d,
            description: "entry".into(),
            amount,
            category: None,
            source: Some("manual".into()),
        })
        .unwrap();
    }
    db.add_order(&NewOrder {
        user_id: "u1".into(),
        platform: "shopify".into(),
        order_ref: "#1001".into(),
        date: date(2024, 3, 15),
        total: 120.0,
        status: "completed".into(),
    })
    .unwrap();
    db.add_payment(&NewPayment {
        user_id: "u1".into(),
        provider: "stripe".into(),
        date: date(2024, 2, 28),
        amount: 80.0,
        fee: 2.62,
        status: "succeeded".into(),
    })
    .unwrap();
    db.add_deal(&NewDeal {
        user_id: "u1".into(),
        name: "Wholesale".into(),
        stage: "proposal".into(),
        value: 5000.0,
        close_date: None,
    })
    .unwrap();
    db.add_deal(&NewDeal {
        user_id: "u1".into(),
        name: "Old".into(),
        stage: "won".into(),
        value: 100.0,
        close_date: Some(date(2023, 1, 5)),
    })
    .unwrap();

    let records = db.records_for_period("u1", march).unwrap();
    assert_eq!(records.transactions.len(), 2);
    assert_eq!(records.orders.len(), 1);
    assert!(records.payments.is_empty());
    assert_eq!(records.deals.len(), 1);
    assert_eq!(records.deals[0].name, "Wholesale");

    assert_eq!(db.list_transactions("u1", None).unwrap().len(), 3);
    assert!(db.list_transactions("u2", None).unwrap().is_empty());
}

#[test]
fn test_dashboard_metrics() {
    let db = Database::in_memory().unwrap();
    let upload = db.create_upload(&new_upload("u1", "a")).unwrap();
    db.mark_upload_processed(upload, &analysis(1000.0, 400.0)).unwrap();

    db.add_transaction(&NewTransaction {
        user_id: "u1".into(),
        date: date(2024, 3, 1),
        description: "rent".into(),
        amount: -300.0,
        category: Some("rent".into()),
        source: None,
    })
    .unwrap();
    db.add_payment(&NewPayment {
        user_id: "u1".into(),
        provider: "stripe".into(),
        date: date(2024, 3, 2),
        amount: 100.0,
        fee: 3.2,
        status: "succeeded".into(),
    })
    .unwrap();
    db.add_deal(&NewDeal {
        user_id: "u1".into(),
        name: "Lost one".into(),
        stage: "Lost".into(),
        value: 900.0,
        close_date: None,
    })
    .unwrap();

    let metrics = db.dashboard_metrics("u1").unwrap();
    assert_eq!(metrics.processed_uploads, 1);
    assert_eq!(metrics.spreadsheet.total_profit, 600.0);
    assert_eq!(metrics.transaction_expenses, 300.0);
    assert_eq!(metrics.transaction_income, 0.0);
    assert_eq!(metrics.payment_fees, 3.2);
    assert_eq!(metrics.open_pipeline_value, 0.0);
    assert!(metrics.latest_audit_id.is_none());
}

#[test]
fn test_dashboard_status_filters_ignore_case() {
    let db = Database::in_memory().unwrap();

    for (order_ref, total, status) in [
        ("A-1", 120.0, "completed"),
        ("A-2", 80.0, "Cancelled"),
        ("A-3", 50.0, "CANCELLED"),
    ] {
        db.add_order(&NewOrder {
            user_id: "u1".into(),
            platform: "shopify".into(),
            order_ref: order_ref.into(),
            date: date(2024, 3, 4),
            total,
            status: status.into(),
        })
        .unwrap();
    }
    for (amount, fee, status) in [(100.0, 3.0, "Succeeded"), (40.0, 1.0, "failed")] {
        db.add_payment(&NewPayment {
            user_id: "u1".into(),
            provider: "stripe".into(),
            date: date(2024, 3, 5),
            amount,
            fee,
            status: status.into(),
        })
        .unwrap();
    }

    let metrics = db.dashboard_metrics("u1").unwrap();
    assert_eq!(metrics.order_revenue, 120.0);
    assert_eq!(metrics.payment_volume, 100.0);
    assert_eq!(metrics.payment_fees, 3.0);
}

#[test]
fn test_activity_log() {
    let db = Database::in_memory().unwrap();
    db.log_activity("u1", "upload", Some("upload"), Some(1), None)
        .unwrap();
    db.log_activity("u1", "generate_audit", Some("audit"), Some(7), Some("2024-03"))
        .unwrap();

    let entries = db.list_activity(10).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "generate_audit");
    assert_eq!(entries[0].details.as_deref(), Some("2024-03"));

    assert_eq!(db.list_activity(1).unwrap().len(), 1);
}
