//! Integration tests for auditor-core
//!
//! These tests exercise the full upload → classify → aggregate → audit workflow.

use auditor_core::{
    ai::{AIClient, MockBackend},
    classify::classify_headers,
    db::Database,
    models::{AuditPeriod, ColumnRole, NewOrder, NewTransaction},
    storage::LocalBlobStore,
    AuditSynthesizer, Error, UploadIntake, UploadRequest,
};
use chrono::NaiveDate;
use tempfile::TempDir;

/// Unit-level sales data: revenue and cost come from units × price
fn unit_sales_csv() -> &'static str {
    r#"Order Date,Product Name,Quantity,Unit Price,Unit Cost
2024-03-01,Widget,2,10.00,4.00
2024-03-02,Gadget,3,"$1,000.00",$600.00
2024-03-03,Gizmo,n/a,5.00,1.00
"#
}

/// Pre-totalled data with direct revenue and cost columns
fn totals_csv() -> &'static str {
    "Month,Revenue,COGS,Marketing Spend\nJanuary,\"$12,500.00\",4000,1500\nFebruary,10000,(3500),500\n"
}

fn setup() -> (Database, LocalBlobStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = LocalBlobStore::new(dir.path()).expect("Failed to create blob store");
    let db = Database::in_memory().expect("Failed to create in-memory database");
    (db, store, dir)
}

fn submit<'a>(user_id: &'a str, filename: &'a str, bytes: &'a [u8]) -> UploadRequest<'a> {
    UploadRequest {
        user_id,
        filename,
        bytes,
        declared_type: None,
        replace: false,
    }
}

// =============================================================================
// Upload Workflow
// =============================================================================

#[test]
fn test_unit_sales_upload_workflow() {
    let (db, store, _dir) = setup();
    let intake = UploadIntake::new(&db, &store);

    let upload = intake
        .submit(&submit("shop-1", "march sales.csv", unit_sales_csv().as_bytes()))
        .expect("Upload should process");

    assert!(upload.processed);
    assert_eq!(upload.row_count, Some(3));
    assert!(upload.storage_path.starts_with("shop-1/"));
    assert!(upload.storage_path.ends_with("-march_sales.csv"));

    let analysis = upload.analysis.expect("Processed upload has an analysis");
    let roles: Vec<ColumnRole> = analysis.columns.iter().map(|c| c.role).collect();
    assert_eq!(
        roles,
        vec![
            ColumnRole::Date,
            ColumnRole::Product,
            ColumnRole::Units,
            ColumnRole::SalePrice,
            ColumnRole::CostPrice,
        ]
    );

    // 2×10 + 3×1000 + 0×5 = 3020 revenue, 2×4 + 3×600 + 0×1 = 1808 cost
    let m = analysis.metrics;
    assert_eq!(m.total_revenue, 3020.0);
    assert_eq!(m.total_cost, 1808.0);
    assert_eq!(m.total_profit, m.total_revenue - m.total_cost);
    assert!(!analysis.warnings.is_empty(), "n/a cell should be reported");
}

#[test]
fn test_direct_totals_upload() {
    let (db, store, _dir) = setup();
    let intake = UploadIntake::new(&db, &store);

    let upload = intake
        .submit(&submit("shop-1", "totals.csv", totals_csv().as_bytes()))
        .expect("Upload should process");

    let m = upload.analysis.unwrap().metrics;
    assert_eq!(m.total_revenue, 22500.0);
    // COGS and Marketing Spend both classify as cost; "(3500)" coerces to 3500
    assert_eq!(m.total_cost, 9500.0);
    assert_eq!(m.total_profit, 13000.0);
}

#[test]
fn test_reprocess_after_failure_is_idempotent() {
    let (db, store, _dir) = setup();
    let intake = UploadIntake::new(&db, &store);

    let first = intake
        .submit(&submit("shop-1", "sales.csv", unit_sales_csv().as_bytes()))
        .unwrap();
    let again = intake.process(first.id).unwrap();

    assert_eq!(
        first.analysis.unwrap().metrics,
        again.analysis.unwrap().metrics
    );
    assert_eq!(db.list_uploads(Some("shop-1")).unwrap().len(), 1);
}

#[test]
fn test_unsupported_file_rejected_before_storage() {
    let (db, store, dir) = setup();
    let intake = UploadIntake::new(&db, &store);

    let result = intake.submit(&submit("shop-1", "notes.txt", b"hello"));
    assert!(matches!(result, Err(Error::UnsupportedFileType(_))));
    assert!(db.list_uploads(None).unwrap().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

// =============================================================================
// Classification Properties
// =============================================================================

#[test]
fn test_classification_is_total_and_idempotent() {
    let headers = [
        "Units", "units", "Sale Price", "sale_price", "Cost-Price", "Revenue", "Cost", "Date",
        "Product", "SKU", "", "Notes", "Revenue",
    ];

    let first = classify_headers(&headers);
    let second = classify_headers(&headers);

    assert_eq!(first.len(), headers.len());
    assert_eq!(first, second);
    for c in &first {
        assert!(ColumnRole::all().contains(&c.role));
    }
    assert_eq!(first[10].role, ColumnRole::Other);
    assert_eq!(first[5].role, first[12].role);
}

// =============================================================================
// Audit Workflow
// =============================================================================

#[tokio::test]
async fn test_full_audit_workflow() {
    let (db, store, _dir) = setup();
    let ai = AIClient::mock();
    let period = AuditPeriod::new(3, 2024).unwrap();

    UploadIntake::new(&db, &store)
        .submit(&submit("shop-1", "totals.csv", totals_csv().as_bytes()))
        .unwrap();

    db.add_order(&NewOrder {
        user_id: "shop-1".into(),
        platform: "amazon".into(),
        order_ref: "114-0001".into(),
        date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
        total: 1500.0,
        status: "completed".into(),
    })
    .unwrap();
    db.add_transaction(&NewTransaction {
        user_id: "shop-1".into(),
        date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        description: "Warehouse rent".into(),
        amount: -2000.0,
        category: Some("rent".into()),
        source: Some("quickbooks".into()),
    })
    .unwrap();

    let synth = AuditSynthesizer::new(&db, &ai);
    let audit = synth.generate("shop-1", period).await.unwrap();

    assert_eq!(audit.user_id, "shop-1");
    assert_eq!(audit.period(), period);
    // 22500 + 1500 revenue, 9500 + 2000 cost
    assert_eq!(audit.monthly_metrics["revenue"], 24000.0);
    assert_eq!(audit.monthly_metrics["profit"], 12500.0);
    assert!(audit.alerts.is_empty());
    assert!(!audit.kpis.is_empty());

    let answer = synth
        .chat("How profitable was March?", &audit.document)
        .await
        .unwrap();
    assert!(answer.contains("March 2024"));
}

#[tokio::test]
async fn test_regenerating_leaves_one_audit_per_period() {
    let (db, store, _dir) = setup();
    let ai = AIClient::mock();
    UploadIntake::new(&db, &store)
        .submit(&submit("shop-1", "totals.csv", totals_csv().as_bytes()))
        .unwrap();

    let synth = AuditSynthesizer::new(&db, &ai);
    let march = AuditPeriod::new(3, 2024).unwrap();
    let april = AuditPeriod::new(4, 2024).unwrap();

    synth.generate("shop-1", march).await.unwrap();
    synth.generate("shop-1", march).await.unwrap();
    synth.generate("shop-1", april).await.unwrap();

    let audits = db.list_audits(Some("shop-1")).unwrap();
    assert_eq!(audits.len(), 2);
    assert_eq!(audits[0].period(), april);
    assert_eq!(audits[1].period(), march);
}

#[tokio::test]
async fn test_model_prose_persists_nothing() {
    let (db, store, _dir) = setup();
    UploadIntake::new(&db, &store)
        .submit(&submit("shop-1", "totals.csv", totals_csv().as_bytes()))
        .unwrap();

    let ai = AIClient::Mock(
        MockBackend::new().with_audit_response("Here is your audit: revenue looks fine."),
    );
    let result = AuditSynthesizer::new(&db, &ai)
        .generate("shop-1", AuditPeriod::new(3, 2024).unwrap())
        .await;

    assert!(result.is_err());
    assert!(db.list_audits(None).unwrap().is_empty());
}

#[tokio::test]
async fn test_replace_upload_clears_audits() {
    let (db, store, _dir) = setup();
    let ai = AIClient::mock();
    let intake = UploadIntake::new(&db, &store);

    intake
        .submit(&submit("shop-1", "old.csv", unit_sales_csv().as_bytes()))
        .unwrap();
    AuditSynthesizer::new(&db, &ai)
        .generate("shop-1", AuditPeriod::new(3, 2024).unwrap())
        .await
        .unwrap();

    let mut replacement = submit("shop-1", "new.csv", totals_csv().as_bytes());
    replacement.replace = true;
    intake.submit(&replacement).unwrap();

    assert_eq!(db.list_uploads(Some("shop-1")).unwrap().len(), 1);
    assert!(db.list_audits(Some("shop-1")).unwrap().is_empty());

    let metrics = db.dashboard_metrics("shop-1").unwrap();
    assert_eq!(metrics.processed_uploads, 1);
    assert_eq!(metrics.spreadsheet.total_revenue, 22500.0);
}
