//! Audit synthesis
//!
//! Gathers a user's spreadsheet totals and the period's records into one
//! payload, asks the language model for an audit, and stores the result in
//! place of any earlier audit for the same period.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::ai::{AIBackend, AIClient, AuditRequest};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{AggregateMetrics, Audit, AuditPeriod, PeriodRecords};

/// Number of individual records included per store
const MAX_ITEMS_PER_STORE: usize = 25;

/// Deal stages that no longer count toward the open pipeline
const CLOSED_DEAL_STAGES: &[&str] = &["won", "lost", "closed", "closed_won", "closed_lost"];

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Build the model payload from spreadsheet metrics and period records
///
/// `totals` combines every source: revenue is spreadsheet revenue plus
/// non-cancelled order totals plus positive transactions; cost is
/// spreadsheet cost plus negative transactions plus payment fees.
pub fn build_payload(
    period: AuditPeriod,
    spreadsheet: &AggregateMetrics,
    processed_uploads: i64,
    records: &PeriodRecords,
) -> Value {
    let income: f64 = records
        .transactions
        .iter()
        .filter(|t| t.amount > 0.0)
        .map(|t| t.amount)
        .sum();
    let expenses: f64 = records
        .transactions
        .iter()
        .filter(|t| t.amount < 0.0)
        .map(|t| -t.amount)
        .sum();

    let mut expenses_by_category: BTreeMap<String, f64> = BTreeMap::new();
    for tx in records.transactions.iter().filter(|t| t.amount < 0.0) {
        let category = tx.category.clone().unwrap_or_else(|| "uncategorized".into());
        *expenses_by_category.entry(category).or_default() += -tx.amount;
    }

    let mut revenue_by_platform: BTreeMap<String, f64> = BTreeMap::new();
    let mut order_revenue = 0.0;
    let mut cancelled_orders = 0;
    for order in &records.orders {
        if order.status.eq_ignore_ascii_case("cancelled") {
            cancelled_orders += 1;
            continue;
        }
        order_revenue += order.total;
        *revenue_by_platform.entry(order.platform.clone()).or_default() += order.total;
    }

    let succeeded: Vec<_> = records
        .payments
        .iter()
        .filter(|p| p.status.eq_ignore_ascii_case("succeeded"))
        .collect();
    let payment_volume: f64 = succeeded.iter().map(|p| p.amount).sum();
    let payment_fees: f64 = succeeded.iter().map(|p| p.fee).sum();

    let (open_deals, closed_deals): (Vec<_>, Vec<_>) = records
        .deals
        .iter()
        .partition(|d| !CLOSED_DEAL_STAGES.contains(&d.stage.to_lowercase().as_str()));
    let won_value: f64 = closed_deals
        .iter()
        .filter(|d| d.stage.to_lowercase().contains("won"))
        .map(|d| d.value)
        .sum();

    let revenue = spreadsheet.total_revenue + order_revenue + income;
    let cost = spreadsheet.total_cost + expenses + payment_fees;
    let totals = AggregateMetrics::from_totals(revenue, cost);

    json!({
        "period": period.to_string(),
        "period_label": period.label(),
        "totals": {
            "revenue": round2(totals.total_revenue),
            "cost": round2(totals.total_cost),
            "profit": round2(totals.total_profit),
            "profit_margin": round2(totals.profit_margin),
            "expense_ratio": round2(totals.expense_ratio),
        },
        "spreadsheet": {
            "uploads": processed_uploads,
            "revenue": round2(spreadsheet.total_revenue),
            "cost": round2(spreadsheet.total_cost),
            "profit": round2(spreadsheet.total_profit),
            "profit_margin": round2(spreadsheet.profit_margin),
            "units": spreadsheet.total_units,
            "rows": spreadsheet.rows_processed,
        },
        "transactions": {
            "count": records.transactions.len(),
            "income": round2(income),
            "expenses": round2(expenses),
            "expenses_by_category": expenses_by_category,
            "items": records.transactions.iter().take(MAX_ITEMS_PER_STORE).collect::<Vec<_>>(),
        },
        "orders": {
            "count": records.orders.len(),
            "cancelled": cancelled_orders,
            "revenue": round2(order_revenue),
            "revenue_by_platform": revenue_by_platform,
        },
        "payments": {
            "count": records.payments.len(),
            "volume": round2(payment_volume),
            "fees": round2(payment_fees),
        },
        "deals": {
            "count": records.deals.len(),
            "open": open_deals.len(),
            "open_pipeline_value": round2(open_deals.iter().map(|d| d.value).sum()),
            "won_value": round2(won_value),
            "items": records.deals.iter().take(MAX_ITEMS_PER_STORE).collect::<Vec<_>>(),
        },
    })
}

fn has_data(processed_uploads: i64, records: &PeriodRecords) -> bool {
    processed_uploads > 0
        || !records.transactions.is_empty()
        || !records.orders.is_empty()
        || !records.payments.is_empty()
        || !records.deals.is_empty()
}

/// Generates audits and answers questions about them
pub struct AuditSynthesizer<'a> {
    db: &'a Database,
    ai: &'a AIClient,
}

impl<'a> AuditSynthesizer<'a> {
    pub fn new(db: &'a Database, ai: &'a AIClient) -> Self {
        Self { db, ai }
    }

    /// Assemble the payload for a user and period
    pub fn payload(&self, user_id: &str, period: AuditPeriod) -> Result<Value> {
        let (spreadsheet, processed_uploads) = self.db.spreadsheet_metrics(user_id)?;
        let records = self.db.records_for_period(user_id, period)?;

        if !has_data(processed_uploads, &records) {
            return Err(Error::InvalidData(format!(
                "No processed uploads or records for user {} in {}",
                user_id,
                period.label()
            )));
        }

        Ok(build_payload(period, &spreadsheet, processed_uploads, &records))
    }

    /// Generate and store the audit for a user and period
    ///
    /// Any earlier audit for the same period is replaced. When the model
    /// call fails nothing is stored.
    pub async fn generate(&self, user_id: &str, period: AuditPeriod) -> Result<Audit> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(Error::InvalidData("user_id is required".into()));
        }

        let payload = self.payload(user_id, period)?;
        let previous_summary = self
            .db
            .previous_audit(user_id, period)?
            .map(|a| a.summary)
            .filter(|s| !s.is_empty());

        debug!(
            user_id,
            period = %period,
            backend = self.ai.name(),
            has_previous = previous_summary.is_some(),
            "Requesting audit"
        );

        let request = AuditRequest {
            period,
            payload,
            previous_summary,
        };
        let document = self.ai.generate_audit(&request).await?;

        let id = self
            .db
            .replace_audit(user_id, period, &document, Some(self.ai.model()))?;
        info!(user_id, period = %period, audit_id = id, "Generated audit");

        self.db
            .get_audit(id)?
            .ok_or_else(|| Error::NotFound(format!("Audit {}", id)))
    }

    /// Answer a question using an audit as context
    pub async fn chat(&self, query: &str, audit_context: &Value) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidData("Query is required".into()));
        }
        self.ai.answer_question(query, audit_context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::models::{NewDeal, NewOrder, NewPayment, NewTransaction, NewUpload, UploadAnalysis};
    use chrono::NaiveDate;

    fn march() -> AuditPeriod {
        AuditPeriod::new(3, 2024).unwrap()
    }

    fn seed_upload(db: &Database, user_id: &str, revenue: f64, cost: f64) {
        let id = db
            .create_upload(&NewUpload {
                user_id: user_id.into(),
                filename: "sales.csv".into(),
                storage_path: "k".into(),
                file_type: crate::models::FileType::Csv,
                content_hash: format!("{}-{}", revenue, cost),
                size_bytes: 1,
            })
            .unwrap();
        db.mark_upload_processed(
            id,
            &UploadAnalysis {
                metrics: AggregateMetrics::from_totals(revenue, cost),
                row_count: 1,
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn test_build_payload_totals() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let records = PeriodRecords {
            transactions: vec![
                crate::models::Transaction {
                    id: 1,
                    user_id: "u1".into(),
                    date,
                    description: "Rent".into(),
                    amount: -200.0,
                    category: Some("rent".into()),
                    source: None,
                },
                crate::models::Transaction {
                    id: 2,
                    user_id: "u1".into(),
                    date,
                    description: "Consulting".into(),
                    amount: 50.0,
                    category: None,
                    source: None,
                },
            ],
            orders: vec![
                crate::models::Order {
                    id: 1,
                    user_id: "u1".into(),
                    platform: "shopify".into(),
                    order_ref: "#1".into(),
                    date,
                    total: 150.0,
                    status: "completed".into(),
                },
                crate::models::Order {
                    id: 2,
                    user_id: "u1".into(),
                    platform: "shopify".into(),
                    order_ref: "#2".into(),
                    date,
                    total: 999.0,
                    status: "Cancelled".into(),
                },
            ],
            payments: vec![crate::models::Payment {
                id: 1,
                user_id: "u1".into(),
                provider: "stripe".into(),
                date,
                amount: 150.0,
                fee: 4.5,
                status: "succeeded".into(),
            }],
            deals: vec![],
        };

        let payload = build_payload(
            march(),
            &AggregateMetrics::from_totals(800.0, 300.0),
            1,
            &records,
        );

        assert_eq!(payload["period"], "2024-03");
        assert_eq!(payload["totals"]["revenue"], 1000.0);
        assert_eq!(payload["totals"]["cost"], 504.5);
        assert_eq!(payload["totals"]["profit"], 495.5);
        assert_eq!(payload["orders"]["cancelled"], 1);
        assert_eq!(payload["orders"]["revenue_by_platform"]["shopify"], 150.0);
        assert_eq!(payload["transactions"]["expenses_by_category"]["rent"], 200.0);
        assert_eq!(payload["payments"]["fees"], 4.5);
    }

    #[tokio::test]
    async fn test_generate_replaces_existing_audit() {
        let db = Database::in_memory().unwrap();
        let ai = AIClient::mock();
        seed_upload(&db, "u1", 1000.0, 400.0);

        let synth = AuditSynthesizer::new(&db, &ai);
        let first = synth.generate("u1", march()).await.unwrap();
        let second = synth.generate("u1", march()).await.unwrap();

        assert_ne!(first.id, second.id);
        let audits = db.list_audits(Some("u1")).unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].id, second.id);
        assert_eq!(audits[0].model.as_deref(), Some("mock"));
        assert!(!audits[0].summary.is_empty());
    }

    #[tokio::test]
    async fn test_generate_without_json_stores_nothing() {
        let db = Database::in_memory().unwrap();
        let ai = AIClient::Mock(MockBackend::new().with_audit_response("I cannot help with that."));
        seed_upload(&db, "u1", 100.0, 50.0);

        let result = AuditSynthesizer::new(&db, &ai).generate("u1", march()).await;
        assert!(matches!(result, Err(Error::Ai(_))));
        assert!(db.list_audits(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_failure_keeps_previous_audit() {
        let db = Database::in_memory().unwrap();
        seed_upload(&db, "u1", 100.0, 50.0);

        let ai = AIClient::mock();
        AuditSynthesizer::new(&db, &ai)
            .generate("u1", march())
            .await
            .unwrap();

        let failing = AIClient::Mock(MockBackend::unhealthy());
        assert!(AuditSynthesizer::new(&db, &failing)
            .generate("u1", march())
            .await
            .is_err());
        assert_eq!(db.list_audits(Some("u1")).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_requires_data() {
        let db = Database::in_memory().unwrap();
        let ai = AIClient::mock();
        let result = AuditSynthesizer::new(&db, &ai).generate("nobody", march()).await;
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_generate_uses_period_records() {
        let db = Database::in_memory().unwrap();
        let ai = AIClient::mock();
        let d = |m| NaiveDate::from_ymd_opt(2024, m, 5).unwrap();

        db.add_order(&NewOrder {
            user_id: "u1".into(),
            platform: "etsy".into(),
            order_ref: "A".into(),
            date: d(3),
            total: 400.0,
            status: "completed".into(),
        })
        .unwrap();
        db.add_transaction(&NewTransaction {
            user_id: "u1".into(),
            date: d(4),
            description: "April rent".into(),
            amount: -1000.0,
            category: None,
            source: None,
        })
        .unwrap();
        db.add_payment(&NewPayment {
            user_id: "u1".into(),
            provider: "stripe".into(),
            date: d(3),
            amount: 400.0,
            fee: 12.0,
            status: "succeeded".into(),
        })
        .unwrap();
        db.add_deal(&NewDeal {
            user_id: "u1".into(),
            name: "Retainer".into(),
            stage: "negotiation".into(),
            value: 3000.0,
            close_date: None,
        })
        .unwrap();

        let synth = AuditSynthesizer::new(&db, &ai);
        let payload = synth.payload("u1", march()).unwrap();
        assert_eq!(payload["totals"]["revenue"], 400.0);
        assert_eq!(payload["totals"]["cost"], 12.0);
        assert_eq!(payload["deals"]["open_pipeline_value"], 3000.0);

        let audit = synth.generate("u1", march()).await.unwrap();
        assert_eq!(audit.month, 3);
        assert_eq!(audit.year, 2024);
        assert_eq!(audit.monthly_metrics["profit"], 388.0);
    }

    #[tokio::test]
    async fn test_chat() {
        let db = Database::in_memory().unwrap();
        let ai = AIClient::mock();
        let synth = AuditSynthesizer::new(&db, &ai);

        let answer = synth
            .chat("Why did margins drop?", &json!({"summary": "Margins fell 4%"}))
            .await
            .unwrap();
        assert!(answer.contains("Margins fell 4%"));

        assert!(matches!(
            synth.chat("   ", &Value::Null).await,
            Err(Error::InvalidData(_))
        ));
    }
}
