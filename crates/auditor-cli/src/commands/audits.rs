//! Audit commands: generate, list, show, delete, chat

use anyhow::{Context, Result};
use auditor_core::ai::{AIBackend, AIClient};
use auditor_core::db::Database;
use auditor_core::models::{Audit, AuditPeriod};
use auditor_core::synthesizer::{build_payload, AuditSynthesizer};
use serde_json::Value;

use super::truncate;

/// Print the payload an audit would send, without calling the model
pub fn cmd_audit_payload(db: &Database, user_id: &str, period: AuditPeriod) -> Result<Value> {
    let (spreadsheet, processed_uploads) = db.spreadsheet_metrics(user_id)?;
    let records = db.records_for_period(user_id, period)?;
    let payload = build_payload(period, &spreadsheet, processed_uploads, &records);

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(payload)
}

/// Generate (or regenerate) a business's audit for one month
pub async fn cmd_audit(
    db: &Database,
    ai: &AIClient,
    user_id: &str,
    period: AuditPeriod,
) -> Result<i64> {
    println!(
        "🔍 Generating {} audit for {}...",
        period.label(),
        user_id
    );
    println!("   🤖 {} (model: {})", ai.name(), ai.model());

    let audit = AuditSynthesizer::new(db, ai)
        .generate(user_id, period)
        .await
        .context("Audit generation failed")?;

    db.log_activity(
        "cli",
        "generate",
        Some("audit"),
        Some(audit.id),
        Some(&format!("user_id={}, period={}", user_id, period)),
    )?;

    print_audit(&audit);
    println!();
    println!("✅ Audit #{} saved", audit.id);

    Ok(audit.id)
}

/// List stored audits
pub fn cmd_audits_list(db: &Database, user_id: Option<&str>) -> Result<()> {
    let audits = db.list_audits(user_id)?;

    if audits.is_empty() {
        println!("No audits yet. Run 'auditor audit --user <id>' to generate one.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<20} {:<8} {:<50}",
        "ID", "BUSINESS", "PERIOD", "SUMMARY"
    );
    println!("{}", "-".repeat(86));

    for audit in &audits {
        println!(
            "{:>5}  {:<20} {:<8} {:<50}",
            audit.id,
            truncate(&audit.user_id, 20),
            audit.period().to_string(),
            truncate(&audit.summary, 50)
        );
    }

    println!();
    println!("{} audit(s)", audits.len());
    Ok(())
}

/// Show one audit, as a readable report or the stored JSON document
pub fn cmd_audits_show(db: &Database, id: i64, json: bool) -> Result<()> {
    let audit = db
        .get_audit(id)?
        .with_context(|| format!("Audit {} not found", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&audit.document)?);
    } else {
        print_audit(&audit);
    }
    Ok(())
}

/// Delete every audit for a business
pub fn cmd_audits_delete(db: &Database, user_id: &str) -> Result<usize> {
    let deleted = db.delete_audits_for_user(user_id)?;

    db.log_activity(
        "cli",
        "delete",
        Some("audit"),
        None,
        Some(&format!("user_id={}, deleted={}", user_id, deleted)),
    )?;

    println!("🗑️  Deleted {} audit(s) for {}", deleted, user_id);
    Ok(deleted)
}

/// Ask a question with a stored audit as context
pub async fn cmd_chat(db: &Database, ai: &AIClient, audit_id: i64, query: &str) -> Result<String> {
    let audit = db
        .get_audit(audit_id)?
        .with_context(|| format!("Audit {} not found", audit_id))?;

    let answer = AuditSynthesizer::new(db, ai)
        .chat(query, &audit.document)
        .await?;

    println!("{}", answer);
    Ok(answer)
}

fn print_audit(audit: &Audit) {
    println!();
    println!(
        "📊 {} audit for {}",
        audit.period().label(),
        audit.user_id
    );
    println!("   ─────────────────────────────");
    println!("   {}", audit.summary);

    if !audit.kpis.is_empty() {
        println!();
        println!("   KPIs:");
        for kpi in &audit.kpis {
            println!(
                "   • {}: {}",
                text(kpi, "name"),
                text(kpi, "value")
            );
        }
    }

    if !audit.alerts.is_empty() {
        println!();
        for alert in &audit.alerts {
            println!(
                "   ⚠️  [{}] {}",
                text(alert, "severity"),
                text(alert, "message")
            );
        }
    }

    if !audit.recommendations.is_empty() {
        println!();
        println!("   Recommendations:");
        for (i, rec) in audit.recommendations.iter().enumerate() {
            println!("   {}. {}", i + 1, text(rec, "title"));
            let detail = text(rec, "detail");
            if !detail.is_empty() {
                println!("      {}", detail);
            }
        }
    }
}

/// A field of a model-produced object; plain strings are used as the title
fn text(value: &Value, key: &str) -> String {
    match (value.get(key), value) {
        (Some(Value::String(s)), _) => s.clone(),
        (Some(Value::Null), _) | (None, Value::Object(_)) => String::new(),
        (Some(other), _) => other.to_string(),
        (None, Value::String(s)) if key == "title" || key == "name" => s.clone(),
        (None, _) => String::new(),
    }
}
