//! Integration (platform connection) commands

use anyhow::{anyhow, bail, Result};
use auditor_core::db::Database;
use auditor_core::models::{IntegrationCategory, IntegrationStatus, NewIntegration};

pub fn cmd_integrations_list(db: &Database, user_id: Option<&str>) -> Result<()> {
    let integrations = db.list_integrations(user_id)?;

    if integrations.is_empty() {
        println!("No integrations connected.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<20} {:<15} {:<12} {:<13} {}",
        "ID", "BUSINESS", "PLATFORM", "CATEGORY", "STATUS", "LAST SYNC"
    );
    println!("{}", "-".repeat(90));

    for i in &integrations {
        let status_icon = match i.status {
            IntegrationStatus::Connected => "🟢",
            IntegrationStatus::Error => "🔴",
            IntegrationStatus::Disconnected => "⚪",
        };
        println!(
            "{:>5}  {:<20} {:<15} {:<12} {} {:<10} {}",
            i.id,
            super::truncate(&i.user_id, 20),
            super::truncate(&i.platform, 15),
            i.category.as_str(),
            status_icon,
            i.status.as_str(),
            i.last_synced_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    Ok(())
}

pub fn cmd_integrations_add(
    db: &Database,
    user_id: &str,
    platform: &str,
    category: &str,
) -> Result<i64> {
    let category: IntegrationCategory = category.parse().map_err(|e: String| anyhow!(e))?;
    if platform.trim().is_empty() {
        bail!("Platform is required");
    }

    let id = db.create_integration(&NewIntegration {
        user_id: user_id.to_string(),
        platform: platform.trim().to_lowercase(),
        category,
        credentials: serde_json::Value::Null,
    })?;

    db.log_activity(
        "cli",
        "create",
        Some("integration"),
        Some(id),
        Some(&format!(
            "user_id={}, platform={}, category={}",
            user_id, platform, category
        )),
    )?;

    println!("✅ Connected {} ({}) for {} as #{}", platform, category, user_id, id);
    Ok(id)
}

pub fn cmd_integrations_status(db: &Database, id: i64, status: &str) -> Result<()> {
    let status: IntegrationStatus = status.parse().map_err(|e: String| anyhow!(e))?;

    if !db.update_integration_status(id, status)? {
        bail!("Integration {} not found", id);
    }

    db.log_activity(
        "cli",
        "update_status",
        Some("integration"),
        Some(id),
        Some(&format!("status={}", status)),
    )?;

    println!("✅ Integration #{} is now {}", id, status);
    Ok(())
}

pub fn cmd_integrations_delete(db: &Database, id: i64) -> Result<()> {
    if !db.delete_integration(id)? {
        bail!("Integration {} not found", id);
    }

    db.log_activity("cli", "delete", Some("integration"), Some(id), None)?;

    println!("🗑️  Removed integration #{}", id);
    Ok(())
}
