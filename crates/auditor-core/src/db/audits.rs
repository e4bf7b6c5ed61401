//! Audit persistence

use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;
use tracing::debug;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{Audit, AuditDocument, AuditPeriod};

const AUDIT_COLUMNS: &str = "id, user_id, month, year, summary, kpis, recommendations, \
     monthly_metrics, alerts, document, model, created_at";

fn json_list(s: &str) -> Vec<Value> {
    serde_json::from_str(s).unwrap_or_default()
}

fn row_to_audit(row: &Row) -> rusqlite::Result<Audit> {
    let kpis: String = row.get(5)?;
    let recommendations: String = row.get(6)?;
    let monthly_metrics: String = row.get(7)?;
    let alerts: String = row.get(8)?;
    let document: String = row.get(9)?;
    let created_at_str: String = row.get(11)?;

    Ok(Audit {
        id: row.get(0)?,
        user_id: row.get(1)?,
        month: row.get(2)?,
        year: row.get(3)?,
        summary: row.get(4)?,
        kpis: json_list(&kpis),
        recommendations: json_list(&recommendations),
        monthly_metrics: serde_json::from_str(&monthly_metrics).unwrap_or(Value::Null),
        alerts: json_list(&alerts),
        document: serde_json::from_str(&document).unwrap_or(Value::Null),
        model: row.get(10)?,
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Store an audit, replacing any earlier audit for the same user and period
    pub fn replace_audit(
        &self,
        user_id: &str,
        period: AuditPeriod,
        document: &AuditDocument,
        model: Option<&str>,
    ) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let replaced = tx.execute(
            "DELETE FROM audits WHERE user_id = ? AND month = ? AND year = ?",
            params![user_id, period.month, period.year],
        )?;

        tx.execute(
            r#"
            INSERT INTO audits (user_id, month, year, summary, kpis, recommendations,
                                monthly_metrics, alerts, document, model)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                period.month,
                period.year,
                document.summary,
                serde_json::to_string(&document.kpis)?,
                serde_json::to_string(&document.recommendations)?,
                serde_json::to_string(&document.monthly_metrics)?,
                serde_json::to_string(&document.alerts)?,
                serde_json::to_string(&document.raw)?,
                model,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(user_id, period = %period, replaced, id, "Stored audit");
        Ok(id)
    }

    pub fn get_audit(&self, id: i64) -> Result<Option<Audit>> {
        let conn = self.conn()?;
        let audit = conn
            .query_row(
                &format!("SELECT {} FROM audits WHERE id = ?", AUDIT_COLUMNS),
                params![id],
                row_to_audit,
            )
            .optional()?;
        Ok(audit)
    }

    /// List audits, most recent period first
    pub fn list_audits(&self, user_id: Option<&str>) -> Result<Vec<Audit>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM audits
            WHERE (?1 IS NULL OR user_id = ?1)
            ORDER BY year DESC, month DESC, created_at DESC, id DESC
            "#,
            AUDIT_COLUMNS
        ))?;

        let audits = stmt
            .query_map(params![user_id], row_to_audit)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(audits)
    }

    /// Most recent audit for a user
    pub fn latest_audit(&self, user_id: &str) -> Result<Option<Audit>> {
        Ok(self.list_audits(Some(user_id))?.into_iter().next())
    }

    /// Most recent audit for a period strictly before `period`
    pub fn previous_audit(&self, user_id: &str, period: AuditPeriod) -> Result<Option<Audit>> {
        let conn = self.conn()?;
        let audit = conn
            .query_row(
                &format!(
                    r#"
                    SELECT {} FROM audits
                    WHERE user_id = ?1 AND (year < ?2 OR (year = ?2 AND month < ?3))
                    ORDER BY year DESC, month DESC, id DESC
                    LIMIT 1
                    "#,
                    AUDIT_COLUMNS
                ),
                params![user_id, period.year, period.month],
                row_to_audit,
            )
            .optional()?;
        Ok(audit)
    }

    /// Delete all audits for a user, returning how many were removed
    pub fn delete_audits_for_user(&self, user_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM audits WHERE user_id = ?", params![user_id])?;
        Ok(deleted)
    }
}
