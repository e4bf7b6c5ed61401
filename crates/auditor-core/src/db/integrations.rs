//! Integration (third-party connection) operations

use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{Integration, IntegrationCategory, IntegrationStatus, NewIntegration};

const INTEGRATION_COLUMNS: &str =
    "id, user_id, platform, category, credentials, status, last_synced_at, created_at";

fn row_to_integration(row: &Row) -> rusqlite::Result<Integration> {
    let category_str: String = row.get(3)?;
    let credentials_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let last_synced_str: Option<String> = row.get(6)?;
    let created_at_str: String = row.get(7)?;

    Ok(Integration {
        id: row.get(0)?,
        user_id: row.get(1)?,
        platform: row.get(2)?,
        category: category_str
            .parse()
            .unwrap_or(IntegrationCategory::Accounting),
        credentials: serde_json::from_str(&credentials_str).unwrap_or(Value::Null),
        status: status_str.parse().unwrap_or_default(),
        last_synced_at: last_synced_str.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    pub fn create_integration(&self, integration: &NewIntegration) -> Result<i64> {
        let conn = self.conn()?;
        let credentials = if integration.credentials.is_null() {
            "{}".to_string()
        } else {
            serde_json::to_string(&integration.credentials)?
        };

        conn.execute(
            r#"
            INSERT INTO integrations (user_id, platform, category, credentials, status)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                integration.user_id,
                integration.platform,
                integration.category.as_str(),
                credentials,
                IntegrationStatus::Connected.as_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_integration(&self, id: i64) -> Result<Option<Integration>> {
        let conn = self.conn()?;
        let integration = conn
            .query_row(
                &format!("SELECT {} FROM integrations WHERE id = ?", INTEGRATION_COLUMNS),
                params![id],
                row_to_integration,
            )
            .optional()?;
        Ok(integration)
    }

    pub fn list_integrations(&self, user_id: Option<&str>) -> Result<Vec<Integration>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM integrations WHERE (?1 IS NULL OR user_id = ?1) ORDER BY category, platform",
            INTEGRATION_COLUMNS
        ))?;

        let integrations = stmt
            .query_map(params![user_id], row_to_integration)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(integrations)
    }

    /// Update connection status. A move to `connected` also stamps `last_synced_at`.
    pub fn update_integration_status(&self, id: i64, status: IntegrationStatus) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE integrations
            SET status = ?1,
                last_synced_at = CASE WHEN ?1 = 'connected' THEN CURRENT_TIMESTAMP ELSE last_synced_at END
            WHERE id = ?2
            "#,
            params![status.as_str(), id],
        )?;
        Ok(updated > 0)
    }

    pub fn delete_integration(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM integrations WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }
}
