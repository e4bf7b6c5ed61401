//! Dashboard numbers across all stores

use rusqlite::params;

use super::Database;
use crate::error::Result;
use crate::models::DashboardMetrics;

/// Deal stages that no longer count toward the open pipeline
const CLOSED_STAGES: &str = "'won', 'lost', 'closed', 'closed_won', 'closed_lost'";

impl Database {
    /// Headline numbers for a user's dashboard
    pub fn dashboard_metrics(&self, user_id: &str) -> Result<DashboardMetrics> {
        let (spreadsheet, processed_uploads) = self.spreadsheet_metrics(user_id)?;
        let conn = self.conn()?;

        let (transaction_income, transaction_expenses): (f64, f64) = conn.query_row(
            r#"
            SELECT COALESCE(SUM(CASE WHEN amount > 0 THEN amount ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN amount < 0 THEN -amount ELSE 0 END), 0)
            FROM transactions WHERE user_id = ?
            "#,
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let order_revenue: f64 = conn.query_row(
            "SELECT COALESCE(SUM(total), 0) FROM orders WHERE user_id = ? AND LOWER(status) != 'cancelled'",
            params![user_id],
            |row| row.get(0),
        )?;

        let (payment_volume, payment_fees): (f64, f64) = conn.query_row(
            r#"
            SELECT COALESCE(SUM(amount), 0), COALESCE(SUM(fee), 0)
            FROM payments WHERE user_id = ? AND LOWER(status) = 'succeeded'
            "#,
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let open_pipeline_value: f64 = conn.query_row(
            &format!(
                "SELECT COALESCE(SUM(value), 0) FROM deals WHERE user_id = ? AND LOWER(stage) NOT IN ({})",
                CLOSED_STAGES
            ),
            params![user_id],
            |row| row.get(0),
        )?;

        let integrations: i64 = conn.query_row(
            "SELECT COUNT(*) FROM integrations WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;

        drop(conn);
        let latest_audit_id = self.latest_audit(user_id)?.map(|a| a.id);

        Ok(DashboardMetrics {
            user_id: user_id.to_string(),
            processed_uploads,
            spreadsheet,
            transaction_income,
            transaction_expenses,
            order_revenue,
            payment_volume,
            payment_fees,
            open_pipeline_value,
            integrations,
            latest_audit_id,
        })
    }
}
