//! Record stores: transactions, orders, payments and CRM deals
//!
//! Listing takes an optional period; `None` returns everything for the user.

use rusqlite::params;

use super::{format_date, parse_date, Database};
use crate::error::Result;
use crate::models::{
    AuditPeriod, Deal, NewDeal, NewOrder, NewPayment, NewTransaction, Order, Payment,
    PeriodRecords, Transaction,
};

/// Date bounds for a query: [start, end) as stored strings
fn bounds(period: Option<AuditPeriod>) -> (Option<String>, Option<String>) {
    match period {
        Some(p) => (Some(format_date(&p.start())), Some(format_date(&p.end()))),
        None => (None, None),
    }
}

impl Database {
    // ========================================================================
    // Transactions
    // ========================================================================

    pub fn add_transaction(&self, tx: &NewTransaction) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO transactions (user_id, date, description, amount, category, source)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                tx.user_id,
                format_date(&tx.date),
                tx.description,
                tx.amount,
                tx.category,
                tx.source,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_transactions(
        &self,
        user_id: &str,
        period: Option<AuditPeriod>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let (start, end) = bounds(period);
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, date, description, amount, category, source
            FROM transactions
            WHERE user_id = ?1
              AND (?2 IS NULL OR date >= ?2)
              AND (?3 IS NULL OR date < ?3)
            ORDER BY date DESC, id DESC
            "#,
        )?;

        let transactions = stmt
            .query_map(params![user_id, start, end], |row| {
                let date_str: String = row.get(2)?;
                Ok(Transaction {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    date: parse_date(&date_str),
                    description: row.get(3)?,
                    amount: row.get(4)?,
                    category: row.get(5)?,
                    source: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    // ========================================================================
    // Orders
    // ========================================================================

    pub fn add_order(&self, order: &NewOrder) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO orders (user_id, platform, order_ref, date, total, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                order.user_id,
                order.platform,
                order.order_ref,
                format_date(&order.date),
                order.total,
                order.status,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_orders(&self, user_id: &str, period: Option<AuditPeriod>) -> Result<Vec<Order>> {
        let conn = self.conn()?;
        let (start, end) = bounds(period);
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, platform, order_ref, date, total, status
            FROM orders
            WHERE user_id = ?1
              AND (?2 IS NULL OR date >= ?2)
              AND (?3 IS NULL OR date < ?3)
            ORDER BY date DESC, id DESC
            "#,
        )?;

        let orders = stmt
            .query_map(params![user_id, start, end], |row| {
                let date_str: String = row.get(4)?;
                Ok(Order {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    platform: row.get(2)?,
                    order_ref: row.get(3)?,
                    date: parse_date(&date_str),
                    total: row.get(5)?,
                    status: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    // ========================================================================
    // Payments
    // ========================================================================

    pub fn add_payment(&self, payment: &NewPayment) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO payments (user_id, provider, date, amount, fee, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                payment.user_id,
                payment.provider,
                format_date(&payment.date),
                payment.amount,
                payment.fee,
                payment.status,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_payments(
        &self,
        user_id: &str,
        period: Option<AuditPeriod>,
    ) -> Result<Vec<Payment>> {
        let conn = self.conn()?;
        let (start, end) = bounds(period);
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, provider, date, amount, fee, status
            FROM payments
            WHERE user_id = ?1
              AND (?2 IS NULL OR date >= ?2)
              AND (?3 IS NULL OR date < ?3)
            ORDER BY date DESC, id DESC
            "#,
        )?;

        let payments = stmt
            .query_map(params![user_id, start, end], |row| {
                let date_str: String = row.get(3)?;
                Ok(Payment {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    provider: row.get(2)?,
                    date: parse_date(&date_str),
                    amount: row.get(4)?,
                    fee: row.get(5)?,
                    status: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(payments)
    }

    // ========================================================================
    // Deals
    // ========================================================================

    pub fn add_deal(&self, deal: &NewDeal) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO deals (user_id, name, stage, value, close_date)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                deal.user_id,
                deal.name,
                deal.stage,
                deal.value,
                deal.close_date.as_ref().map(format_date),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// List deals. With a period, returns deals closing in it plus deals with no close date.
    pub fn list_deals(&self, user_id: &str, period: Option<AuditPeriod>) -> Result<Vec<Deal>> {
        let conn = self.conn()?;
        let (start, end) = bounds(period);
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, name, stage, value, close_date
            FROM deals
            WHERE user_id = ?1
              AND (?2 IS NULL OR close_date IS NULL OR (close_date >= ?2 AND close_date < ?3))
            ORDER BY close_date IS NULL, close_date DESC, id DESC
            "#,
        )?;

        let deals = stmt
            .query_map(params![user_id, start, end], |row| {
                let close_date_str: Option<String> = row.get(5)?;
                Ok(Deal {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    stage: row.get(3)?,
                    value: row.get(4)?,
                    close_date: close_date_str.map(|s| parse_date(&s)),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(deals)
    }

    /// Everything the record stores hold for a user in a period
    pub fn records_for_period(&self, user_id: &str, period: AuditPeriod) -> Result<PeriodRecords> {
        Ok(PeriodRecords {
            transactions: self.list_transactions(user_id, Some(period))?,
            orders: self.list_orders(user_id, Some(period))?,
            payments: self.list_payments(user_id, Some(period))?,
            deals: self.list_deals(user_id, Some(period))?,
        })
    }
}
