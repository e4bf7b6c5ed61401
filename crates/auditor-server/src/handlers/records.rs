//! Record store handlers: transactions, orders, payments and deals
//!
//! Listing requires `user_id`; `month` and `year` together narrow it to a period.

use std::sync::Arc;

use axum::{
    extract::State,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{ApiJson, ApiQuery, AppError, AppState};
use auditor_core::models::{
    AuditPeriod, Deal, NewDeal, NewOrder, NewPayment, NewTransaction, Order, Payment, Transaction,
};

/// Query parameters shared by the record listings
#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    pub user_id: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl RecordsQuery {
    fn user_id(&self) -> Result<&str, AppError> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::bad_request("user_id is required"))
    }

    fn period(&self) -> Result<Option<AuditPeriod>, AppError> {
        match (self.month, self.year) {
            (Some(month), Some(year)) => AuditPeriod::new(month, year)
                .map(Some)
                .map_err(AppError::from_core),
            (None, None) => Ok(None),
            _ => Err(AppError::bad_request("month and year must be given together")),
        }
    }
}

/// Response for record creation
#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

fn require_user(user_id: &str) -> Result<(), AppError> {
    if user_id.trim().is_empty() {
        return Err(AppError::bad_request("user_id is required"));
    }
    Ok(())
}

/// GET /api/transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<RecordsQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions = state
        .db
        .list_transactions(params.user_id()?, params.period()?)?;
    Ok(Json(transactions))
}

/// POST /api/transactions
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<NewTransaction>,
) -> Result<Json<CreatedResponse>, AppError> {
    require_user(&body.user_id)?;
    let id = state.db.add_transaction(&body)?;
    Ok(Json(CreatedResponse { id }))
}

/// GET /api/orders
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<RecordsQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = state.db.list_orders(params.user_id()?, params.period()?)?;
    Ok(Json(orders))
}

/// POST /api/orders
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<NewOrder>,
) -> Result<Json<CreatedResponse>, AppError> {
    require_user(&body.user_id)?;
    let id = state.db.add_order(&body)?;
    Ok(Json(CreatedResponse { id }))
}

/// GET /api/payments
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<RecordsQuery>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let payments = state
        .db
        .list_payments(params.user_id()?, params.period()?)?;
    Ok(Json(payments))
}

/// POST /api/payments
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<NewPayment>,
) -> Result<Json<CreatedResponse>, AppError> {
    require_user(&body.user_id)?;
    let id = state.db.add_payment(&body)?;
    Ok(Json(CreatedResponse { id }))
}

/// GET /api/deals
pub async fn list_deals(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<RecordsQuery>,
) -> Result<Json<Vec<Deal>>, AppError> {
    let deals = state.db.list_deals(params.user_id()?, params.period()?)?;
    Ok(Json(deals))
}

/// POST /api/deals
pub async fn create_deal(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<NewDeal>,
) -> Result<Json<CreatedResponse>, AppError> {
    require_user(&body.user_id)?;
    let id = state.db.add_deal(&body)?;
    Ok(Json(CreatedResponse { id }))
}
