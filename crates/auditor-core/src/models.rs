//! Domain models for the profit auditor

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Uploads
// ============================================================================

/// Spreadsheet formats accepted by the upload intake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Xlsx,
    Xls,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
        }
    }

    /// Guess the file type from a filename extension
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = filename.rsplit_once('.')?.1;
        ext.parse().ok()
    }
}

impl std::str::FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "csv" | "text/csv" => Ok(Self::Csv),
            "xlsx" | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Ok(Self::Xlsx)
            }
            "xls" | "application/vnd.ms-excel" => Ok(Self::Xls),
            _ => Err(format!("Unknown file type: {}", s)),
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored spreadsheet upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    pub id: i64,
    pub user_id: String,
    pub filename: String,
    /// Key of the raw file in blob storage
    pub storage_path: String,
    /// Type declared by the client (or guessed from the filename)
    pub file_type: FileType,
    pub content_hash: String,
    pub size_bytes: i64,
    pub row_count: Option<i64>,
    pub processed: bool,
    pub error: Option<String>,
    pub analysis: Option<UploadAnalysis>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Data needed to create an upload record
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub user_id: String,
    pub filename: String,
    pub storage_path: String,
    pub file_type: FileType,
    pub content_hash: String,
    pub size_bytes: i64,
}

// ============================================================================
// Classification and aggregation
// ============================================================================

/// Semantic role of a spreadsheet column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Units,
    SalePrice,
    CostPrice,
    Revenue,
    Cost,
    Date,
    Product,
    Other,
}

impl ColumnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Units => "units",
            Self::SalePrice => "sale_price",
            Self::CostPrice => "cost_price",
            Self::Revenue => "revenue",
            Self::Cost => "cost",
            Self::Date => "date",
            Self::Product => "product",
            Self::Other => "other",
        }
    }

    /// Every role, in declaration order
    pub fn all() -> &'static [ColumnRole] {
        &[
            Self::Units,
            Self::SalePrice,
            Self::CostPrice,
            Self::Revenue,
            Self::Cost,
            Self::Date,
            Self::Product,
            Self::Other,
        ]
    }

    /// Whether cells in this column are summed as numbers
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Units | Self::SalePrice | Self::CostPrice | Self::Revenue | Self::Cost
        )
    }
}

impl std::str::FromStr for ColumnRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "units" => Ok(Self::Units),
            "sale_price" => Ok(Self::SalePrice),
            "cost_price" => Ok(Self::CostPrice),
            "revenue" => Ok(Self::Revenue),
            "cost" => Ok(Self::Cost),
            "date" => Ok(Self::Date),
            "product" => Ok(Self::Product),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown column role: {}", s)),
        }
    }
}

impl std::fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A header paired with the role it was classified as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnClassification {
    pub header: String,
    pub role: ColumnRole,
}

/// Totals derived from a spreadsheet (or a set of them)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_revenue: f64,
    pub total_cost: f64,
    pub total_profit: f64,
    /// Profit as a percentage of revenue (0 when revenue is 0)
    pub profit_margin: f64,
    /// Cost as a percentage of revenue (0 when revenue is 0)
    pub expense_ratio: f64,
    #[serde(default)]
    pub total_units: f64,
    #[serde(default)]
    pub rows_processed: i64,
}

impl AggregateMetrics {
    /// Build metrics from revenue and cost totals, deriving profit and ratios
    pub fn from_totals(total_revenue: f64, total_cost: f64) -> Self {
        let total_profit = total_revenue - total_cost;
        let (profit_margin, expense_ratio) = if total_revenue == 0.0 {
            (0.0, 0.0)
        } else {
            (
                total_profit / total_revenue * 100.0,
                total_cost / total_revenue * 100.0,
            )
        };

        Self {
            total_revenue,
            total_cost,
            total_profit,
            profit_margin,
            expense_ratio,
            total_units: 0.0,
            rows_processed: 0,
        }
    }

    /// Combine two sets of metrics, recomputing the ratios from the summed totals
    pub fn merge(&self, other: &AggregateMetrics) -> Self {
        let mut merged = Self::from_totals(
            self.total_revenue + other.total_revenue,
            self.total_cost + other.total_cost,
        );
        merged.total_units = self.total_units + other.total_units;
        merged.rows_processed = self.rows_processed + other.rows_processed;
        merged
    }
}

/// Result of processing an upload, stored as JSON on the upload record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadAnalysis {
    pub columns: Vec<ColumnClassification>,
    pub metrics: AggregateMetrics,
    pub row_count: i64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

// ============================================================================
// Audits
// ============================================================================

/// Month/year an audit covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPeriod {
    pub month: u32,
    pub year: i32,
}

impl AuditPeriod {
    pub fn new(month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidData(format!(
                "Month must be between 1 and 12, got {}",
                month
            )));
        }
        if !(1900..=9999).contains(&year) {
            return Err(Error::InvalidData(format!("Invalid year: {}", year)));
        }
        Ok(Self { month, year })
    }

    /// The period containing today (UTC)
    pub fn current() -> Self {
        let today = Utc::now().date_naive();
        Self {
            month: today.month(),
            year: today.year(),
        }
    }

    /// First day of the period
    pub fn start(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// First day of the following period (exclusive end)
    pub fn end(&self) -> NaiveDate {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default()
    }

    /// Human-readable label, e.g. "March 2024"
    pub fn label(&self) -> String {
        format!("{}", self.start().format("%B %Y"))
    }
}

impl std::fmt::Display for AuditPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// The audit document returned by the language model
///
/// The model's JSON is kept verbatim in `raw`; the other fields are a
/// lenient view over it and default to empty when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditDocument {
    pub summary: String,
    pub kpis: Vec<Value>,
    pub recommendations: Vec<Value>,
    pub monthly_metrics: Value,
    pub alerts: Vec<Value>,
    pub raw: Value,
}

impl AuditDocument {
    /// Build a document from a parsed model response
    ///
    /// Fails only when the value is not a JSON object.
    pub fn from_value(raw: Value) -> Result<Self> {
        let obj = raw.as_object().ok_or_else(|| {
            Error::InvalidData("Audit response must be a JSON object".to_string())
        })?;

        let field = |snake: &str, camel: &str| obj.get(snake).or_else(|| obj.get(camel)).cloned();
        let list = |value: Option<Value>| match value {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other],
        };

        let summary = match field("summary", "summary") {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        Ok(Self {
            summary,
            kpis: list(field("kpis", "KPIs")),
            recommendations: list(field("recommendations", "recommendations")),
            monthly_metrics: field("monthly_metrics", "monthlyMetrics").unwrap_or(Value::Null),
            alerts: list(field("alerts", "alerts")),
            raw,
        })
    }
}

/// A persisted audit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
    pub id: i64,
    pub user_id: String,
    pub month: u32,
    pub year: i32,
    pub summary: String,
    pub kpis: Vec<Value>,
    pub recommendations: Vec<Value>,
    pub monthly_metrics: Value,
    pub alerts: Vec<Value>,
    /// The model's response exactly as returned
    pub document: Value,
    /// Model that produced the audit
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Audit {
    pub fn period(&self) -> AuditPeriod {
        AuditPeriod {
            month: self.month,
            year: self.year,
        }
    }
}

// ============================================================================
// Integrations
// ============================================================================

/// Kind of third-party platform an integration connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationCategory {
    Accounting,
    Ecommerce,
    Marketplace,
    Payment,
    Crm,
}

impl IntegrationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accounting => "accounting",
            Self::Ecommerce => "ecommerce",
            Self::Marketplace => "marketplace",
            Self::Payment => "payment",
            Self::Crm => "crm",
        }
    }
}

impl std::str::FromStr for IntegrationCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accounting" => Ok(Self::Accounting),
            "ecommerce" | "e-commerce" => Ok(Self::Ecommerce),
            "marketplace" => Ok(Self::Marketplace),
            "payment" | "payments" => Ok(Self::Payment),
            "crm" => Ok(Self::Crm),
            _ => Err(format!("Unknown integration category: {}", s)),
        }
    }
}

impl std::fmt::Display for IntegrationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection state of an integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    #[default]
    Connected,
    Error,
    Disconnected,
}

impl IntegrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Disconnected => "disconnected",
        }
    }
}

impl std::str::FromStr for IntegrationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "connected" => Ok(Self::Connected),
            "error" => Ok(Self::Error),
            "disconnected" => Ok(Self::Disconnected),
            _ => Err(format!("Unknown integration status: {}", s)),
        }
    }
}

impl std::fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored third-party connection
///
/// Credentials are never serialized back to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: i64,
    pub user_id: String,
    pub platform: String,
    pub category: IntegrationCategory,
    #[serde(skip_serializing, default)]
    pub credentials: Value,
    pub status: IntegrationStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Data needed to create an integration
#[derive(Debug, Clone, Deserialize)]
pub struct NewIntegration {
    pub user_id: String,
    pub platform: String,
    pub category: IntegrationCategory,
    #[serde(default)]
    pub credentials: Value,
}

// ============================================================================
// Record stores
// ============================================================================

/// A bookkeeping transaction (accounting integrations or manual entry)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: String,
    pub date: NaiveDate,
    pub description: String,
    /// Positive = income, negative = expense
    pub amount: f64,
    pub category: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: String,
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// An e-commerce or marketplace order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: String,
    pub platform: String,
    pub order_ref: String,
    pub date: NaiveDate,
    pub total: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: String,
    pub platform: String,
    pub order_ref: String,
    pub date: NaiveDate,
    pub total: f64,
    #[serde(default = "default_order_status")]
    pub status: String,
}

fn default_order_status() -> String {
    "completed".to_string()
}

/// A payment processor charge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub user_id: String,
    pub provider: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub fee: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub user_id: String,
    pub provider: String,
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default)]
    pub fee: f64,
    #[serde(default = "default_payment_status")]
    pub status: String,
}

fn default_payment_status() -> String {
    "succeeded".to_string()
}

/// A CRM pipeline deal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub stage: String,
    pub value: f64,
    pub close_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeal {
    pub user_id: String,
    pub name: String,
    pub stage: String,
    pub value: f64,
    #[serde(default)]
    pub close_date: Option<NaiveDate>,
}

/// Everything the record stores hold for a user in one period
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeriodRecords {
    pub transactions: Vec<Transaction>,
    pub orders: Vec<Order>,
    pub payments: Vec<Payment>,
    pub deals: Vec<Deal>,
}

// ============================================================================
// Dashboard
// ============================================================================

/// Headline numbers for a user's dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub user_id: String,
    pub processed_uploads: i64,
    /// Totals across all processed uploads
    pub spreadsheet: AggregateMetrics,
    pub transaction_income: f64,
    pub transaction_expenses: f64,
    pub order_revenue: f64,
    pub payment_volume: f64,
    pub payment_fees: f64,
    pub open_pipeline_value: f64,
    pub integrations: i64,
    pub latest_audit_id: Option<i64>,
}
