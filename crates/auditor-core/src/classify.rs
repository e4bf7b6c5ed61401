//! Header-based column classification
//!
//! Each header is lower-cased (with `_` and `-` treated as spaces) and tested
//! against an ordered keyword table. The first group with a substring hit
//! decides the role; headers matching nothing are `Other`.

use crate::models::{ColumnClassification, ColumnRole};

/// Ordered keyword groups. Earlier groups win, so the more specific price
/// columns are checked before the generic "cost" and "sales" keywords.
const KEYWORD_GROUPS: &[(ColumnRole, &[&str])] = &[
    (
        ColumnRole::CostPrice,
        &[
            "cost price",
            "unit cost",
            "cost per unit",
            "purchase price",
            "buy price",
        ],
    ),
    (
        ColumnRole::SalePrice,
        &[
            "sale price",
            "selling price",
            "sales price",
            "unit price",
            "retail price",
            "price",
        ],
    ),
    (ColumnRole::Units, &["units", "quantity", "qty", "unit count"]),
    (
        ColumnRole::Revenue,
        &["revenue", "sales", "income", "turnover"],
    ),
    (ColumnRole::Cost, &["cost", "expense", "cogs", "spend"]),
    (ColumnRole::Date, &["date", "month", "period", "day", "year"]),
    (
        ColumnRole::Product,
        &["product", "item", "sku", "description"],
    ),
];

/// Normalize a header for keyword matching
fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classify a single header
pub fn classify_header(header: &str) -> ColumnRole {
    let normalized = normalize_header(header);
    if normalized.is_empty() {
        return ColumnRole::Other;
    }

    KEYWORD_GROUPS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| normalized.contains(k)))
        .map(|(role, _)| *role)
        .unwrap_or(ColumnRole::Other)
}

/// Classify every header, preserving order and duplicates
pub fn classify_headers<S: AsRef<str>>(headers: &[S]) -> Vec<ColumnClassification> {
    headers
        .iter()
        .map(|h| ColumnClassification {
            header: h.as_ref().to_string(),
            role: classify_header(h.as_ref()),
        })
        .collect()
}

/// Index of the first column with the given role
pub fn first_column(columns: &[ColumnClassification], role: ColumnRole) -> Option<usize> {
    columns.iter().position(|c| c.role == role)
}

/// Indexes of every column with the given role
pub fn columns_with_role(columns: &[ColumnClassification], role: ColumnRole) -> Vec<usize> {
    columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.role == role)
        .map(|(i, _)| i)
        .collect()
}
