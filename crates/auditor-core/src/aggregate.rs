//! Row aggregation over classified spreadsheet columns

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::classify::{classify_headers, columns_with_role, first_column};
use crate::models::{AggregateMetrics, ColumnClassification, ColumnRole, UploadAnalysis};
use crate::sheet::SheetData;

fn non_numeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9.\-]").expect("valid regex"))
}

/// Parse a cell as a number after stripping everything but digits, `.` and `-`
///
/// Returns None for empty or unparseable cells.
pub fn parse_number(cell: &str) -> Option<f64> {
    let cleaned = non_numeric().replace_all(cell, "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Numeric coercion used for totals: unreadable cells count as 0
pub fn coerce_number(cell: &str) -> f64 {
    parse_number(cell).unwrap_or(0.0)
}

/// Totals plus anything worth telling the user about the sheet
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub metrics: AggregateMetrics,
    pub warnings: Vec<String>,
}

/// Sum revenue and cost across rows using the column roles
///
/// Revenue and cost columns are summed directly. When a sheet has no revenue
/// column, per-row revenue is units x sale price (likewise cost from units x
/// cost price). Units and prices come from the first column of each role.
pub fn aggregate(sheet: &SheetData, columns: &[ColumnClassification]) -> Aggregation {
    let revenue_cols = columns_with_role(columns, ColumnRole::Revenue);
    let cost_cols = columns_with_role(columns, ColumnRole::Cost);
    let units_col = first_column(columns, ColumnRole::Units);
    let sale_price_col = first_column(columns, ColumnRole::SalePrice);
    let cost_price_col = first_column(columns, ColumnRole::CostPrice);

    let derive_revenue = revenue_cols.is_empty() && units_col.is_some() && sale_price_col.is_some();
    let derive_cost = cost_cols.is_empty() && units_col.is_some() && cost_price_col.is_some();

    let mut warnings = Vec::new();
    if revenue_cols.is_empty() && !derive_revenue {
        warnings.push("No revenue column found and no units/sale price pair to derive it".into());
    }
    if cost_cols.is_empty() && !derive_cost {
        warnings.push("No cost column found and no units/cost price pair to derive it".into());
    }

    let mut unreadable = vec![0usize; columns.len()];
    let mut cell_value = |row: usize, col: usize| -> f64 {
        let cell = sheet.cell(row, col);
        match parse_number(cell) {
            Some(n) => n,
            None => {
                if !cell.is_empty() {
                    if let Some(count) = unreadable.get_mut(col) {
                        *count += 1;
                    }
                }
                0.0
            }
        }
    };

    let mut total_revenue = 0.0;
    let mut total_cost = 0.0;
    let mut total_units = 0.0;

    for row in 0..sheet.row_count() {
        let units = units_col.map(|c| cell_value(row, c)).unwrap_or(0.0);
        total_units += units;

        if derive_revenue {
            let price = sale_price_col.map(|c| cell_value(row, c)).unwrap_or(0.0);
            total_revenue += units * price;
        } else {
            for &col in &revenue_cols {
                total_revenue += cell_value(row, col);
            }
        }

        if derive_cost {
            let price = cost_price_col.map(|c| cell_value(row, c)).unwrap_or(0.0);
            total_cost += units * price;
        } else {
            for &col in &cost_cols {
                total_cost += cell_value(row, col);
            }
        }
    }

    for (col, count) in unreadable.iter().enumerate() {
        if *count > 0 {
            if let Some(column) = columns.get(col) {
                warnings.push(format!(
                    "{} cell(s) in column '{}' were not numeric and counted as 0",
                    count, column.header
                ));
            }
        }
    }

    let mut metrics = AggregateMetrics::from_totals(total_revenue, total_cost);
    metrics.total_units = total_units;
    metrics.rows_processed = sheet.row_count() as i64;

    debug!(
        rows = metrics.rows_processed,
        revenue = metrics.total_revenue,
        cost = metrics.total_cost,
        "Aggregated spreadsheet"
    );

    Aggregation { metrics, warnings }
}

/// Classify a sheet's headers and aggregate its rows
pub fn analyze_sheet(sheet: &SheetData) -> UploadAnalysis {
    let columns = classify_headers(&sheet.headers);
    let Aggregation { metrics, warnings } = aggregate(sheet, &columns);

    UploadAnalysis {
        row_count: sheet.row_count() as i64,
        columns,
        metrics,
        warnings,
    }
}
