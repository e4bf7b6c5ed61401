//! Spreadsheet commands: classify (dry run) and upload

use std::path::Path;

use anyhow::{Context, Result};
use auditor_core::config::Settings;
use auditor_core::db::Database;
use auditor_core::ingest::resolve_file_type;
use auditor_core::models::UploadAnalysis;
use auditor_core::{analyze_sheet, read_sheet, LocalBlobStore, UploadIntake, UploadRequest};

/// Classify and total a spreadsheet without touching the database
pub fn cmd_classify(file: &Path, json: bool) -> Result<UploadAnalysis> {
    let filename = file_name(file);
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let file_type = resolve_file_type(None, &filename)?;
    let sheet = read_sheet(&bytes, file_type)
        .with_context(|| format!("Failed to parse {}", filename))?;
    let analysis = analyze_sheet(&sheet);

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&filename, &analysis);
    }

    Ok(analysis)
}

/// Store and process a spreadsheet for a business
pub fn cmd_upload(
    db: &Database,
    settings: &Settings,
    file: &Path,
    user_id: &str,
    file_type: Option<&str>,
    replace: bool,
) -> Result<i64> {
    let filename = file_name(file);
    println!("📥 Uploading {} for {}...", filename, user_id);

    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let store = LocalBlobStore::new(&settings.storage.uploads_dir)
        .context("Failed to open uploads directory")?;
    let intake = UploadIntake::new(db, &store).with_max_size(settings.storage.max_upload_bytes);

    if replace {
        println!("   🧹 Replacing earlier uploads and audits");
    }

    let upload = intake.submit(&UploadRequest {
        user_id,
        filename: &filename,
        bytes: &bytes,
        declared_type: file_type,
        replace,
    })?;

    db.log_activity(
        "cli",
        "upload",
        Some("upload"),
        Some(upload.id),
        Some(&format!(
            "user_id={}, filename={}, replace={}",
            user_id, filename, replace
        )),
    )?;

    println!("   Stored as: {}", upload.storage_path);
    if let Some(ref analysis) = upload.analysis {
        print_analysis(&filename, analysis);
    }
    println!();
    println!("✅ Upload #{} processed", upload.id);

    Ok(upload.id)
}

fn file_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}

fn print_analysis(filename: &str, analysis: &UploadAnalysis) {
    println!();
    println!("📊 {} ({} rows)", filename, analysis.row_count);
    println!("   ─────────────────────────────");
    for column in &analysis.columns {
        println!("   {:<30} {}", super::truncate(&column.header, 30), column.role);
    }

    let m = &analysis.metrics;
    println!();
    println!("   Revenue:       {:>14.2}", m.total_revenue);
    println!("   Cost:          {:>14.2}", m.total_cost);
    println!("   Profit:        {:>14.2}", m.total_profit);
    println!("   Profit margin: {:>13.1}%", m.profit_margin);
    println!("   Expense ratio: {:>13.1}%", m.expense_ratio);

    if !analysis.warnings.is_empty() {
        println!();
        println!("   ⚠️  {} warning(s):", analysis.warnings.len());
        for warning in analysis.warnings.iter().take(10) {
            println!("      {}", warning);
        }
    }
}
