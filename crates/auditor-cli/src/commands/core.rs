//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `load_settings` / `open_db` - Shared setup used by every command
//! - `resolve_period` - Month/year flags to an audit period
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{bail, Context, Result};
use auditor_core::ai::{AIBackend, AIClient};
use auditor_core::config::{default_config_path, Settings};
use auditor_core::db::Database;
use auditor_core::models::AuditPeriod;

/// Load settings from the given file (or the default location) and the environment
pub fn load_settings(config_path: Option<&Path>) -> Result<Settings> {
    match config_path {
        Some(path) => {
            if !path.exists() {
                bail!("Settings file not found: {}", path.display());
            }
            Settings::load_from(Some(path))
                .with_context(|| format!("Failed to load settings from {}", path.display()))
        }
        None => Settings::load_from(default_config_path().as_deref())
            .context("Failed to load settings"),
    }
}

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, settings: &Settings, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;

    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else if let Some(ref key) = settings.db_key {
        Database::new_with_key(path_str, Some(key)).context("Failed to open database")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// The configured AI client, or an error explaining how to configure one
pub fn require_ai(settings: &Settings) -> Result<AIClient> {
    match AIClient::from_settings(settings) {
        Some(client) => {
            tracing::debug!(
                backend = client.name(),
                model = client.model(),
                "Using AI backend"
            );
            Ok(client)
        }
        None => bail!(
            "AI backend not configured. Set OPENAI_API_KEY (or OPENAI_BASE_URL), \
            or AI_BACKEND=ollama with OLLAMA_HOST."
        ),
    }
}

/// Resolve `--month` / `--year`, defaulting each to the current period
pub fn resolve_period(month: Option<u32>, year: Option<i32>) -> Result<AuditPeriod> {
    let current = AuditPeriod::current();
    let period = AuditPeriod::new(
        month.unwrap_or(current.month),
        year.unwrap_or(current.year),
    )?;
    Ok(period)
}

pub fn cmd_init(db_path: &Path, settings: &Settings, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path, settings, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }
    println!(
        "   Uploads directory: {}",
        settings.storage.uploads_dir.display()
    );

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Upload a spreadsheet: auditor upload --user my-shop --file sales.csv");
    println!("  2. Generate an audit: auditor audit --user my-shop");
    println!("  3. Start web API: auditor serve");

    Ok(())
}
