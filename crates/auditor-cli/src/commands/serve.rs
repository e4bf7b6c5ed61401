//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use auditor_core::config::Settings;
use auditor_core::db::Database;

pub async fn cmd_serve(
    db: Database,
    settings: Settings,
    host: &str,
    port: u16,
    static_dir: Option<&Path>,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Auditor web server...");
    println!("   Database: {}", db.path());
    println!("   Listening: http://{}:{}/api", host, port);
    println!(
        "   Uploads: {}",
        settings.storage.uploads_dir.display()
    );
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }
    if let Some(hours) = settings.audit_interval_hours {
        println!("   ⏰ Scheduled audits: every {} hours", hours);
    }

    println!();
    println!("   ⚠️  No authentication - do not expose to untrusted networks");
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let static_dir_str = match static_dir {
        Some(p) => Some(p.to_str().context("static_dir path must be valid UTF-8")?),
        None => None,
    };
    auditor_server::serve(db, settings, host, port, static_dir_str).await?;

    Ok(())
}
