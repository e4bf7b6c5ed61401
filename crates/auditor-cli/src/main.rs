//! Auditor CLI - Monthly profit audits for small businesses
//!
//! Usage:
//!   auditor init                                  Initialize database
//!   auditor classify --file sales.csv             Preview column roles and totals
//!   auditor upload --user shop --file sales.csv   Store and process a spreadsheet
//!   auditor audit --user shop                     Generate this month's audit
//!   auditor serve --port 3000                     Start the REST API

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use auditor_core::prompts::PromptLibrary;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let settings = commands::load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, &settings, cli.no_encrypt),
        Commands::Classify { file, json } => commands::cmd_classify(&file, json).map(|_| ()),
        Commands::Upload {
            file,
            user,
            file_type,
            replace,
        } => {
            let db = commands::open_db(&cli.db, &settings, cli.no_encrypt)?;
            commands::cmd_upload(&db, &settings, &file, &user, file_type.as_deref(), replace)
                .map(|_| ())
        }
        Commands::Audit {
            user,
            month,
            year,
            dry_run,
        } => {
            let db = commands::open_db(&cli.db, &settings, cli.no_encrypt)?;
            let period = commands::resolve_period(month, year)?;
            if dry_run {
                commands::cmd_audit_payload(&db, &user, period).map(|_| ())
            } else {
                let ai = commands::require_ai(&settings)?;
                commands::cmd_audit(&db, &ai, &user, period).await.map(|_| ())
            }
        }
        Commands::Audits { action } => {
            let db = commands::open_db(&cli.db, &settings, cli.no_encrypt)?;
            match action {
                None => commands::cmd_audits_list(&db, None),
                Some(AuditsAction::List { user }) => {
                    commands::cmd_audits_list(&db, user.as_deref())
                }
                Some(AuditsAction::Show { id, json }) => commands::cmd_audits_show(&db, id, json),
                Some(AuditsAction::Delete { user }) => {
                    commands::cmd_audits_delete(&db, &user).map(|_| ())
                }
            }
        }
        Commands::Chat { audit, query } => {
            let db = commands::open_db(&cli.db, &settings, cli.no_encrypt)?;
            let ai = commands::require_ai(&settings)?;
            commands::cmd_chat(&db, &ai, audit, &query).await.map(|_| ())
        }
        Commands::Integrations { action } => {
            let db = commands::open_db(&cli.db, &settings, cli.no_encrypt)?;
            match action {
                None => commands::cmd_integrations_list(&db, None),
                Some(IntegrationsAction::List { user }) => {
                    commands::cmd_integrations_list(&db, user.as_deref())
                }
                Some(IntegrationsAction::Add {
                    user,
                    platform,
                    category,
                }) => commands::cmd_integrations_add(&db, &user, &platform, &category).map(|_| ()),
                Some(IntegrationsAction::Status { id, status }) => {
                    commands::cmd_integrations_status(&db, id, &status)
                }
                Some(IntegrationsAction::Delete { id }) => {
                    commands::cmd_integrations_delete(&db, id)
                }
            }
        }
        Commands::Prompts { action } => {
            let mut library = PromptLibrary::new();
            match action {
                None | Some(PromptsAction::List) => commands::cmd_prompts_list(&mut library),
                Some(PromptsAction::Show { id, default }) => {
                    commands::cmd_prompts_show(&mut library, &id, default)
                }
                Some(PromptsAction::Path) => commands::cmd_prompts_path(&library),
            }
        }
        Commands::Serve {
            port,
            host,
            static_dir,
        } => {
            let db = commands::open_db(&cli.db, &settings, cli.no_encrypt)?;
            commands::cmd_serve(db, settings, &host, port, static_dir.as_deref(), cli.no_encrypt)
                .await
        }
    }
}
