//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Auditor - Monthly profit audits from your business spreadsheets
#[derive(Parser)]
#[command(name = "auditor")]
#[command(about = "Self-hosted profit auditor for small businesses", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "auditor.db", global = true)]
    pub db: PathBuf,

    /// Settings file (defaults to ~/.local/share/auditor/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set AUDITOR_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Classify a spreadsheet's columns and total it without storing anything
    Classify {
        /// CSV or XLSX file
        #[arg(short, long)]
        file: PathBuf,

        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload and process a spreadsheet for a business
    Upload {
        /// CSV or XLSX file
        #[arg(short, long)]
        file: PathBuf,

        /// Business the upload belongs to
        #[arg(short, long)]
        user: String,

        /// Declared file type (csv, xlsx, or a mime type); inferred from the extension otherwise
        #[arg(long)]
        file_type: Option<String>,

        /// Remove earlier uploads and audits for this business first
        #[arg(long)]
        replace: bool,
    },

    /// Generate the monthly audit for a business
    Audit {
        /// Business to audit
        #[arg(short, long)]
        user: String,

        /// Month (1-12, defaults to the current month)
        #[arg(short, long)]
        month: Option<u32>,

        /// Year (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Print the payload sent to the model and stop
        #[arg(long)]
        dry_run: bool,
    },

    /// Stored audits
    Audits {
        #[command(subcommand)]
        action: Option<AuditsAction>,
    },

    /// Ask a question about a stored audit
    Chat {
        /// Audit ID to use as context
        #[arg(short, long)]
        audit: i64,

        /// The question
        query: String,
    },

    /// Platform connections
    Integrations {
        #[command(subcommand)]
        action: Option<IntegrationsAction>,
    },

    /// Manage AI prompts
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory with a dashboard build to serve at /
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum AuditsAction {
    /// List audits, newest period first
    List {
        /// Only this business
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show one audit
    Show {
        /// Audit ID
        id: i64,

        /// Print the full stored document as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every audit for a business
    Delete {
        /// Business whose audits are removed
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Subcommand)]
pub enum IntegrationsAction {
    /// List connections (credentials are never shown)
    List {
        /// Only this business
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Record a new connection
    Add {
        /// Business the connection belongs to
        #[arg(short, long)]
        user: String,

        /// Platform name (e.g. shopify, quickbooks, stripe)
        #[arg(short, long)]
        platform: String,

        /// Category: accounting, ecommerce, crm, payment, marketplace
        #[arg(short, long)]
        category: String,
    },

    /// Change a connection's status
    Status {
        /// Integration ID
        id: i64,

        /// New status: connected, disconnected, error
        status: String,
    },

    /// Remove a connection
    Delete {
        /// Integration ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all prompts and their override status
    List,

    /// Show a prompt's content
    Show {
        /// Prompt ID (generate_audit, audit_chat)
        id: String,

        /// Show the built-in default even if an override exists
        #[arg(long)]
        default: bool,
    },

    /// Print the override directory
    Path,
}
