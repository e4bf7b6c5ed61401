//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `audits` - Audit generation, listing, deletion and chat
//! - `core` - Init and shared utilities (settings, open_db, period flags)
//! - `integrations` - Platform connection commands
//! - `prompts` - Prompt library management commands
//! - `serve` - Web server command
//! - `upload` - Spreadsheet classify and upload commands

pub mod audits;
pub mod core;
pub mod integrations;
pub mod prompts;
pub mod serve;
pub mod upload;

// Re-export command functions for main.rs
pub use audits::*;
pub use self::core::*;
pub use integrations::*;
pub use prompts::*;
pub use serve::*;
pub use upload::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
