//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod audits;
pub mod integrations;
pub mod metrics;
pub mod records;
pub mod uploads;

// Re-export all handlers for use in router
pub use audits::*;
pub use integrations::*;
pub use metrics::*;
pub use records::*;
pub use uploads::*;
