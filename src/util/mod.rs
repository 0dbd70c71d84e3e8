//! # Utility Module
//!
//! Common helpers used across the framework.

mod config;

pub use config::SessionSettings;

use tracing_subscriber::EnvFilter;

/// Normalize raw outbound text: trim surrounding whitespace, reject empty.
///
/// Interior whitespace is preserved; only messages that are blank after
/// trimming are rejected.
pub fn normalize_outbound(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Install a console tracing subscriber honoring `RUST_LOG`, falling back
/// to `default_filter`. Later calls are no-ops.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
