//! Filters for the two log sinks.
//!
//! The terminal follows the user's level. The log file always keeps this
//! crate's `info` events, so each message's Content-Type and body result
//! land in `mail.log` even when the terminal only shows warnings.

use tracing_subscriber::EnvFilter;

/// Terminal filter: `RUST_LOG` when set, otherwise `level`.
pub fn stderr_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Log-file filter: `level`, with this crate raised to at least `info`.
pub fn file_filter(level: &str) -> EnvFilter {
    EnvFilter::new(file_directives(level))
}

fn file_directives(level: &str) -> String {
    let level = level.trim();
    let crate_name = env!("CARGO_CRATE_NAME");
    if level.is_empty() {
        return format!("{crate_name}=info");
    }
    if matches!(level, "debug" | "trace") || level.contains(&format!("{crate_name}=")) {
        return level.to_string();
    }
    format!("{level},{crate_name}=info")
}
