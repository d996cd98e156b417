//! CLI command implementations.

pub mod config;
pub mod diag;
pub mod seed;

use erbind_core::{SessionConfig, SystemConfiguration};
use serde_json::Value;
use std::io::Write;

/// Result type shared by the commands.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Module name the CLI registers with the engine.
const MODULE_NAME: &str = "erbind-cli";

/// Builds the session configuration for a database URL.
pub fn session_config(database_url: Option<&str>, verbose: bool) -> SessionConfig {
    SessionConfig::new(SystemConfiguration::simple(database_url.unwrap_or("")))
        .module_name(MODULE_NAME)
        .verbose_logging(verbose)
}

/// Writes an engine JSON document: compact for `json`, indented otherwise.
pub fn write_json(out: &mut dyn Write, json: &str, format: &str) -> CommandResult {
    let value: Value = serde_json::from_str(json)?;
    match format {
        "json" => writeln!(out, "{}", serde_json::to_string(&value)?)?,
        _ => writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?,
    }
    Ok(())
}

/// Formats a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
