pub mod classify;
pub mod helpers;
pub mod info;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;

/// Read and parse a JSON definitions file
pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Parse JSON arguments given on the command line
pub fn parse_args(args: &str) -> Result<serde_json::Value> {
    serde_json::from_str(args).with_context(|| format!("Invalid JSON: {}", args))
}
