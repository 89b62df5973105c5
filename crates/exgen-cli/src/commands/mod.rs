//! Subcommand implementations.

use std::path::PathBuf;

use anyhow::Result;

use exgen_stores::{load_config_from, ExgenConfig};

pub mod eval;
pub mod generate;
pub mod init;
pub mod list_models;
pub mod validate;

/// Parse a `name=value` assignment given to `--set`.
pub fn parse_assignment(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing variable name in '{s}'"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid number in '{s}'"))?;
    Ok((name.to_string(), value))
}

/// Load the configuration, with `--catalog` taking precedence over it.
fn load_config(catalog: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<ExgenConfig> {
    let mut config = load_config_from(config_path.as_deref())?;
    if let Some(catalog) = catalog {
        config.catalog = catalog.display().to_string();
    }
    Ok(config)
}
