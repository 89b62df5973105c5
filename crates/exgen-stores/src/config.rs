//! Configuration and store factory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use exgen_core::engine::EngineConfig;
use exgen_core::model::OwnerId;

use crate::catalog::CatalogStore;

/// Top-level exgen configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExgenConfig {
    /// Catalog file or directory. `${VAR}` references are expanded.
    #[serde(default = "default_catalog")]
    pub catalog: String,
    /// Owner used when a command does not name one.
    #[serde(default = "default_owner")]
    pub default_owner: OwnerId,
    /// Max concurrent instances per batch.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Max retries on transient store errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Base seed when a command does not give one.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Output directory for generation reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_catalog() -> String {
    "catalogs".to_string()
}
fn default_owner() -> OwnerId {
    1
}
fn default_parallelism() -> usize {
    4
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    500
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./exgen-results")
}

impl Default for ExgenConfig {
    fn default() -> Self {
        Self {
            catalog: default_catalog(),
            default_owner: default_owner(),
            parallelism: default_parallelism(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            seed: None,
            output_dir: default_output_dir(),
        }
    }
}

impl ExgenConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            parallelism: self.parallelism,
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        PathBuf::from(&self.catalog)
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `exgen.toml` in the current directory
/// 2. `~/.config/exgen/config.toml`
///
/// Environment variable override: `EXGEN_CATALOG`.
pub fn load_config() -> Result<ExgenConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExgenConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("exgen.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => parse_config(
            &std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?,
            &path,
        )?,
        None => ExgenConfig::default(),
    };

    if let Ok(catalog) = std::env::var("EXGEN_CATALOG") {
        config.catalog = catalog;
    }
    config.catalog = resolve_env_vars(&config.catalog);

    Ok(config)
}

fn parse_config(content: &str, path: &Path) -> Result<ExgenConfig> {
    toml::from_str::<ExgenConfig>(content)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("exgen"))
}

/// Open the catalog store the configuration points at.
pub fn open_store(config: &ExgenConfig) -> Result<CatalogStore> {
    let path = config.catalog_path();
    if !path.exists() {
        anyhow::bail!(
            "catalog not found: {} (set `catalog` in exgen.toml or EXGEN_CATALOG)",
            path.display()
        );
    }
    CatalogStore::open(&path)
}
