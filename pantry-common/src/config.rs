//! Bootstrap configuration loading and path resolution
//!
//! Every field carries a built-in default so a missing file, a missing section
//! or a missing key never prevents startup. Missing files log a warning and
//! fall back to defaults; malformed files are a hard [`Error::Config`].
//!
//! # Config file priority
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`PANTRY_CONFIG`)
//! 3. OS-dependent default (`<config dir>/pantry/pantry.toml`)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "PANTRY_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the SQLite catalog database
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Redis connection URL (queue, budget and lease backing)
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            database_path: default_database_path(),
            redis_url: default_redis_url(),
            logging: LoggingConfig::default(),
            provider: ProviderConfig::default(),
            enrichment: EnrichmentConfig::default(),
            ingestion: IngestionConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error or an EnvFilter directive)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// External nutrition/recipe provider settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// API key; `PANTRY_SPOONACULAR_API_KEY` takes precedence
    #[serde(default)]
    pub api_key: Option<String>,

    /// Client-side request ceiling shared by every provider call
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_key: None,
            requests_per_second: default_requests_per_second(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Enrichment worker, queue and budget settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrichmentConfig {
    /// Seconds between worker ticks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum queue entries pulled per tick
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between items within one batch
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,

    /// External calls allowed per budget window
    #[serde(default = "default_daily_allowance")]
    pub daily_allowance: i64,

    #[serde(default = "default_budget_window_secs")]
    pub budget_window_secs: u64,

    /// Score = priority * multiplier + created_at (unix seconds)
    #[serde(default = "default_priority_multiplier")]
    pub priority_multiplier: i64,

    #[serde(default = "default_queue_key")]
    pub queue_key: String,

    #[serde(default = "default_budget_key")]
    pub budget_key: String,

    /// Take a Redis lease around each tick so several instances do not overlap
    #[serde(default)]
    pub coordinate_instances: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            batch_size: default_batch_size(),
            item_delay_ms: default_item_delay_ms(),
            daily_allowance: default_daily_allowance(),
            budget_window_secs: default_budget_window_secs(),
            priority_multiplier: default_priority_multiplier(),
            queue_key: default_queue_key(),
            budget_key: default_budget_key(),
            coordinate_instances: false,
        }
    }
}

/// Recipe ingestion settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Recipes requested from the provider on a local miss
    #[serde(default = "default_result_count")]
    pub result_count: u32,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            result_count: default_result_count(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_database_path() -> PathBuf {
    default_data_folder().join("pantry.db")
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_provider_base_url() -> String {
    "https://api.spoonacular.com".to_string()
}

fn default_requests_per_second() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_interval_secs() -> u64 {
    60
}

fn default_batch_size() -> usize {
    10
}

fn default_item_delay_ms() -> u64 {
    100
}

fn default_daily_allowance() -> i64 {
    150
}

fn default_budget_window_secs() -> u64 {
    24 * 60 * 60
}

fn default_priority_multiplier() -> i64 {
    1_000_000
}

fn default_queue_key() -> String {
    "item_enrichment_queue".to_string()
}

fn default_budget_key() -> String {
    "spoonacular_api_credits".to_string()
}

fn default_result_count() -> u32 {
    2
}

/// Resolve which TOML file to read
///
/// CLI argument → `PANTRY_CONFIG` → OS default. The returned path may not exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_config_path()
}

/// OS-dependent default config file location
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("pantry").join("pantry.toml"))
        .unwrap_or_else(|| PathBuf::from("/etc/pantry/pantry.toml"))
}

/// OS-dependent default data folder
fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("pantry"))
        .unwrap_or_else(|| PathBuf::from("./pantry_data"))
}

/// Load TOML configuration, falling back to defaults when the file is missing
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}
