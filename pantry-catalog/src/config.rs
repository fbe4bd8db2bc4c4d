//! Service configuration resolution
//!
//! Turns the bootstrap [`TomlConfig`] into the settings each component takes.
//! The provider API key resolves ENV → TOML.

use pantry_common::config::TomlConfig;
use pantry_common::{Error, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::services::enrichment_worker::WorkerSettings;
use crate::services::spoonacular_client::{SpoonacularSettings, REQUESTS_PER_LOOKUP};

/// Environment variable carrying the provider API key
pub const API_KEY_ENV_VAR: &str = "PANTRY_SPOONACULAR_API_KEY";

/// Resolve the provider API key
///
/// **Priority:** ENV → TOML
pub fn resolve_api_key(toml_config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(API_KEY_ENV_VAR).ok().filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .provider
        .api_key
        .clone()
        .filter(|k| is_valid_key(k));

    match (env_key, toml_key) {
        (Some(key), toml_key) => {
            if toml_key.is_some() {
                warn!("Provider API key set in both environment and TOML; using environment");
            }
            info!("Provider API key loaded from environment variable");
            Ok(key)
        }
        (None, Some(key)) => {
            info!("Provider API key loaded from TOML config");
            Ok(key)
        }
        (None, None) => Err(Error::Config(format!(
            "Provider API key not configured. Set {} or provider.api_key in the TOML config",
            API_KEY_ENV_VAR
        ))),
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

pub fn provider_settings(toml_config: &TomlConfig, api_key: String) -> SpoonacularSettings {
    SpoonacularSettings {
        base_url: toml_config.provider.base_url.clone(),
        api_key,
        requests_per_second: toml_config.provider.requests_per_second,
        timeout: Duration::from_secs(toml_config.provider.timeout_secs),
    }
}

pub fn worker_settings(toml_config: &TomlConfig) -> WorkerSettings {
    let enrichment = &toml_config.enrichment;
    WorkerSettings {
        interval: Duration::from_secs(enrichment.interval_secs),
        batch_size: enrichment.batch_size,
        item_delay: Duration::from_millis(enrichment.item_delay_ms),
    }
}

/// TTL of the multi-instance tick lease
///
/// Must outlast the slowest possible batch: every lookup paced by the rate
/// limiter and timing out on each request, plus the pauses between items.
/// The lease expires on its own one interval later if its holder dies.
pub fn tick_lease_ttl(toml_config: &TomlConfig) -> Duration {
    let provider = &toml_config.provider;
    let worker = worker_settings(toml_config);

    let pacing = Duration::from_secs(1) / provider.requests_per_second.max(1);
    let per_request = Duration::from_secs(provider.timeout_secs) + pacing;
    let per_item = per_request * REQUESTS_PER_LOOKUP + worker.item_delay;
    let slowest_batch = per_item * worker.batch_size.min(u32::MAX as usize) as u32;

    (slowest_batch + worker.interval)
        .max(worker.interval * 2)
        .max(Duration::from_secs(1))
}
