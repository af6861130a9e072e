//! Layered configuration: defaults, optional file, environment, CLI flag

use anyhow::{Context, Result};
use config::{Config, File};
use std::path::Path;
use tokengate_core::application::constants::DEFAULT_RATE;
use tokengate_core::LimiterConfig;
use tracing::{debug, info};

/// Resolve the limiter configuration from the process environment
///
/// Later sources override earlier ones:
/// 1. built-in default rate
/// 2. `file` (TOML, JSON or YAML, by extension)
/// 3. `TOKENGATE_*` environment variables
/// 4. `rate_override` from the command line
pub fn load(file: Option<&Path>, rate_override: Option<i64>) -> Result<LimiterConfig> {
    load_with(file, |key| std::env::var(key).ok(), rate_override)
}

/// Same as [`load`] with an explicit variable source for layer 3
pub fn load_with<F>(
    file: Option<&Path>,
    env: F,
    rate_override: Option<i64>,
) -> Result<LimiterConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = Config::builder().set_default("rate", DEFAULT_RATE)?;

    if let Some(path) = file {
        debug!(path = %path.display(), "Reading config file");
        builder = builder.add_source(File::from(path));
    }

    let mut limiter_config: LimiterConfig = builder
        .build()
        .context("Failed to load configuration")?
        .try_deserialize()
        .context("Invalid limiter configuration")?;

    limiter_config
        .apply_env(env)
        .context("Invalid environment configuration")?;

    if let Some(rate) = rate_override {
        limiter_config.rate = rate;
    }

    info!(
        config = %serde_json::to_string(&limiter_config)?,
        "Configuration loaded"
    );

    Ok(limiter_config)
}
