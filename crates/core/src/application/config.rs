// Limiter Configuration

use super::constants::{DEFAULT_RATE, RATE_ENV_VAR};
use crate::domain::RefillPolicy;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Limiter configuration
///
/// The only tunable is the rate: tokens per second per client, which is
/// also the burst capacity. Values `<= 0` are accepted here and sanitized
/// to 1 when the policy is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    pub rate: i64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self { rate: DEFAULT_RATE }
    }
}

impl LimiterConfig {
    pub fn new(rate: i64) -> Self {
        Self { rate }
    }

    /// Defaults overridden by `TOKENGATE_RATE`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Override fields from environment-style variables
    ///
    /// Missing variables leave the field untouched; values are trimmed and
    /// unparsable ones are errors.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(RATE_ENV_VAR) {
            self.rate = raw.trim().parse().map_err(|e| {
                AppError::Config(format!("{}={:?} is not an integer: {}", RATE_ENV_VAR, raw, e))
            })?;
        }

        Ok(())
    }

    /// Sanitized refill policy for this configuration
    pub fn policy(&self) -> RefillPolicy {
        RefillPolicy::per_second(self.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_when_unset() {
        let config = LimiterConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LimiterConfig::default());
        assert_eq!(config.rate, DEFAULT_RATE);
    }

    #[test]
    fn test_rate_from_env() {
        let config = LimiterConfig::from_lookup(lookup(&[(RATE_ENV_VAR, " 25 ")])).unwrap();
        assert_eq!(config.rate, 25);
    }

    #[test]
    fn test_unparsable_rate_is_config_error() {
        let result = LimiterConfig::from_lookup(lookup(&[(RATE_ENV_VAR, "fast")]));
        let err = result.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains(RATE_ENV_VAR));
    }

    #[test]
    fn test_negative_rate_is_accepted_and_sanitized() {
        let config = LimiterConfig::from_lookup(lookup(&[(RATE_ENV_VAR, "-3")])).unwrap();
        assert_eq!(config.rate, -3);
        assert_eq!(config.policy(), RefillPolicy::per_second(1));
    }

    #[test]
    fn test_apply_env_keeps_existing_value_when_unset() {
        let mut config = LimiterConfig::new(42);
        config.apply_env(lookup(&[])).unwrap();
        assert_eq!(config.rate, 42);

        config.apply_env(lookup(&[(RATE_ENV_VAR, "7")])).unwrap();
        assert_eq!(config.rate, 7);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: LimiterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.rate, DEFAULT_RATE);

        let config: LimiterConfig = serde_json::from_str(r#"{"rate": 3}"#).unwrap();
        assert_eq!(config.rate, 3);
    }
}
