//! Device store runtime configuration.
//!
//! Loaded from TOML, optionally overridden by `TOPO_*` environment variables.

use crate::errors::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "TOPO_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceStoreConfig {
    /// Drop local device and port writes on nodes that do not master the
    /// device, and forward removals to the master
    pub require_mastership: bool,
    pub anti_entropy: AntiEntropyConfig,
}

impl Default for DeviceStoreConfig {
    fn default() -> Self {
        Self {
            require_mastership: false,
            anti_entropy: AntiEntropyConfig::default(),
        }
    }
}

/// Periodic advertisement exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiEntropyConfig {
    pub enabled: bool,
    pub initial_delay_ms: u64,
    pub period_ms: u64,
}

impl Default for AntiEntropyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: 5_000,
            period_ms: 5_000,
        }
    }
}

impl AntiEntropyConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl DeviceStoreConfig {
    /// Configuration for tests: anti-entropy only runs when driven explicitly
    pub fn for_testing() -> Self {
        Self {
            require_mastership: false,
            anti_entropy: AntiEntropyConfig {
                enabled: false,
                ..AntiEntropyConfig::default()
            },
        }
    }

    pub fn from_toml_str(content: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| StoreError::config(format!("Invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `TOPO_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> StoreResult<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `TOPO_*` overrides from an explicit variable list
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match name {
                "REQUIRE_MASTERSHIP" => self.require_mastership = parse_env(key.as_ref(), value)?,
                "ANTI_ENTROPY_ENABLED" => {
                    self.anti_entropy.enabled = parse_env(key.as_ref(), value)?
                }
                "ANTI_ENTROPY_INITIAL_DELAY_MS" => {
                    self.anti_entropy.initial_delay_ms = parse_env(key.as_ref(), value)?
                }
                "ANTI_ENTROPY_PERIOD_MS" => {
                    self.anti_entropy.period_ms = parse_env(key.as_ref(), value)?
                }
                _ => {}
            }
        }
        self.validate()
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.anti_entropy.period_ms == 0 {
            return Err(StoreError::config(
                "anti_entropy.period_ms must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> StoreResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| StoreError::config(format!("Invalid value {value:?} in {key}")))
}
