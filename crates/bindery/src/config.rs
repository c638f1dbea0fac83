//! Configuration loaded from TOML.
//!
//! ```toml
//! [limitation]
//! enabled = true
//! maximum = 3
//! sort_descending_by_creation = true
//!
//! [registry]
//! default_priority = 0
//! ```
//!
//! Every key is optional.

use serde::{Deserialize, Serialize};

use bindery_core::logging::targets;

use crate::sync::Limitation;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinderyConfig {
    pub limitation: LimitationConfig,
    pub registry: RegistryConfig,
}

impl BinderyConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        tracing::debug!(target: targets::CONFIG, ?config, "configuration loaded");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}

/// Settings of a [`LimitedCollectionSynchronizer`](crate::sync::LimitedCollectionSynchronizer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitationConfig {
    pub enabled: bool,
    pub maximum: usize,
    pub sort_descending_by_creation: bool,
}

impl Default for LimitationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            maximum: 0,
            sort_descending_by_creation: true,
        }
    }
}

impl LimitationConfig {
    pub fn into_limitation(self) -> Limitation {
        let limitation = Limitation::new(self.maximum);
        limitation.set_enabled(self.enabled);
        limitation
    }
}

/// Settings shared by component registries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub default_priority: i32,
}
