//! Stack-wide FEC configuration.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::option::EncodingType;

/// Default cap on bytes retained per connection for recovery.
pub const DEFAULT_RETAINED_CAP: usize = 16_000;

/// FEC configuration, loadable from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FecConfig {
    /// Administrative switch for the whole feature
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Bytes retained per connection before the oldest ranges are evicted
    #[serde(default = "default_retained_cap")]
    pub retained_cap: usize,
    /// Encoding type requested by new sockets that never set one
    #[serde(default)]
    pub default_type: u8,
}

fn default_enabled() -> bool {
    true
}

fn default_retained_cap() -> usize {
    DEFAULT_RETAINED_CAP
}

impl Default for FecConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retained_cap: DEFAULT_RETAINED_CAP,
            default_type: 0,
        }
    }
}

impl FecConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FecConfig =
            toml::from_str(content).map_err(|e| Error::config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.retained_cap == 0 {
            return Err(Error::config("retained_cap cannot be zero"));
        }
        self.default_encoding()?;
        Ok(())
    }

    /// The default type as an [`EncodingType`].
    pub fn default_encoding(&self) -> Result<EncodingType> {
        EncodingType::try_from(self.default_type).map_err(|_| {
            Error::config(format!("default_type {} out of range", self.default_type))
        })
    }
}

/// Administrative enable switch, shared by every connection of a stack.
#[derive(Debug)]
pub struct FecSysctl {
    enabled: AtomicBool,
}

impl FecSysctl {
    /// Create a switch in the given position.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Create a switch from a configuration.
    pub fn from_config(config: &FecConfig) -> Self {
        Self::new(config.enabled)
    }

    /// Whether the feature is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Flip the switch.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::Relaxed);
        if was != enabled {
            let state = if enabled { "enabled" } else { "disabled" };
            tracing::info!("FEC administratively {}", state);
        }
    }
}

impl Default for FecSysctl {
    fn default() -> Self {
        Self::new(true)
    }
}
