//! Configuration management module for the channel bus.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Environment variable overrides
//! - Configuration file support
//! - Component-wise validation
mod dispatcher;
mod forwarder;
mod gate;
mod storage;
pub use dispatcher::*;
pub use forwarder::*;
pub use gate::*;
pub use storage::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Prefix of the environment variables overriding the configuration,
/// e.g. `CHANBUS__GATE__LOCK_TIMEOUT_MS=300`.
pub const ENV_PREFIX: &str = "CHANBUS";

/// Main configuration container for the bus components
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct BusConfig {
    /// Access gate wait bounds
    #[serde(default)]
    pub gate: GateConfig,
    /// Change notification queue
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Durable storage and flush policy
    #[serde(default)]
    pub storage: StorageConfig,
    /// Event forwarding to an external host
    #[serde(default)]
    pub forwarder: ForwarderConfig,
}

impl Debug for BusConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("BusConfig")
            .field("gate", &self.gate)
            .field("storage", &self.storage.backend)
            .field("forwarder", &self.forwarder.enabled)
            .finish()
    }
}

impl BusConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `CHANBUS__` prefix (highest priority)
    ///
    /// # Note
    /// This method does NOT validate the configuration. Callers MUST call `validate()`
    /// before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/bus.toml");
    /// std::env::set_var("CHANBUS__STORAGE__FLUSH_INTERVAL_MS", "5000");
    /// let cfg = BusConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(Self::environment());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    pub fn validate(self) -> Result<Self> {
        self.gate.validate()?;
        self.dispatcher.validate()?;
        self.storage.validate()?;
        self.forwarder.validate()?;
        Ok(self)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .ignore_empty(true)
            .try_parsing(true)
    }
}
