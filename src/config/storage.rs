use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::MAX_CHANNEL_SIZE;
use crate::RECORD_HEADER_LEN;
use crate::SECTOR_HEADER_LEN;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Log-structured store over a flash image
    Flash,
    /// Embedded sled database, for hosted targets
    Sled,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Disable to run without recovery or flushing
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Period of the dirty-channel flush loop
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Bounded wait on each channel lock during startup recovery
    #[serde(default = "default_recovery_lock_timeout_ms")]
    pub recovery_lock_timeout_ms: u64,

    #[serde(default)]
    pub flash: FlashConfig,

    #[serde(default = "default_sled_path")]
    pub sled_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            backend: default_backend(),
            flush_interval_ms: default_flush_interval_ms(),
            recovery_lock_timeout_ms: default_recovery_lock_timeout_ms(),
            flash: FlashConfig::default(),
            sled_path: default_sled_path(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "storage.flush_interval_ms must be greater than 0".into(),
            )));
        }
        if self.recovery_lock_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "storage.recovery_lock_timeout_ms must be greater than 0".into(),
            )));
        }
        if self.backend == StorageBackend::Flash {
            self.flash.validate()?;
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn recovery_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_lock_timeout_ms)
    }
}

/// Geometry of the flash region backing the log-structured store
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FlashConfig {
    /// File holding the flash image on hosted targets
    #[serde(default = "default_image_path")]
    pub image_path: PathBuf,

    /// Byte offset of the region inside the flash device
    #[serde(default)]
    pub offset: u32,

    /// Erase sector size in bytes
    #[serde(default = "default_sector_size")]
    pub sector_size: u32,

    /// Number of sectors; one of them is always kept erased
    #[serde(default = "default_sector_count")]
    pub sector_count: u32,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            image_path: default_image_path(),
            offset: 0,
            sector_size: default_sector_size(),
            sector_count: default_sector_count(),
        }
    }
}

impl FlashConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sector_count < 2 {
            return Err(Error::Config(ConfigError::Message(format!(
                "storage.flash.sector_count must be at least 2, got {}",
                self.sector_count
            ))));
        }

        if self.sector_size % 4 != 0 || self.offset % 4 != 0 {
            return Err(Error::Config(ConfigError::Message(
                "storage.flash.sector_size and offset must be multiples of 4".into(),
            )));
        }

        let min_sector = (SECTOR_HEADER_LEN + RECORD_HEADER_LEN + MAX_CHANNEL_SIZE + 3) as u32;
        if self.sector_size < min_sector {
            return Err(Error::Config(ConfigError::Message(format!(
                "storage.flash.sector_size {} cannot hold a {} bytes record",
                self.sector_size, MAX_CHANNEL_SIZE
            ))));
        }

        let region_end = self.offset as u64 + self.sector_size as u64 * self.sector_count as u64;
        if region_end > u32::MAX as u64 {
            return Err(Error::Config(ConfigError::Message(
                "storage.flash region exceeds the 32-bit address space".into(),
            )));
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}
fn default_backend() -> StorageBackend {
    StorageBackend::Flash
}
fn default_flush_interval_ms() -> u64 {
    10_000
}
fn default_recovery_lock_timeout_ms() -> u64 {
    5_000
}
fn default_image_path() -> PathBuf {
    PathBuf::from("./db/flash.img")
}
fn default_sled_path() -> PathBuf {
    PathBuf::from("./db/channels")
}
fn default_sector_size() -> u32 {
    4096
}
fn default_sector_count() -> u32 {
    4
}
