//! Durable key→bytes stores used to mirror persistent channels.
//!
//! Keys are channel ids, values are the raw channel bytes, one live record
//! per channel. Two backends are provided: a log-structured store over a
//! flash region ([`FlashLogStore`]) and an embedded sled database
//! ([`SledStore`]) for hosted targets.

mod durable_store;
mod flash;
mod sled_store;

pub use durable_store::*;
pub use flash::*;
pub use sled_store::*;


use std::sync::Arc;

use tracing::info;

use crate::Result;
use crate::StorageBackend;
use crate::StorageConfig;
use crate::StorageError;

/// Opens the store selected by the configuration.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn DurableStore>> {
    match config.backend {
        StorageBackend::Flash => {
            let region = FlashRegion::from(&config.flash);
            info!(
                "mount flash store at {:?}: {} sectors of {} bytes at offset {:#x}",
                config.flash.image_path, region.sector_count, region.sector_size, region.offset
            );
            let device = FileFlash::open(&config.flash.image_path, region.end()).map_err(StorageError::from)?;
            Ok(Arc::new(FlashLogStore::mount(device, region)?))
        }
        StorageBackend::Sled => {
            info!("open sled store at {:?}", config.sled_path);
            Ok(Arc::new(SledStore::open(&config.sled_path)?))
        }
    }
}
