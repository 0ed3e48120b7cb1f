//! Raw flash access and the log-structured record store built on top of it.

mod file_flash;
mod log_store;
mod mem_flash;

pub use file_flash::*;
pub use log_store::*;
pub use mem_flash::*;


use crate::FlashConfig;
use crate::FlashError;

/// Value of every byte after an erase.
pub const ERASED_BYTE: u8 = 0xFF;

/// NOR-style flash device: erased bytes read `0xFF`, writes can only clear
/// bits until the range is erased again.
pub trait FlashDevice: Send + 'static {
    /// Device size in bytes
    fn capacity(&self) -> u32;

    fn read(
        &mut self,
        offset: u32,
        buf: &mut [u8],
    ) -> std::result::Result<(), FlashError>;

    fn write(
        &mut self,
        offset: u32,
        data: &[u8],
    ) -> std::result::Result<(), FlashError>;

    fn erase(
        &mut self,
        offset: u32,
        len: u32,
    ) -> std::result::Result<(), FlashError>;
}

/// Sector geometry of the region reserved for channel records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashRegion {
    pub offset: u32,
    pub sector_size: u32,
    pub sector_count: u32,
}

impl FlashRegion {
    pub fn new(
        offset: u32,
        sector_size: u32,
        sector_count: u32,
    ) -> Self {
        Self {
            offset,
            sector_size,
            sector_count,
        }
    }

    /// First byte past the region, saturating at `u32::MAX`; see
    /// [`FlashRegion::checked_end`].
    pub fn end(&self) -> u32 {
        self.checked_end().unwrap_or(u32::MAX)
    }

    /// First byte past the region, `None` when it overflows the 32-bit
    /// address space.
    pub fn checked_end(&self) -> Option<u32> {
        self.sector_size
            .checked_mul(self.sector_count)
            .and_then(|len| self.offset.checked_add(len))
    }

    pub(crate) fn sector_addr(
        &self,
        sector: usize,
    ) -> u32 {
        self.offset + self.sector_size * sector as u32
    }
}

impl From<&FlashConfig> for FlashRegion {
    fn from(config: &FlashConfig) -> Self {
        FlashRegion::new(config.offset, config.sector_size, config.sector_count)
    }
}

pub(crate) fn check_bounds(
    capacity: u32,
    offset: u32,
    len: usize,
) -> std::result::Result<(), FlashError> {
    if offset as u64 + len as u64 > capacity as u64 {
        return Err(FlashError::OutOfBounds { offset, len });
    }
    Ok(())
}
