use std::sync::Arc;

use parking_lot::Mutex;

use super::check_bounds;
use super::FlashDevice;
use super::ERASED_BYTE;
use crate::FlashError;

#[derive(Debug)]
struct MemFlashInner {
    bytes: Vec<u8>,
    fail_writes: usize,
    /// Successful writes left before one fails
    fail_after: Option<usize>,
    torn_write: Option<usize>,
    erase_count: u64,
}

/// In-memory flash image.
///
/// Clones share the same backing bytes, so a clone taken before handing the
/// device to a store survives a simulated reboot:
///
/// ```ignore
/// let flash = MemFlash::new(4 * 4096);
/// let store = FlashLogStore::mount(flash.clone(), region)?;
/// drop(store);
/// let remounted = FlashLogStore::mount(flash, region)?;
/// ```
#[derive(Debug, Clone)]
pub struct MemFlash {
    inner: Arc<Mutex<MemFlashInner>>,
}

impl MemFlash {
    pub fn new(capacity: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemFlashInner {
                bytes: vec![ERASED_BYTE; capacity as usize],
                fail_writes: 0,
                fail_after: None,
                torn_write: None,
                erase_count: 0,
            })),
        }
    }

    /// Make the next `count` writes fail without touching the image.
    pub fn fail_next_writes(
        &self,
        count: usize,
    ) {
        self.inner.lock().fail_writes = count;
    }

    /// Let `count` writes succeed, then fail the one after them without
    /// touching the image.
    pub fn fail_write_after(
        &self,
        count: usize,
    ) {
        self.inner.lock().fail_after = Some(count);
    }

    /// Simulate a power loss during the next write: only its first `keep`
    /// bytes reach the image and the write reports failure.
    pub fn tear_next_write(
        &self,
        keep: usize,
    ) {
        self.inner.lock().torn_write = Some(keep);
    }

    pub fn erase_count(&self) -> u64 {
        self.inner.lock().erase_count
    }

    /// Copy of `len` bytes at `offset`, for inspection.
    pub fn contents(
        &self,
        offset: u32,
        len: usize,
    ) -> Vec<u8> {
        let inner = self.inner.lock();
        let start = offset as usize;
        inner.bytes[start..start + len].to_vec()
    }

    /// Overwrite raw bytes, bypassing flash semantics.
    pub fn corrupt(
        &self,
        offset: u32,
        data: &[u8],
    ) {
        let mut inner = self.inner.lock();
        let start = offset as usize;
        inner.bytes[start..start + data.len()].copy_from_slice(data);
    }
}

impl FlashDevice for MemFlash {
    fn capacity(&self) -> u32 {
        self.inner.lock().bytes.len() as u32
    }

    fn read(
        &mut self,
        offset: u32,
        buf: &mut [u8],
    ) -> std::result::Result<(), FlashError> {
        let inner = self.inner.lock();
        check_bounds(inner.bytes.len() as u32, offset, buf.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&inner.bytes[start..start + buf.len()]);
        Ok(())
    }

    fn write(
        &mut self,
        offset: u32,
        data: &[u8],
    ) -> std::result::Result<(), FlashError> {
        let mut inner = self.inner.lock();
        check_bounds(inner.bytes.len() as u32, offset, data.len())?;

        if inner.fail_writes > 0 {
            inner.fail_writes -= 1;
            return Err(FlashError::WriteFailed { offset });
        }
        match inner.fail_after {
            Some(0) => {
                inner.fail_after = None;
                return Err(FlashError::WriteFailed { offset });
            }
            Some(left) => inner.fail_after = Some(left - 1),
            None => {}
        }

        let (landed, failed) = match inner.torn_write.take() {
            Some(keep) => (keep.min(data.len()), true),
            None => (data.len(), false),
        };

        let start = offset as usize;
        for (cell, byte) in inner.bytes[start..start + landed].iter_mut().zip(data) {
            *cell &= *byte;
        }

        if failed {
            return Err(FlashError::WriteFailed { offset });
        }
        Ok(())
    }

    fn erase(
        &mut self,
        offset: u32,
        len: u32,
    ) -> std::result::Result<(), FlashError> {
        let mut inner = self.inner.lock();
        check_bounds(inner.bytes.len() as u32, offset, len as usize)?;
        let start = offset as usize;
        inner.bytes[start..start + len as usize].fill(ERASED_BYTE);
        inner.erase_count += 1;
        Ok(())
    }
}
