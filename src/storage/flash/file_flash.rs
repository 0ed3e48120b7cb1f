use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use super::check_bounds;
use super::FlashDevice;
use super::ERASED_BYTE;
use crate::FlashError;

/// Flash image kept in a regular file, for hosted targets and tests.
#[derive(Debug)]
pub struct FileFlash {
    file: File,
    capacity: u32,
}

impl FileFlash {
    /// Opens (or creates) the image; a new or short file is extended with
    /// erased bytes up to `capacity`.
    pub fn open(
        path: impl AsRef<Path>,
        capacity: u32,
    ) -> std::result::Result<Self, FlashError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?;

        let current = file.metadata()?.len();
        if current < capacity as u64 {
            debug!("extend flash image {:?} from {} to {} bytes", path, current, capacity);
            file.seek(SeekFrom::Start(current))?;
            let fill = vec![ERASED_BYTE; (capacity as u64 - current) as usize];
            file.write_all(&fill)?;
            file.sync_data()?;
        }

        Ok(Self { file, capacity })
    }
}

impl FlashDevice for FileFlash {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn read(
        &mut self,
        offset: u32,
        buf: &mut [u8],
    ) -> std::result::Result<(), FlashError> {
        check_bounds(self.capacity, offset, buf.len())?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write(
        &mut self,
        offset: u32,
        data: &[u8],
    ) -> std::result::Result<(), FlashError> {
        check_bounds(self.capacity, offset, data.len())?;

        let mut programmed = vec![0u8; data.len()];
        self.read(offset, &mut programmed)?;
        for (cell, byte) in programmed.iter_mut().zip(data) {
            *cell &= *byte;
        }

        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(&programmed)?;
        self.file.sync_data()?;
        Ok(())
    }

    fn erase(
        &mut self,
        offset: u32,
        len: u32,
    ) -> std::result::Result<(), FlashError> {
        check_bounds(self.capacity, offset, len as usize)?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(&vec![ERASED_BYTE; len as usize])?;
        self.file.sync_data()?;
        Ok(())
    }
}
