//! Log-structured record store over a flash region.
//!
//! ## Layout
//! The region is split in `sector_count` erase sectors used as a ring.
//! Every sector in use starts with a header `{magic u32, seq u32}`; the
//! sector with the highest sequence is the active one, records are only
//! ever appended to it:
//!
//! ```text
//! | key u16 | len u16 | crc32 u32 | data[len] | 0xFF padding to 4 bytes |
//! ```
//!
//! A fully erased record header marks the end of the log inside a sector.
//! Newer records shadow older ones with the same key.
//!
//! ## Collection
//! The sector following the active one is always kept erased. When the
//! active sector fills up, writing moves to that spare sector and the
//! oldest sector is collected: its live records are copied forward, then it
//! is erased and becomes the new spare. A power loss at any point leaves
//! either the old or the copied record readable; mounting finishes an
//! interrupted collection.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::FlashDevice;
use super::FlashRegion;
use super::ERASED_BYTE;
use crate::DurableStore;
use crate::FlashError;
use crate::StorageError;

pub const SECTOR_MAGIC: u32 = 0x4342_5553;
pub const SECTOR_HEADER_LEN: usize = 8;
pub const RECORD_HEADER_LEN: usize = 8;
pub const WRITE_ALIGN: usize = 4;

#[derive(Debug, Clone, Copy)]
struct RecordLoc {
    sector: usize,
    offset: u32,
    len: u16,
}

enum SectorHeader {
    Valid(u32),
    Erased,
    Garbage,
}

/// Bytes a record of `len` bytes occupies in flash.
fn record_span(len: usize) -> usize {
    RECORD_HEADER_LEN + len.div_ceil(WRITE_ALIGN) * WRITE_ALIGN
}

fn record_crc(
    key: u16,
    data: &[u8],
) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&key.to_le_bytes());
    hasher.update(&(data.len() as u16).to_le_bytes());
    hasher.update(data);
    hasher.finalize()
}

/// Smallest sector holding its header and a one byte record
const MIN_SECTOR_SIZE: u32 = (SECTOR_HEADER_LEN + RECORD_HEADER_LEN + WRITE_ALIGN) as u32;

/// Rejects geometries the ring cannot work with; returns the region end.
fn check_region(region: &FlashRegion) -> std::result::Result<u32, StorageError> {
    if region.sector_count < 2 {
        return Err(StorageError::InvalidRegion(format!(
            "{} sectors, at least 2 are needed",
            region.sector_count
        )));
    }
    if region.sector_size < MIN_SECTOR_SIZE {
        return Err(StorageError::InvalidRegion(format!(
            "sector size {} is below {} bytes",
            region.sector_size, MIN_SECTOR_SIZE
        )));
    }
    if region.sector_size % WRITE_ALIGN as u32 != 0 || region.offset % WRITE_ALIGN as u32 != 0 {
        return Err(StorageError::InvalidRegion(format!(
            "sector size {} and offset {:#x} must be multiples of {}",
            region.sector_size, region.offset, WRITE_ALIGN
        )));
    }
    region
        .checked_end()
        .ok_or_else(|| StorageError::InvalidRegion("region exceeds the 32-bit address space".into()))
}

struct LogState<F: FlashDevice> {
    device: F,
    region: FlashRegion,
    /// Sequence number of each sector in use, `None` when erased
    sectors: Vec<Option<u32>>,
    active: usize,
    write_offset: u32,
    next_seq: u32,
    index: HashMap<u16, RecordLoc>,
    /// Sector whose live records still have to be copied forward; no new
    /// record is appended before it is erased.
    pending_collection: Option<usize>,
}

pub struct FlashLogStore<F: FlashDevice> {
    state: Mutex<LogState<F>>,
}

impl<F: FlashDevice> std::fmt::Debug for FlashLogStore<F> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FlashLogStore")
            .field("region", &state.region)
            .field("active", &state.active)
            .field("records", &state.index.len())
            .finish()
    }
}

impl<F: FlashDevice> FlashLogStore<F> {
    /// Mounts the store, formatting the region when it holds no valid
    /// sector and rebuilding the key index by replaying sectors oldest
    /// first.
    pub fn mount(
        device: F,
        region: FlashRegion,
    ) -> std::result::Result<Self, StorageError> {
        let end = check_region(&region)?;
        if device.capacity() < end {
            return Err(FlashError::OutOfBounds {
                offset: region.offset,
                len: (end - region.offset) as usize,
            }
            .into());
        }

        let sector_count = region.sector_count as usize;
        let mut state = LogState {
            device,
            region,
            sectors: vec![None; sector_count],
            active: 0,
            write_offset: SECTOR_HEADER_LEN as u32,
            next_seq: 1,
            index: HashMap::new(),
            pending_collection: None,
        };

        let mut in_use = Vec::with_capacity(sector_count);
        for sector in 0..sector_count {
            match state.read_sector_header(sector)? {
                SectorHeader::Valid(seq) => {
                    state.sectors[sector] = Some(seq);
                    in_use.push((seq, sector));
                }
                SectorHeader::Erased => {}
                SectorHeader::Garbage => {
                    warn!("sector {} has no valid header, erasing it", sector);
                    state.erase_sector(sector)?;
                }
            }
        }

        if in_use.is_empty() {
            info!("no valid sector found, formatting flash region");
            state.open_sector(0)?;
        } else {
            in_use.sort_unstable();
            for (seq, sector) in &in_use {
                let end = state.replay_sector(*sector)?;
                state.active = *sector;
                state.write_offset = end;
                state.next_seq = seq.wrapping_add(1);
            }

            let spare = (state.active + 1) % sector_count;
            if state.sectors[spare].is_some() {
                info!("resuming interrupted collection of sector {}", spare);
                state.pending_collection = Some(spare);
                // retried before the next write; records stay readable meanwhile
                if let Err(e) = state.finish_collection() {
                    warn!("collection of sector {} not finished at mount: {}", spare, e);
                }
            }
        }

        debug!(
            "flash store mounted: active sector {}, write offset {}, {} live records",
            state.active,
            state.write_offset,
            state.index.len()
        );
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_sector(&self) -> usize {
        self.state.lock().active
    }
}

impl<F: FlashDevice> DurableStore for FlashLogStore<F> {
    fn read(
        &self,
        key: u16,
    ) -> std::result::Result<Option<Vec<u8>>, StorageError> {
        let mut state = self.state.lock();
        match state.index.get(&key).copied() {
            Some(loc) => Ok(Some(state.read_record(loc)?)),
            None => Ok(None),
        }
    }

    fn write(
        &self,
        key: u16,
        value: &[u8],
    ) -> std::result::Result<usize, StorageError> {
        let mut state = self.state.lock();

        if let Some(loc) = state.index.get(&key).copied() {
            if state.read_record(loc)? == value {
                trace!("record {} unchanged, skip write", key);
                return Ok(0);
            }
        }

        state.write_record(key, value)?;
        Ok(value.len())
    }
}

impl<F: FlashDevice> LogState<F> {
    fn sector_size(&self) -> u32 {
        self.region.sector_size
    }

    fn read_sector_header(
        &mut self,
        sector: usize,
    ) -> std::result::Result<SectorHeader, StorageError> {
        let mut header = [0u8; SECTOR_HEADER_LEN];
        self.device.read(self.region.sector_addr(sector), &mut header)?;

        if header.iter().all(|b| *b == ERASED_BYTE) {
            return Ok(SectorHeader::Erased);
        }

        let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if magic != SECTOR_MAGIC {
            return Ok(SectorHeader::Garbage);
        }
        let seq = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        Ok(SectorHeader::Valid(seq))
    }

    /// Indexes every intact record of `sector`; returns the append offset.
    fn replay_sector(
        &mut self,
        sector: usize,
    ) -> std::result::Result<u32, StorageError> {
        let base = self.region.sector_addr(sector);
        let sector_size = self.sector_size();
        let mut offset = SECTOR_HEADER_LEN as u32;

        while offset as usize + RECORD_HEADER_LEN <= sector_size as usize {
            let mut header = [0u8; RECORD_HEADER_LEN];
            self.device.read(base + offset, &mut header)?;
            if header.iter().all(|b| *b == ERASED_BYTE) {
                break;
            }

            let key = u16::from_le_bytes([header[0], header[1]]);
            let len = u16::from_le_bytes([header[2], header[3]]);
            let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            let span = record_span(len as usize) as u32;
            if span > sector_size - offset {
                warn!(
                    "sector {} has a damaged record header at offset {}, closing the sector",
                    sector, offset
                );
                return Ok(sector_size);
            }

            let mut data = vec![0u8; len as usize];
            self.device.read(base + offset + RECORD_HEADER_LEN as u32, &mut data)?;

            if record_crc(key, &data) == crc {
                self.index.insert(key, RecordLoc { sector, offset, len });
            } else {
                warn!("skip torn record for key {} in sector {} at offset {}", key, sector, offset);
            }
            offset += span;
        }

        Ok(offset)
    }

    fn read_record(
        &mut self,
        loc: RecordLoc,
    ) -> std::result::Result<Vec<u8>, StorageError> {
        let mut data = vec![0u8; loc.len as usize];
        let addr = self.region.sector_addr(loc.sector) + loc.offset + RECORD_HEADER_LEN as u32;
        self.device.read(addr, &mut data)?;
        Ok(data)
    }

    fn erase_sector(
        &mut self,
        sector: usize,
    ) -> std::result::Result<(), StorageError> {
        let addr = self.region.sector_addr(sector);
        self.device.erase(addr, self.sector_size())?;
        self.sectors[sector] = None;
        Ok(())
    }

    /// Erases `sector` and makes it the active one.
    fn open_sector(
        &mut self,
        sector: usize,
    ) -> std::result::Result<(), StorageError> {
        self.erase_sector(sector)?;

        let seq = self.next_seq;
        let mut header = [0u8; SECTOR_HEADER_LEN];
        header[..4].copy_from_slice(&SECTOR_MAGIC.to_le_bytes());
        header[4..].copy_from_slice(&seq.to_le_bytes());
        self.device.write(self.region.sector_addr(sector), &header)?;

        self.sectors[sector] = Some(seq);
        self.next_seq = seq.wrapping_add(1);
        self.active = sector;
        self.write_offset = SECTOR_HEADER_LEN as u32;
        trace!("sector {} opened with sequence {}", sector, seq);
        Ok(())
    }

    fn has_room(
        &self,
        len: usize,
    ) -> bool {
        self.write_offset as usize + record_span(len) <= self.sector_size() as usize
    }

    /// Appends to the active sector; the caller checked there is room.
    fn append(
        &mut self,
        key: u16,
        data: &[u8],
    ) -> std::result::Result<RecordLoc, StorageError> {
        let span = record_span(data.len());
        let mut buf = vec![ERASED_BYTE; span];
        buf[0..2].copy_from_slice(&key.to_le_bytes());
        buf[2..4].copy_from_slice(&(data.len() as u16).to_le_bytes());
        buf[4..8].copy_from_slice(&record_crc(key, data).to_le_bytes());
        buf[RECORD_HEADER_LEN..RECORD_HEADER_LEN + data.len()].copy_from_slice(data);

        let loc = RecordLoc {
            sector: self.active,
            offset: self.write_offset,
            len: data.len() as u16,
        };
        let addr = self.region.sector_addr(self.active) + self.write_offset;

        if let Err(e) = self.device.write(addr, &buf) {
            // Bits that landed cannot be cleared again, only a still-erased
            // span may be reused.
            let mut landed = vec![0u8; span];
            let untouched = self.device.read(addr, &mut landed).is_ok() && landed.iter().all(|b| *b == ERASED_BYTE);
            if !untouched {
                self.write_offset += span as u32;
            }
            warn!("record {} write failed at offset {:#x}: {}", key, addr, e);
            return Err(e.into());
        }

        self.write_offset += span as u32;
        Ok(loc)
    }

    fn write_record(
        &mut self,
        key: u16,
        data: &[u8],
    ) -> std::result::Result<(), StorageError> {
        let max_payload = self.sector_size() as usize - SECTOR_HEADER_LEN;
        if data.len() > u16::MAX as usize || record_span(data.len()) > max_payload {
            return Err(StorageError::RecordTooLarge {
                len: data.len(),
                sector_size: self.sector_size(),
            });
        }

        self.finish_collection()?;

        for _ in 0..=self.region.sector_count {
            if self.has_room(data.len()) {
                let loc = self.append(key, data)?;
                self.index.insert(key, loc);
                return Ok(());
            }
            self.rotate()?;
        }

        Err(StorageError::Full)
    }

    /// Moves writing to the spare sector and collects the oldest one.
    fn rotate(&mut self) -> std::result::Result<(), StorageError> {
        let sector_count = self.sectors.len();
        let next = (self.active + 1) % sector_count;
        if self.sectors[next].is_some() {
            return Err(StorageError::Full);
        }
        self.open_sector(next)?;

        let oldest = (next + 1) % sector_count;
        if self.sectors[oldest].is_some() {
            self.pending_collection = Some(oldest);
            self.finish_collection()?;
        }
        Ok(())
    }

    fn finish_collection(&mut self) -> std::result::Result<(), StorageError> {
        if let Some(victim) = self.pending_collection {
            self.collect(victim)?;
            self.pending_collection = None;
        }
        Ok(())
    }

    /// Copies the live records of `victim` into the active sector, then
    /// erases it.
    fn collect(
        &mut self,
        victim: usize,
    ) -> std::result::Result<(), StorageError> {
        let mut live: Vec<(u16, RecordLoc)> = self
            .index
            .iter()
            .filter(|(_, loc)| loc.sector == victim)
            .map(|(key, loc)| (*key, *loc))
            .collect();
        live.sort_unstable_by_key(|(_, loc)| loc.offset);

        debug!("collect sector {}: {} live records", victim, live.len());
        for (key, loc) in live {
            let data = self.read_record(loc)?;
            if !self.has_room(data.len()) {
                warn!("no room left to move record {} out of sector {}", key, victim);
                return Err(StorageError::Full);
            }
            let moved = self.append(key, &data)?;
            self.index.insert(key, moved);
        }

        self.erase_sector(victim)
    }
}
