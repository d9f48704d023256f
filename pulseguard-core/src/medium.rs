//! Byte-addressed persistence media for the ring store
//!
//! ## Overview
//!
//! The ring store never computes addresses itself beyond `slot * 8`; it hands
//! offsets to a [`StorageMedium`], which behaves like an EEPROM: a fixed
//! number of bytes, random-access reads and writes, contents kept across
//! power loss.
//!
//! Two media ship with the crate:
//! - [`MemoryMedium`]: a fixed array, used in tests and as the reference for
//!   boards whose EEPROM driver exposes a plain byte slice.
//! - [`FileMedium`] (std): a pre-sized file, used by the host agent.

use crate::errors::{StoreError, StoreResult};

/// Fixed-size, byte-addressed, durable storage
pub trait StorageMedium {
    /// Total addressable bytes
    fn capacity(&self) -> usize;

    /// Fill `buf` from `offset`
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> StoreResult<()>;

    /// Write `data` at `offset`
    fn write(&mut self, offset: usize, data: &[u8]) -> StoreResult<()>;

    /// Make prior writes durable
    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

fn check_bounds(offset: usize, len: usize, capacity: usize) -> StoreResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(StoreError::Medium {
            reason: "access beyond end of medium",
        }),
    }
}

/// In-memory medium of `BYTES` bytes
///
/// Starts erased (`0xFF`), like a fresh EEPROM. Counts write calls so tests
/// can check how much wear an operation causes.
#[derive(Clone)]
pub struct MemoryMedium<const BYTES: usize> {
    bytes: [u8; BYTES],
    writes: u32,
}

impl<const BYTES: usize> MemoryMedium<BYTES> {
    /// Erased medium
    pub const fn new() -> Self {
        Self {
            bytes: [0xFF; BYTES],
            writes: 0,
        }
    }

    /// Raw contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of write calls so far
    pub fn write_count(&self) -> u32 {
        self.writes
    }
}

impl<const BYTES: usize> Default for MemoryMedium<BYTES> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const BYTES: usize> StorageMedium for MemoryMedium<BYTES> {
    fn capacity(&self) -> usize {
        BYTES
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> StoreResult<()> {
        check_bounds(offset, buf.len(), BYTES)?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> StoreResult<()> {
        check_bounds(offset, data.len(), BYTES)?;
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        self.writes = self.writes.wrapping_add(1);
        Ok(())
    }
}

/// File-backed medium for hosts
///
/// The file is created on first use and sized to the requested capacity;
/// new bytes read as zero, which the store treats as an unformatted region.
#[cfg(feature = "std")]
pub struct FileMedium {
    file: std::fs::File,
    capacity: usize,
}

#[cfg(feature = "std")]
impl FileMedium {
    /// Open or create `path` holding `capacity` bytes
    pub fn open<P: AsRef<std::path::Path>>(path: P, capacity: usize) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        if len != capacity as u64 {
            file.set_len(capacity as u64)?;
        }

        Ok(Self { file, capacity })
    }
}

#[cfg(feature = "std")]
impl StorageMedium for FileMedium {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> StoreResult<()> {
        use std::io::{Read, Seek, SeekFrom};

        check_bounds(offset, buf.len(), self.capacity)?;
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .and_then(|_| self.file.read_exact(buf))
            .map_err(|e| {
                log_warn!("store file read at {} failed: {}", offset, e);
                StoreError::Medium { reason: "file read failed" }
            })
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> StoreResult<()> {
        use std::io::{Seek, SeekFrom, Write};

        check_bounds(offset, data.len(), self.capacity)?;
        self.file
            .seek(SeekFrom::Start(offset as u64))
            .and_then(|_| self.file.write_all(data))
            .map_err(|e| {
                log_warn!("store file write at {} failed: {}", offset, e);
                StoreError::Medium { reason: "file write failed" }
            })
    }

    fn flush(&mut self) -> StoreResult<()> {
        self.file.sync_data().map_err(|e| {
            log_warn!("store file sync failed: {}", e);
            StoreError::Medium { reason: "file sync failed" }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_medium_starts_erased() {
        let medium = MemoryMedium::<16>::new();
        assert!(medium.as_bytes().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn memory_medium_round_trip() {
        let mut medium = MemoryMedium::<16>::new();
        medium.write(4, &[1, 2, 3]).unwrap();

        let mut buf = [0u8; 3];
        medium.read(4, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(medium.write_count(), 1);
    }

    #[test]
    fn memory_medium_rejects_out_of_bounds() {
        let mut medium = MemoryMedium::<8>::new();
        assert!(medium.write(6, &[0; 4]).is_err());
        assert!(medium.read(usize::MAX, &mut [0; 2]).is_err());
        assert_eq!(medium.write_count(), 0);
    }

    #[test]
    fn file_medium_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");

        {
            let mut medium = FileMedium::open(&path, 32).unwrap();
            medium.write(10, &[0xAB, 0xCD]).unwrap();
            medium.flush().unwrap();
        }

        let mut medium = FileMedium::open(&path, 32).unwrap();
        assert_eq!(medium.capacity(), 32);
        let mut buf = [0u8; 2];
        medium.read(10, &mut buf).unwrap();
        assert_eq!(buf, [0xAB, 0xCD]);
    }
}
