//! Durable Ring Store for Undelivered Readings
//!
//! ## Overview
//!
//! Readings that could not be delivered are appended here and replayed in
//! bulk when connectivity returns. The store has a fixed capacity chosen at
//! compile time through const generics and writes through to a
//! [`StorageMedium`] so the backlog survives power loss.
//!
//! ## Design Rationale
//!
//! ### Why Not Overwrite When Full?
//!
//! A history buffer for validation can happily discard its oldest sample. A
//! store-and-forward queue cannot: every slot holds a reading nobody has
//! received yet. So `append` on a full store is rejected and the *newest*
//! reading is dropped, keeping whatever is already queued in arrival order.
//! Capacity comes back through one of two doors:
//!
//! 1. **Drain**: a replay delivered every record, the caller clears.
//! 2. **Expiry**: the oldest record is 24 hours old, everything is discarded.
//!
//! ### Non-Destructive Drain
//!
//! [`RingStore::drain`] walks the live records oldest-first without removing
//! them. The caller decides whether the whole batch went through and only
//! then calls [`RingStore::clear`]. Partial success leaves the store intact,
//! which trades possible duplicates for never losing a reading.
//!
//! ### RAM Mirror
//!
//! Live records are kept in a RAM array as well as on the medium. Reads never
//! touch the medium after [`RingStore::open`], so a drain cannot fail halfway.
//! The medium only sees writes.
//!
//! ### Write Ordering
//!
//! `append` writes the record slot first and the header count second. A power
//! cut between the two leaves the old count on the medium, so the half-written
//! slot is simply invisible after reboot.
//!
//! ## Usage Example
//!
//! ```rust
//! use pulseguard_core::{MemoryMedium, Reading, RingStore};
//!
//! let medium = MemoryMedium::<{ 4 + 2 * 8 }>::new();
//! let mut store: RingStore<_, 2> = RingStore::open(medium, 0).unwrap();
//!
//! store.append(Reading::new(71.0, 98.0), 1_000).unwrap();
//! store.append(Reading::new(74.0, 97.0), 2_000).unwrap();
//! assert!(store.append(Reading::new(80.0, 96.0), 3_000).is_err());
//!
//! let backlog: Vec<Reading> = store.drain().collect();
//! assert_eq!(backlog.len(), 2);
//! store.clear();
//! assert!(store.is_empty());
//! ```

use crate::constants::buffers::{region_bytes, HEADER_BYTES, RECORD_BYTES, STORE_MAGIC};
use crate::constants::time::STORE_STALE_AFTER_MS;
use crate::errors::{StoreError, StoreResult};
use crate::medium::StorageMedium;
use crate::reading::Reading;
use crate::time::{elapsed_ms, Timestamp};

/// Fixed-capacity, append-indexed persistent record store
///
/// ## Type Parameters
///
/// - `M`: the backing medium
/// - `N`: capacity in records, `1..=65535`
///
/// ## Internal Invariants
///
/// - `count <= N`
/// - `first_write.is_some()` exactly when `count > 0`
/// - slots `0..count` hold live records in arrival order
pub struct RingStore<M, const N: usize> {
    medium: M,
    records: [Reading; N],
    count: usize,
    first_write: Option<Timestamp>,
    stale_after_ms: u64,
}

impl<M: StorageMedium, const N: usize> RingStore<M, N> {
    const VALID_CAPACITY: () = assert!(N > 0 && N <= u16::MAX as usize, "store capacity must be 1..=65535");

    /// Open a store on `medium`, recovering any records a previous run left
    ///
    /// A region without the store magic, or with an impossible count, is
    /// formatted empty. Recovered records restart their staleness clock at
    /// `now`: monotonic time does not survive a reboot.
    pub fn open(mut medium: M, now: Timestamp) -> StoreResult<Self> {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_CAPACITY;

        let required = region_bytes(N);
        if medium.capacity() < required {
            return Err(StoreError::MediumTooSmall {
                required,
                available: medium.capacity(),
            });
        }

        let mut header = [0u8; HEADER_BYTES];
        medium.read(0, &mut header)?;
        let magic = u16::from_le_bytes([header[0], header[1]]);
        let stored = u16::from_le_bytes([header[2], header[3]]) as usize;

        let mut store = Self {
            medium,
            records: [Reading::new(0.0, 0.0); N],
            count: 0,
            first_write: None,
            stale_after_ms: STORE_STALE_AFTER_MS,
        };

        if magic != STORE_MAGIC || stored > N {
            log_info!("formatting store region ({} slots)", N);
            store.write_count(0)?;
            store.medium.flush()?;
            return Ok(store);
        }

        for slot in 0..stored {
            let mut raw = [0u8; RECORD_BYTES];
            store.medium.read(Self::slot_offset(slot), &mut raw)?;
            store.records[slot] = decode(&raw);
        }
        store.count = stored;
        if stored > 0 {
            store.first_write = Some(now);
            log_info!("recovered {} queued readings", stored);
        }

        Ok(store)
    }

    /// Override the staleness threshold (default 24 hours)
    pub fn with_stale_after(mut self, ms: u64) -> Self {
        self.stale_after_ms = ms;
        self
    }

    /// Queue a reading, returning its slot index
    ///
    /// Rejected with [`StoreError::Full`] when every slot is live; the store
    /// is not touched in that case.
    pub fn append(&mut self, reading: Reading, now: Timestamp) -> StoreResult<usize> {
        if self.count == N {
            return Err(StoreError::Full { capacity: N });
        }

        let slot = self.count;
        self.medium.write(Self::slot_offset(slot), &encode(&reading))?;
        self.write_count(slot + 1)?;
        self.medium.flush()?;

        self.records[slot] = reading;
        self.count = slot + 1;
        if slot == 0 {
            self.first_write = Some(now);
        }

        Ok(slot)
    }

    /// Iterate live records oldest-first without removing them
    pub fn drain(&self) -> Drain<'_> {
        Drain {
            records: &self.records[..self.count],
            index: 0,
        }
    }

    /// Forget every record
    ///
    /// The RAM state is always reset. A medium failure is logged; the old
    /// records would then reappear after a reboot and be delivered twice,
    /// never lost.
    pub fn clear(&mut self) {
        self.count = 0;
        self.first_write = None;

        if let Err(_e) = self.write_count(0).and_then(|_| self.medium.flush()) {
            log_warn!("store clear not persisted: {}", _e);
        }
    }

    /// Discard everything once the oldest record reaches the staleness age
    ///
    /// Returns how many records were discarded. Idempotent.
    pub fn expire_if_stale(&mut self, now: Timestamp) -> Option<usize> {
        let first = self.first_write?;
        if elapsed_ms(first, now) < self.stale_after_ms {
            return None;
        }

        let discarded = self.count;
        self.clear();
        Some(discarded)
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.count
    }

    /// No live records
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Every slot is live
    pub fn is_full(&self) -> bool {
        self.count == N
    }

    /// Fixed capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Monotonic time of the first write since the last reset
    pub fn first_write(&self) -> Option<Timestamp> {
        self.first_write
    }

    /// Live record at `slot`
    pub fn get(&self, slot: usize) -> Option<&Reading> {
        self.records[..self.count].get(slot)
    }

    /// Backing medium
    pub fn medium(&self) -> &M {
        &self.medium
    }

    /// Give the medium back
    pub fn into_medium(self) -> M {
        self.medium
    }

    fn slot_offset(slot: usize) -> usize {
        HEADER_BYTES + slot * RECORD_BYTES
    }

    fn write_count(&mut self, count: usize) -> StoreResult<()> {
        let mut header = [0u8; HEADER_BYTES];
        header[..2].copy_from_slice(&STORE_MAGIC.to_le_bytes());
        header[2..].copy_from_slice(&(count as u16).to_le_bytes());
        self.medium.write(0, &header)
    }
}

fn encode(reading: &Reading) -> [u8; RECORD_BYTES] {
    let mut raw = [0u8; RECORD_BYTES];
    raw[..4].copy_from_slice(&reading.bpm.to_le_bytes());
    raw[4..].copy_from_slice(&reading.spo2.to_le_bytes());
    raw
}

fn decode(raw: &[u8; RECORD_BYTES]) -> Reading {
    Reading::new(
        f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
        f32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
    )
}

/// Oldest-first iterator over live records
pub struct Drain<'a> {
    records: &'a [Reading],
    index: usize,
}

impl Iterator for Drain<'_> {
    type Item = Reading;

    fn next(&mut self) -> Option<Self::Item> {
        let reading = *self.records.get(self.index)?;
        self.index += 1;
        Some(reading)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.records.len() - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Drain<'_> {}
