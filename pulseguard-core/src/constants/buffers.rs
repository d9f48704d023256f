//! Buffer Sizes and Persisted Layout
//!
//! The durable store is a fixed region on a byte-addressed medium (EEPROM on
//! the device, a file on a host):
//!
//! ```text
//! offset 0        2        4                 12                12+8*(N-1)
//!        ┌────────┬────────┬────────┬────────┬─────┬────────┬────────┐
//!        │ magic  │ count  │ bpm    │ spo2   │ ... │ bpm    │ spo2   │
//!        │ u16 LE │ u16 LE │ f32 LE │ f32 LE │     │ f32 LE │ f32 LE │
//!        └────────┴────────┴────────┴────────┴─────┴────────┴────────┘
//!          header            slot 0                   slot N-1
//! ```

// ===== PERSISTED LAYOUT =====

/// Bytes per persisted record: two `f32` values.
pub const RECORD_BYTES: usize = 8;

/// Bytes of header in front of the record slots.
pub const HEADER_BYTES: usize = 4;

/// Marks a formatted store region.
pub const STORE_MAGIC: u16 = 0x5047;

/// Default store capacity (records).
///
/// 255 records × 8 bytes + 4 header bytes = 2044 bytes, which fits the
/// 2047-byte emulated EEPROM of the reference board.
pub const DEFAULT_STORE_CAPACITY: usize = 255;

/// Emulated EEPROM size of the reference board (bytes).
pub const DEVICE_EEPROM_BYTES: usize = 2047;

/// Bytes a store of `capacity` records occupies on its medium.
pub const fn region_bytes(capacity: usize) -> usize {
    HEADER_BYTES + capacity * RECORD_BYTES
}

// ===== SAMPLE WINDOW =====

/// Paired samples per estimation window.
///
/// 25 samples per second for 4 seconds.
pub const SAMPLE_WINDOW_SIZE: usize = 100;

/// Depth of the optical sensor's hardware FIFO (samples).
///
/// Upper bound on samples drained per control loop tick.
pub const SENSOR_FIFO_DEPTH: usize = 32;

// ===== IDENTITY =====

/// Maximum length of a device identifier.
pub const DEVICE_ID_LEN: usize = 32;
