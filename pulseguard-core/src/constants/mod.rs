//! Constants for PulseGuard Core
//!
//! Centralised numeric values for the control loop. Every default that
//! `MonitorSettings`, `ScheduleConfig` and the ring store use lives here, with
//! its unit in the name.
//!
//! ## Organization
//!
//! - **Time**: unit conversions, loop cadence and timeouts
//! - **Buffers**: store capacity, persisted layout and sample windows
//! - **Delivery**: confirmation bound and channel names

/// Time-related constants for intervals, timeouts and schedules.
pub mod time;

/// Store capacity, persisted layout and sample window sizes.
pub mod buffers;

/// Delivery policy constants and channel names.
pub mod delivery;

pub use time::{
    MS_PER_SECOND, MS_PER_MINUTE, MS_PER_HOUR, MS_PER_DAY,
    STEP_INTERVAL_MS, REQUEST_TIMEOUT_MS, DEFAULT_CADENCE_MS,
    STORE_STALE_AFTER_MS, REPLAY_BACKOFF_MS,
};

pub use buffers::{
    DEFAULT_STORE_CAPACITY, SAMPLE_WINDOW_SIZE, SENSOR_FIFO_DEPTH, RECORD_BYTES, HEADER_BYTES,
};

pub use delivery::DEFAULT_ATTEMPT_BOUND;
