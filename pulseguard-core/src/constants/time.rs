//! Time-Related Constants
//!
//! Time intervals, durations and conversion factors used by the schedule
//! policy, the cycle state machine and the ring store expiry.

// ===== TIME UNIT CONVERSIONS =====

/// Milliseconds per second.
pub const MS_PER_SECOND: u64 = 1000;

/// Seconds per minute.
pub const SECONDS_PER_MINUTE: u32 = 60;

/// Minutes per hour.
pub const MINUTES_PER_HOUR: u32 = 60;

/// Hours per day.
pub const HOURS_PER_DAY: u32 = 24;

/// Minutes per day.
pub const MINUTES_PER_DAY: u32 = MINUTES_PER_HOUR * HOURS_PER_DAY;

/// Milliseconds per minute.
pub const MS_PER_MINUTE: u64 = MS_PER_SECOND * SECONDS_PER_MINUTE as u64;

/// Milliseconds per hour.
pub const MS_PER_HOUR: u64 = MS_PER_MINUTE * MINUTES_PER_HOUR as u64;

/// Milliseconds per day.
pub const MS_PER_DAY: u64 = MS_PER_HOUR * HOURS_PER_DAY as u64;

// ===== CONTROL LOOP =====

/// Minimum spacing between two state machine steps (milliseconds).
///
/// The loop itself spins as fast as samples arrive; the machine advances at
/// most once per step interval. Matches the status LED blink period.
pub const STEP_INTERVAL_MS: u64 = 500;

/// Bounded wait for a valid reading before giving up on a cycle (milliseconds).
///
/// A finger must be on the sensor long enough for the estimator to converge;
/// five minutes without a valid result ends the cycle.
pub const REQUEST_TIMEOUT_MS: u64 = 5 * MS_PER_MINUTE;

// ===== SCHEDULE DEFAULTS =====

/// Default measurement cadence (milliseconds).
///
/// One cycle every 30 minutes until the configuration service says otherwise.
pub const DEFAULT_CADENCE_MS: u64 = 30 * MS_PER_MINUTE;

/// Default start of the active window (hours, minutes).
pub const DEFAULT_WINDOW_START: (u8, u8) = (6, 0);

/// Default end of the active window (hours, minutes).
pub const DEFAULT_WINDOW_END: (u8, u8) = (22, 0);

// ===== STORE LIFETIME =====

/// Age of the oldest queued record after which the whole store is discarded.
///
/// 24 hours. Readings older than a day are clinically stale.
pub const STORE_STALE_AFTER_MS: u64 = MS_PER_DAY;

/// Wait after a partially failed replay before replaying again (milliseconds).
pub const REPLAY_BACKOFF_MS: u64 = MS_PER_MINUTE;
