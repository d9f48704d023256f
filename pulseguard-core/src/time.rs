//! Time management for the control loop
//!
//! The loop needs two different notions of time:
//! - A monotonic millisecond counter for every timeout (request timeout,
//!   cooldown, store staleness). It never jumps when the wall clock is
//!   re-synchronised.
//! - The local time of day, used only to decide whether "now" falls inside
//!   the active window.
//!
//! Both come from one [`Clock`] so tests can script them together.

use core::fmt;

use crate::constants::time::{MINUTES_PER_DAY, MINUTES_PER_HOUR, MS_PER_MINUTE};
use crate::errors::ConfigError;

/// Timestamp in milliseconds since device boot (monotonic)
pub type Timestamp = u64;

/// Milliseconds elapsed from `earlier` to `later`, zero if `later` is older
pub fn elapsed_ms(earlier: Timestamp, later: Timestamp) -> u64 {
    later.saturating_sub(earlier)
}

/// Source of time for the control loop
pub trait Clock {
    /// Monotonic milliseconds since boot
    fn now(&self) -> Timestamp;

    /// Local wall-clock time of day
    fn time_of_day(&self) -> TimeOfDay;
}

/// Time of day with minute resolution
///
/// Stored as minutes since midnight, `0..1440`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    minutes: u16,
}

impl TimeOfDay {
    /// Midnight
    pub const MIDNIGHT: Self = Self { minutes: 0 };

    /// Build from hours and minutes, `None` when out of range
    pub const fn from_hm(hours: u8, minutes: u8) -> Option<Self> {
        if hours as u32 >= 24 || minutes as u32 >= MINUTES_PER_HOUR {
            return None;
        }
        Some(Self {
            minutes: hours as u16 * MINUTES_PER_HOUR as u16 + minutes as u16,
        })
    }

    /// Build from minutes since midnight, wrapping at one day
    pub const fn from_minutes(minutes: u32) -> Self {
        Self {
            minutes: (minutes % MINUTES_PER_DAY) as u16,
        }
    }

    /// Parse strict `HH:MM` notation
    ///
    /// ```rust
    /// use pulseguard_core::TimeOfDay;
    ///
    /// let t = TimeOfDay::parse("06:30").unwrap();
    /// assert_eq!(t.minutes_since_midnight(), 390);
    /// assert!(TimeOfDay::parse("6:30").is_err());
    /// assert!(TimeOfDay::parse("24:00").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let bytes = text.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(ConfigError::Malformed("time must be HH:MM"));
        }

        let digit = |b: u8| -> Result<u8, ConfigError> {
            if b.is_ascii_digit() {
                Ok(b - b'0')
            } else {
                Err(ConfigError::Malformed("time must be HH:MM"))
            }
        };

        let hours = digit(bytes[0])? * 10 + digit(bytes[1])?;
        let minutes = digit(bytes[3])? * 10 + digit(bytes[4])?;

        Self::from_hm(hours, minutes).ok_or(ConfigError::Malformed("time of day out of range"))
    }

    /// Minutes since midnight
    pub const fn minutes_since_midnight(&self) -> u16 {
        self.minutes
    }

    /// Hour component
    pub const fn hour(&self) -> u8 {
        (self.minutes / MINUTES_PER_HOUR as u16) as u8
    }

    /// Minute component
    pub const fn minute(&self) -> u8 {
        (self.minutes % MINUTES_PER_HOUR as u16) as u8
    }

    /// Advance by a number of milliseconds, wrapping past midnight
    pub fn advanced_by_ms(&self, ms: u64) -> Self {
        let extra = (ms / MS_PER_MINUTE) % MINUTES_PER_DAY as u64;
        Self::from_minutes(self.minutes as u32 + extra as u32)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Fixed clock for testing
///
/// Monotonic time and time of day advance together. Sub-minute remainders
/// are carried so repeated small advances still move the time of day.
#[derive(Debug, Clone)]
pub struct FixedTime {
    timestamp: Timestamp,
    day_start: Timestamp,
    base: TimeOfDay,
}

impl FixedTime {
    /// Clock at `timestamp` showing `time_of_day`
    pub fn new(timestamp: Timestamp, time_of_day: TimeOfDay) -> Self {
        Self {
            timestamp,
            day_start: timestamp,
            base: time_of_day,
        }
    }

    /// Jump monotonic time without touching the time of day
    pub fn set(&mut self, timestamp: Timestamp) {
        let tod = self.time_of_day();
        self.timestamp = timestamp;
        self.day_start = timestamp;
        self.base = tod;
    }

    /// Move the wall clock without touching monotonic time
    pub fn set_time_of_day(&mut self, time_of_day: TimeOfDay) {
        self.day_start = self.timestamp;
        self.base = time_of_day;
    }

    /// Advance both clocks
    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl Clock for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp
    }

    fn time_of_day(&self) -> TimeOfDay {
        self.base.advanced_by_ms(elapsed_ms(self.day_start, self.timestamp))
    }
}

/// Host clock: `Instant` for monotonic time, system time plus a fixed UTC
/// offset for the time of day
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: std::time::Instant,
    utc_offset: chrono::FixedOffset,
}

#[cfg(feature = "std")]
impl SystemClock {
    /// Clock for a device running at `utc_offset_hours` (e.g. `-7` for MST)
    ///
    /// Offsets outside ±23 hours fall back to UTC.
    pub fn new(utc_offset_hours: i32) -> Self {
        use chrono::Offset;

        let utc_offset = chrono::FixedOffset::east_opt(utc_offset_hours * 3600)
            .unwrap_or_else(|| chrono::Utc.fix());
        Self {
            origin: std::time::Instant::now(),
            utc_offset,
        }
    }
}

#[cfg(feature = "std")]
impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        self.origin.elapsed().as_millis() as Timestamp
    }

    fn time_of_day(&self) -> TimeOfDay {
        use chrono::Timelike;

        let local = chrono::Utc::now().with_timezone(&self.utc_offset);
        TimeOfDay::from_minutes(local.hour() * MINUTES_PER_HOUR + local.minute())
    }
}
