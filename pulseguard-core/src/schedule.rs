//! Schedule Policy: active window and measurement cadence
//!
//! ## Overview
//!
//! Two questions gate every measurement cycle:
//!
//! 1. Is the current time of day inside the active window? Outside it the
//!    cycle state machine is frozen. Replay of queued readings and store
//!    expiry keep running regardless.
//! 2. Has the cooldown since the cycle parked in `Waiting` elapsed?
//!
//! Both answers come from a [`ScheduleConfig`] that only the configuration
//! service may change. A failed or malformed fetch leaves the previous config
//! in place.
//!
//! ## Window Semantics
//!
//! The window is inclusive at both ends and does **not** wrap midnight:
//!
//! ```text
//! start=06:00 end=22:00    05:59 ✗   06:00 ✓   22:00 ✓   22:01 ✗
//! start=22:00 end=06:00    23:00 ✗   03:00 ✗   (never active)
//! ```
//!
//! The second row is a known quirk of the deployed configuration format and
//! is kept as-is; see [`ActiveWindow::contains`].

use crate::constants::time::{
    DEFAULT_CADENCE_MS, DEFAULT_WINDOW_END, DEFAULT_WINDOW_START, MS_PER_MINUTE,
};
use crate::errors::ConfigError;
use crate::time::{elapsed_ms, TimeOfDay, Timestamp};

/// Time-of-day interval during which new cycles may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    /// First active minute
    pub start: TimeOfDay,
    /// Last active minute
    pub end: TimeOfDay,
}

impl ActiveWindow {
    /// New window
    pub const fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    /// `start <= now <= end`
    ///
    /// With `end < start` nothing is ever inside: the window does not wrap
    /// past midnight.
    pub fn contains(&self, now: TimeOfDay) -> bool {
        now >= self.start && now <= self.end
    }

    /// `end` is earlier than `start`
    pub fn is_inverted(&self) -> bool {
        self.end < self.start
    }
}

impl Default for ActiveWindow {
    fn default() -> Self {
        let start = TimeOfDay::from_hm(DEFAULT_WINDOW_START.0, DEFAULT_WINDOW_START.1)
            .unwrap_or(TimeOfDay::MIDNIGHT);
        let end = TimeOfDay::from_hm(DEFAULT_WINDOW_END.0, DEFAULT_WINDOW_END.1)
            .unwrap_or(TimeOfDay::MIDNIGHT);
        Self { start, end }
    }
}

/// Operating window plus measurement cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Minimum time between the end of one cycle and the start of the next
    pub cadence_ms: u64,
    /// When cycles may run
    pub window: ActiveWindow,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cadence_ms: DEFAULT_CADENCE_MS,
            window: ActiveWindow::default(),
        }
    }
}

impl ScheduleConfig {
    /// Build from the configuration service's field values
    ///
    /// The service expresses the cadence in whole minutes and the window
    /// bounds as `HH:MM` strings.
    ///
    /// ```rust
    /// use pulseguard_core::ScheduleConfig;
    ///
    /// let config = ScheduleConfig::from_remote(15, "07:30", "21:00").unwrap();
    /// assert_eq!(config.cadence_ms, 15 * 60_000);
    /// assert!(ScheduleConfig::from_remote(0, "07:30", "21:00").is_err());
    /// ```
    pub fn from_remote(interval_minutes: u32, start: &str, end: &str) -> Result<Self, ConfigError> {
        if interval_minutes == 0 {
            return Err(ConfigError::Malformed("measurement interval must be positive"));
        }

        Ok(Self {
            cadence_ms: interval_minutes as u64 * MS_PER_MINUTE,
            window: ActiveWindow::new(TimeOfDay::parse(start)?, TimeOfDay::parse(end)?),
        })
    }
}

/// Answers the two scheduling questions of the control loop
#[derive(Debug, Clone, Default)]
pub struct SchedulePolicy {
    config: ScheduleConfig,
}

impl SchedulePolicy {
    /// Policy over `config`
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    /// Current config
    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Replace the config wholesale; returns `true` if anything changed
    pub fn update(&mut self, config: ScheduleConfig) -> bool {
        if config == self.config {
            return false;
        }

        if config.window.is_inverted() {
            log_warn!(
                "active window {}-{} ends before it starts; cycles will not run",
                config.window.start,
                config.window.end
            );
        }

        self.config = config;
        true
    }

    /// `now` falls inside the active window
    pub fn is_within_active_window(&self, now: TimeOfDay) -> bool {
        self.config.window.contains(now)
    }

    /// At least one cadence has passed since `last_cycle_start`
    pub fn has_cooldown_elapsed(&self, last_cycle_start: Timestamp, now: Timestamp) -> bool {
        elapsed_ms(last_cycle_start, now) >= self.config.cadence_ms
    }
}
