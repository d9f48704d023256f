//! Core engine for PulseGuard
//!
//! Runs an unattended biometric monitor: every cycle it waits for a valid
//! reading, tries to deliver it, and falls back to a bounded, durable local
//! store when the network is unavailable. Queued readings are replayed in bulk
//! as soon as connectivity returns.
//!
//! Key constraints:
//! - Single-threaded, tick-driven control loop (no threads, no locks)
//! - No heap allocation in the loop
//! - No reading is lost silently: every drop is logged and counted
//!
//! ```no_run
//! use pulseguard_core::{
//!     DeliveryGateway, Monitor, MonitorSettings, RingStore, ScheduleConfig, SystemClock,
//! };
//! # use pulseguard_core::{Acquisition, ConfigSource, Estimator, StorageMedium, Transport};
//! # fn wire<T, C, E, A, M>(transport: T, config: C, estimator: E, acquisition: A, medium: M)
//! # where T: Transport, C: ConfigSource, E: Estimator, A: Acquisition, M: StorageMedium {
//! let clock = SystemClock::new(-7);
//! let Ok(store) = RingStore::<_, 255>::open(medium, 0) else { return };
//! let gateway = DeliveryGateway::new("e00fce68d1b2c3a4f5e6d7c8", transport);
//!
//! let mut monitor: Monitor<_, _, _, _, _, _, 255> = Monitor::new(
//!     gateway,
//!     store,
//!     config,
//!     estimator,
//!     acquisition,
//!     ScheduleConfig::default(),
//!     MonitorSettings::default(),
//! );
//!
//! loop {
//!     let report = monitor.tick(&clock);
//!     if let Some(transition) = report.transition {
//!         println!("{:?} -> {:?}", transition.from, transition.to);
//!     }
//! }
//! # }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

// Macros for optional logging
#[cfg(feature = "log")]
macro_rules! log_info {
    ($($arg:tt)*) => { log::info!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_info {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

pub mod accumulator;
pub mod constants;
pub mod errors;
pub mod gateway;
pub mod machine;
pub mod medium;
pub mod monitor;
pub mod reading;
pub mod schedule;
pub mod store;
pub mod time;
pub mod traits;

// Public API
pub use accumulator::{Sample, SampleAccumulator};
pub use errors::{ConfigError, StoreError, TransportError};
pub use gateway::{BatchOutcome, DeliveryGateway, GatewayStats, NoTransport, Publish};
pub use machine::{Cause, CycleEffects, CycleMachine, CycleState, Offer, Transition};
pub use medium::{MemoryMedium, StorageMedium};
pub use monitor::{ConfigRefresh, Monitor, MonitorSettings, MonitorStats, ReadingOutcome, TickReport};
pub use reading::{DeviceId, Estimate, Reading};
pub use schedule::{ActiveWindow, ScheduleConfig, SchedulePolicy};
pub use store::RingStore;
pub use time::{Clock, FixedTime, TimeOfDay, Timestamp};
#[cfg(feature = "std")]
pub use time::SystemClock;
pub use traits::{Acquisition, ConfigSource, Estimator, Transport};

#[cfg(feature = "std")]
pub use medium::FileMedium;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
