//! Error Types for Store, Delivery and Configuration Failures
//!
//! ## Design Philosophy
//!
//! Errors in the core never escape the control loop. Each one is absorbed
//! where it happens and turned into a state transition, a dropped reading or
//! a retained configuration. The types therefore stay:
//!
//! 1. **Small**: at most a status code of payload, so they can be stored in
//!    tick reports without thinking about it.
//!
//! 2. **Heap-free**: only `&'static str` for messages.
//!
//! 3. **Copy**: returned by value from every operation.
//!
//! ## Error Categories
//!
//! | Error                        | Recovery                                  |
//! |------------------------------|-------------------------------------------|
//! | `TransportError::NotConnected` | defer to local persistence (`Unreachable`) |
//! | `TransportError::Status`     | defer to local persistence (`Rejected`)   |
//! | `StoreError::Full`           | drop the newest reading, continue         |
//! | `ConfigError::*`             | keep the last known good schedule         |
//!
//! Sensor faults are not represented here: they halt the acquisition
//! collaborator before the core ever sees a sample.

use thiserror_no_std::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable ring store errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Every slot holds an undelivered record; the new one was not written
    #[error("Store full: {capacity} records pending")]
    Full {
        /// Fixed capacity of the store
        capacity: usize,
    },

    /// Backing medium cannot hold the header plus every record slot
    #[error("Medium too small: need {required} bytes, have {available}")]
    MediumTooSmall {
        /// Bytes the layout requires
        required: usize,
        /// Bytes the medium offers
        available: usize,
    },

    /// Backing medium refused a read or write
    #[error("Storage medium failure: {reason}")]
    Medium {
        /// What the medium was doing
        reason: &'static str,
    },
}

/// Transport-level delivery errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No network link; nothing was attempted
    #[error("Not connected")]
    NotConnected,

    /// The far end answered with a non-success status
    #[error("Rejected with status {0}")]
    Status(u16),

    /// The attempt was made but failed before a status arrived
    #[error("Transport failure: {reason}")]
    Failed {
        /// Short description of the failure
        reason: &'static str,
    },
}

/// Remote configuration fetch errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Collector unreachable; when the link is known down no request is made
    #[error("Configuration service unreachable")]
    Unreachable,

    /// Service answered with a status other than 200
    #[error("Configuration request failed with status {0}")]
    Status(u16),

    /// Body missing a field or carrying an invalid value
    #[error("Malformed configuration: {0}")]
    Malformed(&'static str),
}

#[cfg(feature = "defmt")]
impl defmt::Format for StoreError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Full { capacity } =>
                defmt::write!(fmt, "Store full ({} records)", capacity),
            Self::MediumTooSmall { required, available } =>
                defmt::write!(fmt, "Medium too small: {} < {}", available, required),
            Self::Medium { reason } =>
                defmt::write!(fmt, "Medium: {}", reason),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TransportError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NotConnected => defmt::write!(fmt, "Not connected"),
            Self::Status(code) => defmt::write!(fmt, "Rejected: {}", code),
            Self::Failed { reason } => defmt::write!(fmt, "Transport: {}", reason),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Unreachable => defmt::write!(fmt, "Config unreachable"),
            Self::Status(code) => defmt::write!(fmt, "Config status {}", code),
            Self::Malformed(reason) => defmt::write!(fmt, "Config malformed: {}", reason),
        }
    }
}
