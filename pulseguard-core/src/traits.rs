//! Collaborator seams of the control loop
//!
//! The core owns scheduling, delivery policy and persistence. Everything that
//! touches hardware or the network sits behind one of these traits so the
//! loop can run against scripted fakes in tests. Keep them small - a device
//! port implements four methods and gets the whole machine.

use crate::accumulator::Sample;
use crate::errors::{ConfigError, TransportError};
use crate::reading::{DeviceId, Estimate, Reading};
use crate::schedule::ScheduleConfig;

/// One delivery path to the remote collector
///
/// `send` is synchronous. The transport enforces its own timeout; the core
/// never retries inside a call.
pub trait Transport {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Network link is up and the far end is believed reachable
    fn is_connected(&self) -> bool;

    /// Deliver one reading
    ///
    /// `Err(TransportError::NotConnected)` means nothing was attempted.
    fn send(&mut self, device: &DeviceId, reading: &Reading) -> Result<(), TransportError>;

    /// Service background protocol work (keep-alives, acks)
    ///
    /// Called once per control loop tick. Must not block.
    fn poll(&mut self) {}
}

/// One-shot remote configuration lookup
pub trait ConfigSource {
    /// Fetch the schedule for `device`
    fn fetch(&mut self, device: &DeviceId) -> Result<ScheduleConfig, ConfigError>;
}

/// Opaque biometric estimation algorithm
///
/// Consumes two parallel raw sample arrays of equal length and reports a
/// value plus a validity flag for each metric.
pub trait Estimator {
    /// Estimate heart rate and saturation for one window
    fn estimate(&mut self, ir: &[u32], red: &[u32]) -> Estimate;
}

/// Raw sensor FIFO
pub trait Acquisition {
    /// Next buffered sample, `None` when the FIFO is empty
    fn next_sample(&mut self) -> Option<Sample>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send(&mut self, device: &DeviceId, reading: &Reading) -> Result<(), TransportError> {
        (**self).send(device, reading)
    }

    fn poll(&mut self) {
        (**self).poll()
    }
}

#[cfg(feature = "std")]
impl<T: Transport + ?Sized> Transport for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send(&mut self, device: &DeviceId, reading: &Reading) -> Result<(), TransportError> {
        (**self).send(device, reading)
    }

    fn poll(&mut self) {
        (**self).poll()
    }
}

impl<T: ConfigSource + ?Sized> ConfigSource for &mut T {
    fn fetch(&mut self, device: &DeviceId) -> Result<ScheduleConfig, ConfigError> {
        (**self).fetch(device)
    }
}

#[cfg(feature = "std")]
impl<T: ConfigSource + ?Sized> ConfigSource for Box<T> {
    fn fetch(&mut self, device: &DeviceId) -> Result<ScheduleConfig, ConfigError> {
        (**self).fetch(device)
    }
}
