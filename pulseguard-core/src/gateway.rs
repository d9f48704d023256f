//! Delivery Gateway: single-shot publish and bulk replay
//!
//! ## Overview
//!
//! The gateway turns a [`Reading`] into at most one delivery attempt per
//! transport and classifies the result:
//!
//! | Outcome       | Meaning                                             |
//! |---------------|-----------------------------------------------------|
//! | `Delivered`   | a transport accepted the reading                    |
//! | `Rejected`    | an attempt reached the far end and was refused      |
//! | `Unreachable` | no transport was connected; nothing was attempted   |
//!
//! ## Transport Order
//!
//! ```text
//! publish(reading)
//!   ├─ nothing connected ─────────────────────────► Unreachable
//!   ├─ primary connected ── send ── Ok ───────────► Delivered
//!   │                         └─ Err ─┐
//!   └─ secondary connected ── send ◄──┘── Ok ─────► Delivered
//!                               └─ Err ───────────► Rejected
//! ```
//!
//! There is no retry inside `publish`. How often a reading is attempted is
//! the cycle state machine's business.
//!
//! ## Bulk Replay
//!
//! [`DeliveryGateway::replay_all`] publishes a whole backlog and only reports
//! [`BatchOutcome::BatchDelivered`] when every record went through. The
//! caller then clears the store; anything less leaves the store untouched and
//! the whole backlog is replayed again later.

use crate::errors::TransportError;
use crate::reading::{DeviceId, Reading};
use crate::traits::Transport;

/// Result of one publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// A transport accepted the reading
    Delivered,
    /// An attempt was made and refused
    Rejected,
    /// No transport connected; nothing attempted
    Unreachable,
}

/// Result of a bulk replay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every record was delivered; the store may be cleared
    BatchDelivered {
        /// Records delivered
        count: usize,
    },
    /// At least one record was not delivered; keep the store
    BatchPartial {
        /// Records delivered in this pass (will be sent again)
        delivered: usize,
        /// Records that failed or were never attempted
        pending: usize,
    },
}

/// Cumulative gateway counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    /// Readings accepted by a transport
    pub delivered: u32,
    /// Publishes that ended `Rejected`
    pub rejected: u32,
    /// Publishes that ended `Unreachable`
    pub unreachable: u32,
    /// Deliveries that needed the secondary transport
    pub fallbacks: u32,
}

/// Placeholder for a gateway without an alternate path
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransport;

impl Transport for NoTransport {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn send(&mut self, _device: &DeviceId, _reading: &Reading) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }
}

/// Primary transport plus an optional alternate path
pub struct DeliveryGateway<P, S = NoTransport> {
    device: DeviceId,
    primary: P,
    secondary: Option<S>,
    stats: GatewayStats,
}

impl<P: Transport> DeliveryGateway<P> {
    /// Gateway with a single delivery path
    pub fn new(device: impl Into<DeviceId>, primary: P) -> Self {
        Self {
            device: device.into(),
            primary,
            secondary: None,
            stats: GatewayStats::default(),
        }
    }

    /// Add the alternate delivery path
    pub fn with_secondary<S: Transport>(self, secondary: S) -> DeliveryGateway<P, S> {
        DeliveryGateway {
            device: self.device,
            primary: self.primary,
            secondary: Some(secondary),
            stats: self.stats,
        }
    }
}

impl<P: Transport, S: Transport> DeliveryGateway<P, S> {
    /// Device identity sent with every reading
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Any transport is connected
    pub fn is_connected(&self) -> bool {
        self.primary.is_connected() || self.secondary.as_ref().is_some_and(|s| s.is_connected())
    }

    /// Service transport background work
    pub fn poll(&mut self) {
        self.primary.poll();
        if let Some(secondary) = self.secondary.as_mut() {
            secondary.poll();
        }
    }

    /// Attempt delivery of one reading
    pub fn publish(&mut self, reading: &Reading) -> Publish {
        let mut attempted = false;

        if self.primary.is_connected() {
            match self.primary.send(&self.device, reading) {
                Ok(()) => {
                    self.stats.delivered += 1;
                    return Publish::Delivered;
                }
                Err(e) => {
                    attempted |= e != TransportError::NotConnected;
                    log_warn!("{} delivery failed: {}", self.primary.name(), e);
                }
            }
        }

        if let Some(secondary) = self.secondary.as_mut() {
            if secondary.is_connected() {
                match secondary.send(&self.device, reading) {
                    Ok(()) => {
                        log_info!("delivered via alternate path {}", secondary.name());
                        self.stats.delivered += 1;
                        self.stats.fallbacks += 1;
                        return Publish::Delivered;
                    }
                    Err(e) => {
                        attempted |= e != TransportError::NotConnected;
                        log_warn!("{} delivery failed: {}", secondary.name(), e);
                    }
                }
            }
        }

        if attempted {
            self.stats.rejected += 1;
            Publish::Rejected
        } else {
            self.stats.unreachable += 1;
            Publish::Unreachable
        }
    }

    /// Publish every record of a backlog, oldest first
    ///
    /// Rejections do not stop the pass; losing the link does, and the
    /// records not yet attempted count as pending.
    pub fn replay_all<I>(&mut self, records: I) -> BatchOutcome
    where
        I: IntoIterator<Item = Reading>,
    {
        let mut records = records.into_iter();
        let mut delivered = 0;
        let mut pending = 0;

        while let Some(reading) = records.next() {
            match self.publish(&reading) {
                Publish::Delivered => delivered += 1,
                Publish::Rejected => pending += 1,
                Publish::Unreachable => {
                    pending += 1 + records.by_ref().count();
                    break;
                }
            }
        }

        if pending == 0 {
            BatchOutcome::BatchDelivered { count: delivered }
        } else {
            BatchOutcome::BatchPartial { delivered, pending }
        }
    }

    /// Cumulative counters
    pub fn stats(&self) -> &GatewayStats {
        &self.stats
    }

    /// Primary transport
    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// Primary transport, mutably
    pub fn primary_mut(&mut self) -> &mut P {
        &mut self.primary
    }

    /// Alternate transport, if configured
    pub fn secondary(&self) -> Option<&S> {
        self.secondary.as_ref()
    }

    /// Alternate transport, mutably
    pub fn secondary_mut(&mut self) -> Option<&mut S> {
        self.secondary.as_mut()
    }
}
