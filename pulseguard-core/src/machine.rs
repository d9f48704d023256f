//! Measurement Cycle State Machine
//!
//! ## Overview
//!
//! One cycle takes one valid reading from acquisition to either the remote
//! collector or the local store, then parks until the cadence allows the next
//! cycle. Every path ends in `Waiting`; no failure stops the loop.
//!
//! ```text
//!            ┌──────────── cooldown elapsed ─────────────┐
//!            ▼                                           │
//!   Idle ─► AwaitingMeasurement ── request timeout ──► Waiting
//!            │ valid reading                        ▲ ▲   ▲
//!            ▼                                      │ │   │
//!          Delivering ── Delivered, bound reached ──┘ │   │
//!            │      │                                 │   │
//!  Delivered │      └─ Rejected / Unreachable ─► Persisting
//!            ▼                            (append, always moves on)
//!          Settled ── counted up to bound ────────────┘
//! ```
//!
//! ## Transition Table
//!
//! | State                 | Trigger                         | Next                  |
//! |-----------------------|---------------------------------|-----------------------|
//! | `Idle`                | first step                      | `AwaitingMeasurement` |
//! | `AwaitingMeasurement` | reading offered                 | `Delivering`          |
//! | `AwaitingMeasurement` | request timeout                 | `Waiting`             |
//! | `Delivering`          | `Delivered`, attempts < bound   | `Settled`             |
//! | `Delivering`          | `Delivered`, attempts == bound  | `Waiting`             |
//! | `Delivering`          | `Rejected` / `Unreachable`      | `Persisting`          |
//! | `Settled`             | step, attempts + 1 < bound      | `Settled`             |
//! | `Settled`             | step, attempts + 1 == bound     | `Waiting`             |
//! | `Persisting`          | append (any result)             | `Waiting`             |
//! | `Waiting`             | cooldown elapsed                | `AwaitingMeasurement` |
//!
//! Each call to [`CycleMachine::step`] fires at most one row. Offers arriving
//! in any state other than `AwaitingMeasurement` are discarded, so a cycle
//! carries at most one reading.
//!
//! ## Attempt Bound
//!
//! A cycle moves on once its reading has been counted `bound` times (default
//! 2). The first count is the successful publish; every later count is taken
//! in `Settled` without publishing again, so the collector stores each reading
//! exactly once. The counter resets when a reading is accepted, when the bound
//! is reached and when a failed delivery starts persisting.

use crate::constants::delivery::DEFAULT_ATTEMPT_BOUND;
use crate::constants::time::REQUEST_TIMEOUT_MS;
use crate::errors::{StoreError, StoreResult};
use crate::gateway::{DeliveryGateway, Publish};
use crate::medium::StorageMedium;
use crate::reading::Reading;
use crate::schedule::SchedulePolicy;
use crate::store::RingStore;
use crate::time::{elapsed_ms, Timestamp};
use crate::traits::Transport;

/// Externally visible cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleState {
    /// Not armed yet
    Idle,
    /// Waiting for a valid reading
    AwaitingMeasurement,
    /// A reading is about to be published
    Delivering,
    /// Parked until the cadence allows the next cycle
    Waiting,
    /// Delivery failed; the reading goes to the store
    Persisting,
    /// Delivered, more confirmations expected
    Settled,
}

/// Internal state, carrying the in-flight reading where there is one
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    AwaitingMeasurement,
    Delivering(Reading),
    Settled(Reading),
    Persisting(Reading),
    Waiting,
}

impl Phase {
    fn state(&self) -> CycleState {
        match self {
            Phase::Idle => CycleState::Idle,
            Phase::AwaitingMeasurement => CycleState::AwaitingMeasurement,
            Phase::Delivering(_) => CycleState::Delivering,
            Phase::Settled(_) => CycleState::Settled,
            Phase::Persisting(_) => CycleState::Persisting,
            Phase::Waiting => CycleState::Waiting,
        }
    }
}

/// Why a transition fired
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cause {
    /// Machine armed on its first step
    Armed,
    /// A valid reading was accepted
    ReadingAccepted,
    /// No valid reading within the request timeout
    RequestTimedOut,
    /// Publish succeeded; more confirmations expected
    Delivered {
        /// Successful attempts so far
        attempts: u8,
    },
    /// Publish succeeded and the attempt bound was reached
    Confirmed,
    /// Publish failed with this outcome
    DeliveryFailed(Publish),
    /// Settled reading counted again without another publish
    Counted {
        /// Attempts counted so far
        attempts: u8,
    },
    /// Reading written to the store
    Persisted {
        /// Store slot used
        slot: usize,
    },
    /// Reading could not be stored and is gone
    Dropped(StoreError),
    /// Cadence elapsed; next cycle begins
    CooldownElapsed,
}

/// One fired row of the transition table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// State before
    pub from: CycleState,
    /// State after
    pub to: CycleState,
    /// Trigger
    pub cause: Cause,
}

/// Result of offering a reading to the machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Offer {
    /// Reading became the cycle's in-flight reading
    Accepted(Transition),
    /// Reading ignored; the machine was in this state
    Discarded(CycleState),
}

/// Side effects the machine drives
///
/// Implemented for a `(gateway, store)` pair; tests substitute fakes.
pub trait CycleEffects {
    /// Attempt delivery
    fn publish(&mut self, reading: &Reading) -> Publish;

    /// Persist after failed delivery
    fn persist(&mut self, reading: Reading, now: Timestamp) -> StoreResult<usize>;
}

impl<P, S, M, const N: usize> CycleEffects for (&mut DeliveryGateway<P, S>, &mut RingStore<M, N>)
where
    P: Transport,
    S: Transport,
    M: StorageMedium,
{
    fn publish(&mut self, reading: &Reading) -> Publish {
        self.0.publish(reading)
    }

    fn persist(&mut self, reading: Reading, now: Timestamp) -> StoreResult<usize> {
        self.1.append(reading, now)
    }
}

/// The measurement cycle state machine
#[derive(Debug, Clone)]
pub struct CycleMachine {
    phase: Phase,
    since: Timestamp,
    attempts: u8,
    attempt_bound: u8,
    request_timeout_ms: u64,
}

impl CycleMachine {
    /// Machine in `AwaitingMeasurement`, request timer started at `now`
    pub fn new(now: Timestamp) -> Self {
        Self {
            phase: Phase::AwaitingMeasurement,
            since: now,
            attempts: 0,
            attempt_bound: DEFAULT_ATTEMPT_BOUND,
            request_timeout_ms: REQUEST_TIMEOUT_MS,
        }
    }

    /// Machine in `Idle`; the first step arms it
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            ..Self::new(0)
        }
    }

    /// Successful publishes required per reading (minimum 1)
    pub fn with_attempt_bound(mut self, bound: u8) -> Self {
        self.attempt_bound = bound.max(1);
        self
    }

    /// Bounded wait for a valid reading
    pub fn with_request_timeout(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    /// Current state
    pub fn state(&self) -> CycleState {
        self.phase.state()
    }

    /// Monotonic time the current state was entered
    pub fn state_since(&self) -> Timestamp {
        self.since
    }

    /// Successful attempts for the in-flight reading
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Reading currently in flight, if any
    pub fn in_flight(&self) -> Option<Reading> {
        match self.phase {
            Phase::Delivering(r) | Phase::Settled(r) | Phase::Persisting(r) => Some(r),
            _ => None,
        }
    }

    /// Offer a valid reading
    ///
    /// Only `AwaitingMeasurement` accepts. Anywhere else the reading is
    /// discarded: one reading per cycle, nothing re-enters `Delivering`
    /// mid-wait.
    pub fn offer(&mut self, reading: Reading, now: Timestamp) -> Offer {
        if self.phase != Phase::AwaitingMeasurement {
            log_debug!("reading discarded in {:?}", self.state());
            return Offer::Discarded(self.state());
        }

        self.attempts = 0;
        Offer::Accepted(self.enter(Phase::Delivering(reading), now, Cause::ReadingAccepted))
    }

    /// Fire at most one transition
    pub fn step<E: CycleEffects + ?Sized>(
        &mut self,
        now: Timestamp,
        policy: &SchedulePolicy,
        effects: &mut E,
    ) -> Option<Transition> {
        let (next, cause) = match self.phase {
            Phase::Idle => (Phase::AwaitingMeasurement, Cause::Armed),

            Phase::AwaitingMeasurement => {
                if elapsed_ms(self.since, now) < self.request_timeout_ms {
                    return None;
                }
                (Phase::Waiting, Cause::RequestTimedOut)
            }

            Phase::Delivering(reading) => match effects.publish(&reading) {
                Publish::Delivered => {
                    self.attempts = self.attempts.saturating_add(1);
                    if self.attempts >= self.attempt_bound {
                        self.attempts = 0;
                        (Phase::Waiting, Cause::Confirmed)
                    } else {
                        (Phase::Settled(reading), Cause::Delivered { attempts: self.attempts })
                    }
                }
                failed => {
                    self.attempts = 0;
                    (Phase::Persisting(reading), Cause::DeliveryFailed(failed))
                }
            },

            Phase::Settled(reading) => {
                self.attempts = self.attempts.saturating_add(1);
                if self.attempts >= self.attempt_bound {
                    self.attempts = 0;
                    (Phase::Waiting, Cause::Confirmed)
                } else {
                    (Phase::Settled(reading), Cause::Counted { attempts: self.attempts })
                }
            }

            Phase::Persisting(reading) => match effects.persist(reading, now) {
                Ok(slot) => (Phase::Waiting, Cause::Persisted { slot }),
                Err(e) => {
                    log_warn!("reading bpm={} spo2={} dropped: {}", reading.bpm, reading.spo2, e);
                    (Phase::Waiting, Cause::Dropped(e))
                }
            },

            Phase::Waiting => {
                if !policy.has_cooldown_elapsed(self.since, now) {
                    return None;
                }
                (Phase::AwaitingMeasurement, Cause::CooldownElapsed)
            }
        };

        Some(self.enter(next, now, cause))
    }

    fn enter(&mut self, next: Phase, now: Timestamp, cause: Cause) -> Transition {
        let transition = Transition {
            from: self.state(),
            to: next.state(),
            cause,
        };
        log_debug!("cycle {:?} -> {:?} ({:?})", transition.from, transition.to, cause);

        self.phase = next;
        self.since = now;
        transition
    }
}
