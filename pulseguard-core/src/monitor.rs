//! Control loop context
//!
//! ## Overview
//!
//! [`Monitor`] owns every piece of mutable state of the device: the cycle
//! machine, the store, the schedule, the accumulator and the collaborators.
//! Nothing lives in globals. The firmware main loop calls
//! [`Monitor::tick`] as often as it likes; each tick does, in order:
//!
//! ```text
//! (a) drain sensor FIFO ─► accumulator ─► estimator ─► offer reading
//!     pending config request ─► ConfigSource::fetch
//! (b) inside active window and step due? ─► machine.step (≤ 1 transition)
//! (c) connected, backlog queued, not backing off? ─► replay_all ─► clear
//! (d) store.expire_if_stale
//! ```
//!
//! Only (b) is gated by the active window. Replay and expiry run around the
//! clock.
//!
//! ## Failure Absorption
//!
//! `tick` never returns an error. Every failure turns into a state transition,
//! a counter in [`MonitorStats`] and a log line; the loop cannot stall.

use core::mem;

use crate::accumulator::SampleAccumulator;
use crate::constants::buffers::{SAMPLE_WINDOW_SIZE, SENSOR_FIFO_DEPTH};
use crate::constants::delivery::DEFAULT_ATTEMPT_BOUND;
use crate::constants::time::{
    REPLAY_BACKOFF_MS, REQUEST_TIMEOUT_MS, STEP_INTERVAL_MS, STORE_STALE_AFTER_MS,
};
use crate::errors::ConfigError;
use crate::gateway::{BatchOutcome, DeliveryGateway};
use crate::machine::{Cause, CycleMachine, CycleState, Offer, Transition};
use crate::medium::StorageMedium;
use crate::reading::Estimate;
use crate::schedule::{ScheduleConfig, SchedulePolicy};
use crate::store::RingStore;
use crate::time::{elapsed_ms, Clock, Timestamp};
use crate::traits::{Acquisition, ConfigSource, Estimator, Transport};

/// Loop tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Minimum spacing between state machine steps
    pub step_interval_ms: u64,
    /// Bounded wait for a valid reading
    pub request_timeout_ms: u64,
    /// Successful publishes required per reading
    pub attempt_bound: u8,
    /// Age of the oldest queued record at which the store is discarded
    pub stale_after_ms: u64,
    /// Wait after a partial replay before trying the backlog again
    pub replay_backoff_ms: u64,
    /// Request a config fetch on every completed sample window
    pub fetch_config_on_window: bool,
    /// Upper bound on samples pulled from acquisition per tick
    pub max_samples_per_tick: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            step_interval_ms: STEP_INTERVAL_MS,
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            attempt_bound: DEFAULT_ATTEMPT_BOUND,
            stale_after_ms: STORE_STALE_AFTER_MS,
            replay_backoff_ms: REPLAY_BACKOFF_MS,
            fetch_config_on_window: true,
            max_samples_per_tick: SENSOR_FIFO_DEPTH,
        }
    }
}

/// Cumulative counters since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Readings confirmed by the collector
    pub delivered: u32,
    /// Readings queued after failed delivery
    pub persisted: u32,
    /// Readings lost because the store could not take them
    pub dropped: u32,
    /// Cycles that ended without a valid reading
    pub timeouts: u32,
    /// Valid readings ignored because no cycle was waiting for one
    pub discarded: u32,
    /// Queued readings delivered by replay
    pub replayed: u32,
    /// Replay passes that left the backlog in place
    pub partial_replays: u32,
    /// Queued readings discarded as stale
    pub expired: u32,
    /// Config fetches that changed the schedule
    pub config_updates: u32,
    /// Config fetches that failed
    pub config_failures: u32,
}

/// What happened to a completed sample window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadingOutcome {
    /// Estimator did not trust both metrics
    Invalid,
    /// Became the in-flight reading
    Accepted,
    /// Valid, but the machine was in this state
    Discarded(CycleState),
    /// Valid, but outside the active window
    OutsideWindow,
}

/// Result of a configuration fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigRefresh {
    /// New schedule installed
    Updated,
    /// Fetched schedule equals the current one
    Unchanged,
    /// Previous schedule kept
    Failed(ConfigError),
}

/// Everything one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    /// Samples pulled from acquisition
    pub samples: usize,
    /// Outcome of the last sample window completed this tick
    pub reading: Option<ReadingOutcome>,
    /// Config fetch performed this tick
    pub config: Option<ConfigRefresh>,
    /// Time of day was inside the active window
    pub in_window: bool,
    /// Transition fired by the state machine step
    pub transition: Option<Transition>,
    /// Replay pass performed this tick
    pub replay: Option<BatchOutcome>,
    /// Records discarded by staleness expiry
    pub expired: usize,
}

/// Single-threaded control loop over one device
///
/// ## Type Parameters
///
/// - `P`, `S`: primary and secondary transport
/// - `M`: store medium, `N` store capacity
/// - `C`: configuration source
/// - `E`: estimator, `A`: acquisition, `W`: sample window size
pub struct Monitor<P, S, M, C, E, A, const N: usize, const W: usize = SAMPLE_WINDOW_SIZE> {
    gateway: DeliveryGateway<P, S>,
    store: RingStore<M, N>,
    config_source: C,
    estimator: E,
    acquisition: A,
    accumulator: SampleAccumulator<W>,
    policy: SchedulePolicy,
    machine: CycleMachine,
    settings: MonitorSettings,
    stats: MonitorStats,
    config_requested: bool,
    last_step: Option<Timestamp>,
    replay_not_before: Timestamp,
}

impl<P, S, M, C, E, A, const N: usize, const W: usize> Monitor<P, S, M, C, E, A, N, W>
where
    P: Transport,
    S: Transport,
    M: StorageMedium,
    C: ConfigSource,
    E: Estimator,
    A: Acquisition,
{
    /// Wire a monitor; the machine starts `Idle` and arms on its first
    /// in-window step
    pub fn new(
        gateway: DeliveryGateway<P, S>,
        store: RingStore<M, N>,
        config_source: C,
        estimator: E,
        acquisition: A,
        schedule: ScheduleConfig,
        settings: MonitorSettings,
    ) -> Self {
        let machine = CycleMachine::idle()
            .with_attempt_bound(settings.attempt_bound)
            .with_request_timeout(settings.request_timeout_ms);

        Self {
            gateway,
            store: store.with_stale_after(settings.stale_after_ms),
            config_source,
            estimator,
            acquisition,
            accumulator: SampleAccumulator::new(),
            policy: SchedulePolicy::new(schedule),
            machine,
            settings,
            stats: MonitorStats::default(),
            config_requested: false,
            last_step: None,
            replay_not_before: 0,
        }
    }

    /// Run one control loop iteration
    pub fn tick<K: Clock + ?Sized>(&mut self, clock: &K) -> TickReport {
        let now = clock.now();
        let mut report = TickReport {
            in_window: self.policy.is_within_active_window(clock.time_of_day()),
            ..TickReport::default()
        };

        self.gateway.poll();

        // (a) acquisition
        while report.samples < self.settings.max_samples_per_tick {
            let Some(sample) = self.acquisition.next_sample() else {
                break;
            };
            report.samples += 1;

            if let Some(estimate) = self.accumulator.push(sample, &mut self.estimator) {
                if self.settings.fetch_config_on_window {
                    self.config_requested = true;
                }
                report.reading = Some(self.offer(estimate, now, report.in_window));
            }
        }

        if mem::take(&mut self.config_requested) {
            report.config = Some(self.refresh_config());
        }

        // (b) state machine, window-gated
        if report.in_window && self.step_due(now) {
            self.last_step = Some(now);
            let mut effects = (&mut self.gateway, &mut self.store);
            report.transition = self.machine.step(now, &self.policy, &mut effects);
            if let Some(transition) = report.transition {
                self.count(transition);
            }
        }

        // (c) replay
        report.replay = self.replay(now);

        // (d) expiry
        if let Some(discarded) = self.store.expire_if_stale(now) {
            log_warn!("discarded {} queued readings older than {} ms", discarded, self.settings.stale_after_ms);
            self.stats.expired += discarded as u32;
            report.expired = discarded;
        }

        report
    }

    /// Queue a configuration fetch for the next tick
    ///
    /// Called on the inbound "configuration changed" event.
    pub fn notify_config_changed(&mut self) {
        log_info!("configuration change notified");
        self.config_requested = true;
    }

    fn offer(&mut self, estimate: Estimate, now: Timestamp, in_window: bool) -> ReadingOutcome {
        let Some(reading) = estimate.reading() else {
            return ReadingOutcome::Invalid;
        };

        if !in_window {
            self.stats.discarded += 1;
            return ReadingOutcome::OutsideWindow;
        }

        match self.machine.offer(reading, now) {
            Offer::Accepted(_) => {
                log_info!("reading accepted: bpm={} spo2={}", reading.bpm, reading.spo2);
                ReadingOutcome::Accepted
            }
            Offer::Discarded(state) => {
                self.stats.discarded += 1;
                ReadingOutcome::Discarded(state)
            }
        }
    }

    fn refresh_config(&mut self) -> ConfigRefresh {
        match self.config_source.fetch(self.gateway.device()) {
            Ok(config) => {
                if self.policy.update(config) {
                    log_info!(
                        "schedule updated: every {} ms, {}-{}",
                        config.cadence_ms,
                        config.window.start,
                        config.window.end
                    );
                    self.stats.config_updates += 1;
                    ConfigRefresh::Updated
                } else {
                    ConfigRefresh::Unchanged
                }
            }
            Err(e) => {
                log_warn!("config fetch failed, keeping previous schedule: {}", e);
                self.stats.config_failures += 1;
                ConfigRefresh::Failed(e)
            }
        }
    }

    fn step_due(&self, now: Timestamp) -> bool {
        self.last_step
            .map_or(true, |last| elapsed_ms(last, now) >= self.settings.step_interval_ms)
    }

    fn count(&mut self, transition: Transition) {
        match transition.cause {
            Cause::Confirmed => self.stats.delivered += 1,
            Cause::Persisted { .. } => self.stats.persisted += 1,
            Cause::Dropped(_) => self.stats.dropped += 1,
            Cause::RequestTimedOut => self.stats.timeouts += 1,
            _ => {}
        }
    }

    fn replay(&mut self, now: Timestamp) -> Option<BatchOutcome> {
        if self.store.is_empty() || now < self.replay_not_before || !self.gateway.is_connected() {
            return None;
        }

        let outcome = self.gateway.replay_all(self.store.drain());
        match outcome {
            BatchOutcome::BatchDelivered { count } => {
                log_info!("replayed {} queued readings", count);
                self.store.clear();
                self.stats.replayed += count as u32;
            }
            BatchOutcome::BatchPartial { delivered: _delivered, pending: _pending } => {
                log_warn!(
                    "replay incomplete ({} delivered, {} pending); retrying in {} ms",
                    _delivered,
                    _pending,
                    self.settings.replay_backoff_ms
                );
                self.stats.partial_replays += 1;
                self.replay_not_before = now.saturating_add(self.settings.replay_backoff_ms);
            }
        }

        Some(outcome)
    }

    /// Current cycle state
    pub fn state(&self) -> CycleState {
        self.machine.state()
    }

    /// The cycle state machine
    pub fn machine(&self) -> &CycleMachine {
        &self.machine
    }

    /// The durable store
    pub fn store(&self) -> &RingStore<M, N> {
        &self.store
    }

    /// The delivery gateway
    pub fn gateway(&self) -> &DeliveryGateway<P, S> {
        &self.gateway
    }

    /// The delivery gateway, mutably
    pub fn gateway_mut(&mut self) -> &mut DeliveryGateway<P, S> {
        &mut self.gateway
    }

    /// Sample window in progress
    pub fn accumulator(&self) -> &SampleAccumulator<W> {
        &self.accumulator
    }

    /// Acquisition collaborator, mutably
    pub fn acquisition_mut(&mut self) -> &mut A {
        &mut self.acquisition
    }

    /// Configuration collaborator, mutably
    pub fn config_source_mut(&mut self) -> &mut C {
        &mut self.config_source
    }

    /// Active schedule
    pub fn schedule(&self) -> &ScheduleConfig {
        self.policy.config()
    }

    /// Loop tunables
    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Cumulative counters
    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }
}
