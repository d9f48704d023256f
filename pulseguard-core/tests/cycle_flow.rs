//! End-to-end behaviour of the measurement cycle and the control loop
//!
//! Covers the delivery paths of one cycle, store-and-forward under a dead
//! link, replay on reconnection, expiry and configuration updates.

mod common;

use pulseguard_core::{
    constants::{MS_PER_DAY, REPLAY_BACKOFF_MS},
    machine::Cause,
    ActiveWindow, BatchOutcome, ConfigRefresh, CycleMachine, CycleState, DeliveryGateway,
    FixedTime, MemoryMedium, Monitor, MonitorSettings, NoTransport, Publish, Reading,
    ReadingOutcome, RingStore, ScheduleConfig, SchedulePolicy, StoreError, TransportError,
};

use common::{hm, Fifo, QueuedEstimator, ScriptedLink, StaticConfig};

const WINDOW: usize = 4;
const CADENCE_MS: u64 = 1_000;
const R: Reading = Reading::new(72.0, 97.0);

type Rig<const N: usize> =
    Monitor<ScriptedLink, NoTransport, MemoryMedium<64>, StaticConfig, QueuedEstimator, Fifo, N, WINDOW>;

fn store_with<const N: usize>(readings: &[Reading]) -> RingStore<MemoryMedium<64>, N> {
    let mut store = RingStore::open(MemoryMedium::new(), 0).unwrap();
    for reading in readings {
        store.append(*reading, 0).unwrap();
    }
    store
}

fn rig_with<const N: usize>(
    link: ScriptedLink,
    store: RingStore<MemoryMedium<64>, N>,
    config: StaticConfig,
) -> Rig<N> {
    let settings = MonitorSettings {
        step_interval_ms: 0,
        request_timeout_ms: 60_000,
        fetch_config_on_window: false,
        ..MonitorSettings::default()
    };

    Monitor::new(
        DeliveryGateway::new("e00fce68d1b2", link),
        store,
        config,
        QueuedEstimator::valid(R.bpm, R.spo2),
        Fifo::default(),
        ScheduleConfig { cadence_ms: CADENCE_MS, window: ActiveWindow::default() },
        settings,
    )
}

fn rig<const N: usize>(link: ScriptedLink) -> Rig<N> {
    rig_with(link, store_with(&[]), StaticConfig::failing())
}

fn noon() -> FixedTime {
    FixedTime::new(0, hm(12, 0))
}

/// Feed one window, then step until the cycle parks and re-arms.
///
/// Returns the cause of the transition into `Waiting`.
fn run_cycle<const N: usize>(monitor: &mut Rig<N>, clock: &mut FixedTime) -> Cause {
    monitor.acquisition_mut().fill(WINDOW);
    clock.advance(10);
    let report = monitor.tick(clock);
    assert_eq!(report.reading, Some(ReadingOutcome::Accepted));

    let mut parked = None;
    while parked.is_none() {
        clock.advance(10);
        if let Some(t) = monitor.tick(clock).transition {
            if t.to == CycleState::Waiting {
                parked = Some(t.cause);
            }
        }
    }

    clock.advance(CADENCE_MS);
    let report = monitor.tick(clock);
    assert_eq!(report.transition.map(|t| t.cause), Some(Cause::CooldownElapsed));

    parked.unwrap()
}

// ============================================================================
// Machine over a real gateway and store
// ============================================================================

#[test]
fn delivered_reading_settles_and_returns_to_waiting() {
    let mut gateway = DeliveryGateway::new("dev", ScriptedLink::online());
    let mut store = store_with::<4>(&[]);
    let policy = SchedulePolicy::default();
    let mut machine = CycleMachine::new(0);

    assert!(matches!(machine.offer(R, 0), pulseguard_core::Offer::Accepted(_)));
    {
        let mut effects = (&mut gateway, &mut store);
        let path: Vec<CycleState> = (1..=3)
            .filter_map(|t| machine.step(t, &policy, &mut effects))
            .map(|t| t.to)
            .collect();
        assert_eq!(path, vec![CycleState::Settled, CycleState::Waiting]);
    }

    assert_eq!(machine.state(), CycleState::Waiting);
    assert_eq!(machine.attempts(), 0);
    assert_eq!(gateway.primary().sent, vec![R]);
    assert!(store.is_empty());
}

#[test]
fn unreachable_goes_through_persisting_into_the_store() {
    let mut gateway = DeliveryGateway::new("dev", ScriptedLink::offline());
    let mut store = store_with::<4>(&[]);
    let policy = SchedulePolicy::default();
    let mut machine = CycleMachine::new(0);

    machine.offer(R, 0);
    {
        let mut effects = (&mut gateway, &mut store);
        let first = machine.step(1, &policy, &mut effects).unwrap();
        assert_eq!(first.to, CycleState::Persisting);
        assert_eq!(first.cause, Cause::DeliveryFailed(Publish::Unreachable));

        let second = machine.step(2, &policy, &mut effects).unwrap();
        assert_eq!(second.to, CycleState::Waiting);
    }

    assert_eq!(store.drain().collect::<Vec<_>>(), vec![R]);
    assert_eq!(store.first_write(), Some(2));
    assert!(gateway.primary().sent.is_empty());
}

#[test]
fn rejected_delivery_is_persisted() {
    let link = ScriptedLink::online().answering(&[Err(TransportError::Status(500))]);
    let mut gateway = DeliveryGateway::new("dev", link);
    let mut store = store_with::<4>(&[]);
    let policy = SchedulePolicy::default();
    let mut machine = CycleMachine::new(0);

    machine.offer(R, 0);
    {
        let mut effects = (&mut gateway, &mut store);
        let first = machine.step(1, &policy, &mut effects).unwrap();
        assert_eq!(first.cause, Cause::DeliveryFailed(Publish::Rejected));
        machine.step(2, &policy, &mut effects);
    }

    assert_eq!(store.len(), 1);
    assert_eq!(gateway.primary().sent, vec![R]);
}

// ============================================================================
// Control loop
// ============================================================================

#[test]
fn online_cycle_sends_each_reading_once() {
    let mut monitor = rig::<2>(ScriptedLink::online());
    let mut clock = noon();
    monitor.tick(&clock);

    assert_eq!(run_cycle(&mut monitor, &mut clock), Cause::Confirmed);
    assert_eq!(monitor.accumulator().windows_completed(), 1);
    assert_eq!(monitor.gateway().primary().sent, vec![R]);
    assert_eq!(monitor.stats().delivered, 1);
    assert!(monitor.store().is_empty());
}

#[test]
fn offline_cycles_fill_store_then_replay_clears_it() {
    let mut monitor = rig::<2>(ScriptedLink::offline());
    let mut clock = noon();
    monitor.tick(&clock);

    assert_eq!(run_cycle(&mut monitor, &mut clock), Cause::Persisted { slot: 0 });
    assert_eq!(monitor.store().len(), 1);

    assert_eq!(run_cycle(&mut monitor, &mut clock), Cause::Persisted { slot: 1 });
    assert_eq!(monitor.store().len(), 2);

    assert_eq!(
        run_cycle(&mut monitor, &mut clock),
        Cause::Dropped(StoreError::Full { capacity: 2 })
    );
    assert_eq!(monitor.store().len(), 2);
    assert_eq!(monitor.stats().persisted, 2);
    assert_eq!(monitor.stats().dropped, 1);

    monitor.gateway_mut().primary_mut().connected = true;
    clock.advance(10);
    let report = monitor.tick(&clock);

    assert_eq!(report.replay, Some(BatchOutcome::BatchDelivered { count: 2 }));
    assert!(monitor.store().is_empty());
    assert_eq!(monitor.store().first_write(), None);
    assert_eq!(monitor.gateway().primary().sent, vec![R, R]);
    assert_eq!(monitor.stats().replayed, 2);
}

#[test]
fn partial_replay_keeps_backlog_and_backs_off() {
    let link = ScriptedLink::online().answering(&[Err(TransportError::Status(500))]);
    let mut monitor = rig_with(link, store_with::<4>(&[R, R]), StaticConfig::failing());
    let mut clock = FixedTime::new(0, hm(23, 0));

    let report = monitor.tick(&clock);
    assert_eq!(report.replay, Some(BatchOutcome::BatchPartial { delivered: 1, pending: 1 }));
    assert_eq!(monitor.store().len(), 2);

    clock.set(REPLAY_BACKOFF_MS / 2);
    assert_eq!(monitor.tick(&clock).replay, None);

    clock.set(REPLAY_BACKOFF_MS);
    let report = monitor.tick(&clock);
    assert_eq!(report.replay, Some(BatchOutcome::BatchDelivered { count: 2 }));
    assert!(monitor.store().is_empty());
    assert_eq!(monitor.stats().partial_replays, 1);
    // Replay runs outside the active window; the machine never armed
    assert_eq!(monitor.state(), CycleState::Idle);
}

#[test]
fn stale_backlog_expires_outside_window() {
    let mut monitor = rig_with(ScriptedLink::offline(), store_with::<4>(&[R, R, R]), StaticConfig::failing());
    let mut clock = FixedTime::new(0, hm(2, 0));

    clock.set(MS_PER_DAY - 1);
    assert_eq!(monitor.tick(&clock).expired, 0);
    assert_eq!(monitor.store().len(), 3);

    clock.set(MS_PER_DAY);
    assert_eq!(monitor.tick(&clock).expired, 3);
    assert!(monitor.store().is_empty());
    assert_eq!(monitor.stats().expired, 3);

    clock.advance(1);
    assert_eq!(monitor.tick(&clock).expired, 0);
}

#[test]
fn request_timeout_parks_and_discards_late_reading() {
    let mut monitor = rig::<2>(ScriptedLink::online());
    let mut clock = noon();
    monitor.tick(&clock);

    clock.set(60_000);
    let report = monitor.tick(&clock);
    assert_eq!(report.transition.map(|t| t.cause), Some(Cause::RequestTimedOut));
    assert_eq!(monitor.stats().timeouts, 1);

    monitor.acquisition_mut().fill(WINDOW);
    let report = monitor.tick(&clock);
    assert_eq!(report.reading, Some(ReadingOutcome::Discarded(CycleState::Waiting)));
    assert_eq!(monitor.stats().discarded, 1);
    assert!(monitor.gateway().primary().sent.is_empty());
}

#[test]
fn config_change_notification_installs_new_window() {
    let night_shift = ScheduleConfig::from_remote(5, "00:00", "00:30").unwrap();
    let mut monitor = rig_with(ScriptedLink::online(), store_with::<2>(&[]), StaticConfig::serving(night_shift));
    let clock = noon();

    assert!(monitor.tick(&clock).in_window);
    assert_eq!(monitor.config_source_mut().fetches, 0);

    monitor.notify_config_changed();
    let report = monitor.tick(&clock);
    assert_eq!(report.config, Some(ConfigRefresh::Updated));
    assert_eq!(monitor.schedule(), &night_shift);

    let report = monitor.tick(&clock);
    assert!(!report.in_window);
    assert_eq!(report.transition, None);
    assert_eq!(monitor.config_source_mut().fetches, 1);
}

#[test]
fn readings_outside_window_are_not_offered() {
    let mut monitor = rig::<2>(ScriptedLink::online());
    let clock = FixedTime::new(0, hm(5, 59));

    monitor.acquisition_mut().fill(WINDOW);
    let report = monitor.tick(&clock);
    assert_eq!(report.reading, Some(ReadingOutcome::OutsideWindow));
    assert_eq!(monitor.state(), CycleState::Idle);
}
