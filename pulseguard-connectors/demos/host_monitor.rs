//! Host-side monitor with a simulated pulse oximeter
//!
//! Runs the full control loop against a real collector: direct HTTP delivery,
//! remote schedule lookup and a file-backed store. The optical sensor and the
//! estimation algorithm are simulated so the loop can run on a laptop.
//!
//! ```text
//! cargo run -p pulseguard-connectors --example host_monitor -- pulseguard.json
//! RUST_LOG=debug cargo run -p pulseguard-connectors --example host_monitor
//! ```
//!
//! Without a settings file the device id defaults to `host-simulator` and the
//! collector to `http://localhost:3000`.

use std::error::Error;
use std::f32::consts::TAU;
use std::time::{Duration, Instant};

use log::info;

use pulseguard_connectors::{build_connectors, AgentSettings};
use pulseguard_core::{
    accumulator::Sample, constants::DEFAULT_STORE_CAPACITY, constants::buffers::region_bytes,
    Acquisition, CycleState, Estimate, Estimator, FileMedium, Monitor, MonitorSettings, RingStore,
    ScheduleConfig, SystemClock, Clock,
};

// ---------------------------------------------------------------------------
// Simulation constants
// ---------------------------------------------------------------------------

/// Optical sensor sample rate.
const SAMPLE_RATE_HZ: f32 = 25.0;

/// Simulated heart rate.
const SIMULATED_BPM: f32 = 72.0;

/// Control loop pacing.
const LOOP_PERIOD: Duration = Duration::from_millis(40);

// ---------------------------------------------------------------------------
// Simulated sensor
// ---------------------------------------------------------------------------

/// Produces a synthetic photoplethysmogram at the real sensor rate.
struct SimulatedSensor {
    started: Instant,
    produced: u64,
}

impl SimulatedSensor {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            produced: 0,
        }
    }
}

impl Acquisition for SimulatedSensor {
    fn next_sample(&mut self) -> Option<Sample> {
        let due = (self.started.elapsed().as_secs_f32() * SAMPLE_RATE_HZ) as u64;
        if self.produced >= due {
            return None;
        }

        let t = self.produced as f32 / SAMPLE_RATE_HZ;
        self.produced += 1;

        let pulse = (TAU * SIMULATED_BPM / 60.0 * t).sin();
        let ir = 50_000.0 + 1_500.0 * pulse;
        let red = 40_000.0 + 800.0 * pulse;
        Some(Sample::new(ir as u32, red as u32))
    }
}

// ---------------------------------------------------------------------------
// Simplified estimator
// ---------------------------------------------------------------------------

/// Rising mean crossings for heart rate, ratio of ratios for saturation.
struct RatioEstimator;

impl RatioEstimator {
    fn ac_dc(channel: &[u32]) -> (f32, f32) {
        let dc = channel.iter().map(|&v| v as f32).sum::<f32>() / channel.len() as f32;
        let (lo, hi) = channel
            .iter()
            .fold((u32::MAX, 0), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        ((hi - lo) as f32, dc)
    }
}

impl Estimator for RatioEstimator {
    fn estimate(&mut self, ir: &[u32], red: &[u32]) -> Estimate {
        let (ir_ac, ir_dc) = Self::ac_dc(ir);
        let (red_ac, red_dc) = Self::ac_dc(red);

        let crossings = ir
            .windows(2)
            .filter(|w| (w[0] as f32) < ir_dc && (w[1] as f32) >= ir_dc)
            .count();
        let seconds = ir.len() as f32 / SAMPLE_RATE_HZ;
        let bpm = crossings as f32 * 60.0 / seconds;

        let ratio = (red_ac / red_dc) / (ir_ac / ir_dc);
        let spo2 = 110.0 - 25.0 * ratio;

        Estimate {
            bpm,
            spo2,
            bpm_valid: (30.0..=220.0).contains(&bpm),
            spo2_valid: ratio.is_finite() && (70.0..=100.0).contains(&spo2),
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let settings = match std::env::args().nth(1) {
        Some(path) => AgentSettings::load(path)?,
        None => AgentSettings::default().with_device_id("host-simulator"),
    };

    let medium = FileMedium::open(&settings.store_path, region_bytes(DEFAULT_STORE_CAPACITY))?;
    let clock = SystemClock::new(settings.utc_offset_hours);
    let store: RingStore<_, DEFAULT_STORE_CAPACITY> = RingStore::open(medium, clock.now())
        .map_err(|e| format!("store unusable: {e}"))?;
    info!("store {} holds {} queued readings", settings.store_path.display(), store.len());

    let connectors = build_connectors(&settings)?;

    let mut monitor: Monitor<_, _, _, _, _, _, DEFAULT_STORE_CAPACITY> = Monitor::new(
        connectors.gateway,
        store,
        connectors.config_source,
        RatioEstimator,
        SimulatedSensor::new(),
        ScheduleConfig::default(),
        MonitorSettings::default(),
    );
    monitor.notify_config_changed();

    info!("monitor running; schedule window {}-{}", monitor.schedule().window.start, monitor.schedule().window.end);

    loop {
        let report = monitor.tick(&clock);

        if let Some(transition) = report.transition {
            if transition.to == CycleState::Waiting {
                let stats = monitor.stats();
                info!(
                    "cycle done ({:?}); delivered={} persisted={} dropped={} queued={}",
                    transition.cause,
                    stats.delivered,
                    stats.persisted,
                    stats.dropped,
                    monitor.store().len()
                );
            }
        }

        std::thread::sleep(LOOP_PERIOD);
    }
}
