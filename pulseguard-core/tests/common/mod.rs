//! Scripted collaborators for integration tests
//!
//! Every collaborator the control loop talks to, with its behaviour set up
//! front and its observations kept for assertions. No timers, no network.

#![allow(dead_code)]

use std::collections::VecDeque;

use pulseguard_core::{
    accumulator::Sample, Acquisition, ConfigError, ConfigSource, DeviceId, Estimate, Estimator,
    Reading, ScheduleConfig, TimeOfDay, Transport, TransportError,
};

/// Transport with a switchable link and a queue of scripted answers
#[derive(Debug, Default)]
pub struct ScriptedLink {
    pub connected: bool,
    pub answers: VecDeque<Result<(), TransportError>>,
    pub sent: Vec<Reading>,
}

impl ScriptedLink {
    /// Connected link accepting everything
    pub fn online() -> Self {
        Self { connected: true, ..Self::default() }
    }

    /// Link that is down
    pub fn offline() -> Self {
        Self::default()
    }

    /// Queue answers for the next sends
    pub fn answering(mut self, answers: &[Result<(), TransportError>]) -> Self {
        self.answers.extend(answers.iter().copied());
        self
    }
}

impl Transport for ScriptedLink {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, _device: &DeviceId, reading: &Reading) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(*reading);
        self.answers.pop_front().unwrap_or(Ok(()))
    }
}

/// Configuration source returning one fixed answer
#[derive(Debug, Clone)]
pub struct StaticConfig {
    pub answer: Result<ScheduleConfig, ConfigError>,
    pub fetches: usize,
}

impl StaticConfig {
    pub fn failing() -> Self {
        Self { answer: Err(ConfigError::Unreachable), fetches: 0 }
    }

    pub fn serving(config: ScheduleConfig) -> Self {
        Self { answer: Ok(config), fetches: 0 }
    }
}

impl ConfigSource for StaticConfig {
    fn fetch(&mut self, _device: &DeviceId) -> Result<ScheduleConfig, ConfigError> {
        self.fetches += 1;
        self.answer
    }
}

/// Estimator handing out a queue of estimates, then a fixed valid one
#[derive(Debug, Clone)]
pub struct QueuedEstimator {
    pub queue: VecDeque<Estimate>,
    pub fallback: Estimate,
}

impl QueuedEstimator {
    pub fn valid(bpm: f32, spo2: f32) -> Self {
        Self { queue: VecDeque::new(), fallback: estimate(bpm, spo2, true) }
    }
}

impl Estimator for QueuedEstimator {
    fn estimate(&mut self, ir: &[u32], red: &[u32]) -> Estimate {
        assert_eq!(ir.len(), red.len());
        self.queue.pop_front().unwrap_or(self.fallback)
    }
}

/// Sensor FIFO holding a number of identical samples
#[derive(Debug, Clone, Default)]
pub struct Fifo {
    pub pending: usize,
}

impl Fifo {
    pub fn fill(&mut self, samples: usize) {
        self.pending += samples;
    }
}

impl Acquisition for Fifo {
    fn next_sample(&mut self) -> Option<Sample> {
        self.pending = self.pending.checked_sub(1)?;
        Some(Sample::new(50_000, 40_000))
    }
}

pub fn estimate(bpm: f32, spo2: f32, valid: bool) -> Estimate {
    Estimate { bpm, spo2, bpm_valid: valid, spo2_valid: valid }
}

pub fn hm(h: u8, m: u8) -> TimeOfDay {
    TimeOfDay::from_hm(h, m).unwrap()
}
