//! Readings, estimator output and device identity

use core::fmt;

use crate::constants::buffers::DEVICE_ID_LEN;

/// One completed measurement: heart rate and oxygen saturation
///
/// Produced once per accumulator window whose estimate is valid for both
/// metrics. Only persisted when delivery fails.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    /// Primary metric, beats per minute
    pub bpm: f32,
    /// Secondary metric, oxygen saturation in percent
    pub spo2: f32,
}

impl Reading {
    /// New reading
    pub const fn new(bpm: f32, spo2: f32) -> Self {
        Self { bpm, spo2 }
    }
}

/// Raw result of the estimation algorithm for one sample window
///
/// Each metric carries its own validity flag; the cycle only cares about
/// windows where both are valid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Estimated heart rate
    pub bpm: f32,
    /// Estimated oxygen saturation
    pub spo2: f32,
    /// Heart rate estimate is trustworthy
    pub bpm_valid: bool,
    /// Saturation estimate is trustworthy
    pub spo2_valid: bool,
}

impl Estimate {
    /// Reading candidate, present only when both metrics are valid
    pub fn reading(&self) -> Option<Reading> {
        (self.bpm_valid && self.spo2_valid).then_some(Reading::new(self.bpm, self.spo2))
    }
}

/// Device identity used in delivery bodies and configuration lookups
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceId(heapless::String<DEVICE_ID_LEN>);

impl DeviceId {
    /// Identity from text, truncated to the maximum length
    pub fn new(id: &str) -> Self {
        let mut inner = heapless::String::new();
        for ch in id.chars() {
            if inner.push(ch).is_err() {
                break;
            }
        }
        Self(inner)
    }

    /// Identity as text
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
