//! Sample Accumulator: fixed windows of raw samples for the estimator
//!
//! The optical sensor delivers paired infrared/red samples at 25 Hz. The
//! estimator wants a full window of both channels at once, so samples are
//! buffered until the window fills, handed over as two parallel slices and
//! then discarded. Windows never overlap.
//!
//! ```text
//! sample ──► [ir  0 1 2 ... N-1] ──┐
//!            [red 0 1 2 ... N-1] ──┴──► Estimator ──► Estimate ──► clear
//! ```

use heapless::Vec;

use crate::constants::buffers::SAMPLE_WINDOW_SIZE;
use crate::reading::Estimate;
use crate::traits::Estimator;

/// One raw sensor sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sample {
    /// Infrared LED channel
    pub ir: u32,
    /// Red LED channel
    pub red: u32,
}

impl Sample {
    /// New sample
    pub const fn new(ir: u32, red: u32) -> Self {
        Self { ir, red }
    }
}

/// Buffers `N` paired samples per estimation window
///
/// `N` must be at least 1; an empty window is rejected at compile time:
///
/// ```compile_fail
/// use pulseguard_core::SampleAccumulator;
///
/// let _ = SampleAccumulator::<0>::new();
/// ```
pub struct SampleAccumulator<const N: usize = SAMPLE_WINDOW_SIZE> {
    ir: Vec<u32, N>,
    red: Vec<u32, N>,
    windows: u32,
}

impl<const N: usize> SampleAccumulator<N> {
    const VALID_WINDOW: () = assert!(N > 0, "sample window must hold at least one sample");

    /// Empty accumulator
    pub const fn new() -> Self {
        let () = Self::VALID_WINDOW;
        Self {
            ir: Vec::new(),
            red: Vec::new(),
            windows: 0,
        }
    }

    /// Add a sample; on window completion run the estimator and clear
    pub fn push<E: Estimator + ?Sized>(&mut self, sample: Sample, estimator: &mut E) -> Option<Estimate> {
        if self.ir.push(sample.ir).is_err() || self.red.push(sample.red).is_err() {
            log_warn!("sample window out of step, restarting it");
            self.reset();
            return None;
        }

        if !self.ir.is_full() {
            return None;
        }

        let estimate = estimator.estimate(&self.ir, &self.red);
        self.ir.clear();
        self.red.clear();
        self.windows = self.windows.wrapping_add(1);

        log_debug!(
            "window {} complete: bpm={} ({}) spo2={} ({})",
            self.windows,
            estimate.bpm,
            estimate.bpm_valid,
            estimate.spo2,
            estimate.spo2_valid
        );

        Some(estimate)
    }

    /// Samples buffered in the current window
    pub fn len(&self) -> usize {
        self.ir.len()
    }

    /// Current window has no samples yet
    pub fn is_empty(&self) -> bool {
        self.ir.is_empty()
    }

    /// Window size
    pub const fn window_size(&self) -> usize {
        N
    }

    /// Windows completed since creation
    pub fn windows_completed(&self) -> u32 {
        self.windows
    }

    /// Drop a partial window
    pub fn reset(&mut self) {
        self.ir.clear();
        self.red.clear();
    }
}

impl<const N: usize> Default for SampleAccumulator<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Summing {
        calls: usize,
        last_len: usize,
    }

    impl Estimator for Summing {
        fn estimate(&mut self, ir: &[u32], red: &[u32]) -> Estimate {
            self.calls += 1;
            self.last_len = ir.len();
            assert_eq!(ir.len(), red.len());
            Estimate {
                bpm: ir.iter().sum::<u32>() as f32,
                spo2: red.iter().sum::<u32>() as f32,
                bpm_valid: true,
                spo2_valid: true,
            }
        }
    }

    #[test]
    fn estimates_once_per_window() {
        let mut acc = SampleAccumulator::<4>::new();
        let mut est = Summing { calls: 0, last_len: 0 };

        for i in 0..3 {
            assert!(acc.push(Sample::new(i, 10 * i), &mut est).is_none());
        }
        assert_eq!(acc.len(), 3);

        let estimate = acc.push(Sample::new(3, 30), &mut est).unwrap();
        assert_eq!(estimate.bpm, 6.0);
        assert_eq!(estimate.spo2, 60.0);
        assert_eq!(est.calls, 1);
        assert_eq!(est.last_len, 4);
        assert!(acc.is_empty());
        assert_eq!(acc.windows_completed(), 1);
    }

    #[test]
    fn windows_do_not_overlap() {
        let mut acc = SampleAccumulator::<2>::new();
        let mut est = Summing { calls: 0, last_len: 0 };

        let outputs: Vec<Option<Estimate>, 6> = (0..6)
            .map(|i| acc.push(Sample::new(i, 0), &mut est))
            .collect();

        assert_eq!(outputs.iter().filter(|o| o.is_some()).count(), 3);
        assert_eq!(outputs[1].unwrap().bpm, 1.0);
        assert_eq!(outputs[3].unwrap().bpm, 5.0);
        assert_eq!(outputs[5].unwrap().bpm, 9.0);
    }

    #[test]
    fn single_sample_window() {
        let mut acc = SampleAccumulator::<1>::new();
        let mut est = Summing { calls: 0, last_len: 0 };

        assert_eq!(acc.push(Sample::new(7, 9), &mut est).unwrap().bpm, 7.0);
        assert_eq!(acc.push(Sample::new(8, 9), &mut est).unwrap().bpm, 8.0);
        assert_eq!(est.calls, 2);
        assert_eq!(est.last_len, 1);
        assert!(acc.is_empty());
    }

    #[test]
    fn reset_drops_partial_window() {
        let mut acc = SampleAccumulator::<3>::new();
        let mut est = Summing { calls: 0, last_len: 0 };
        acc.push(Sample::new(1, 1), &mut est);
        acc.reset();
        assert!(acc.is_empty());
        assert_eq!(est.calls, 0);
    }
}
