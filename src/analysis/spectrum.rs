// Spectrum computation - magnitude spectrum over a snapshot
//
// One forward transform per analysis cycle, over the full snapshot. No
// window is applied: the harmonic ratio contract normalizes raw transform
// magnitude by snapshot length, so the scale must stay untouched.

use rustfft::{num_complex::Complex, FftPlanner};

/// Magnitude spectrum with its frequency-per-bin scale.
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Magnitudes of the positive-frequency bins (n/2 + 1 entries).
    pub magnitudes: Vec<f32>,
    /// Frequency step between adjacent bins: sample_rate / snapshot length.
    pub bin_hz: f32,
}

impl Spectrum {
    /// Center frequency of bin `index`.
    pub fn bin_frequency(&self, index: usize) -> f32 {
        index as f32 * self.bin_hz
    }

    /// Index of the bin whose frequency is closest to `target_hz`.
    ///
    /// Bin frequencies form a uniform grid, so the nearest neighbor is
    /// computed directly; an exact tie between two bins resolves to the
    /// lower index.
    pub fn nearest_bin(&self, target_hz: f32) -> usize {
        if self.magnitudes.is_empty() {
            return 0;
        }
        let last = self.magnitudes.len() - 1;
        if target_hz <= 0.0 {
            return 0;
        }
        let pos = (target_hz / self.bin_hz) as f64;
        let lower = pos.floor();
        if lower as usize >= last {
            return last;
        }
        let below = pos - lower;
        let above = 1.0 - below;
        if below <= above {
            lower as usize
        } else {
            lower as usize + 1
        }
    }
}

/// Computes magnitude spectra with a cached FFT planner.
///
/// The planner memoizes plans by length, so repeated cycles over a
/// constant-size snapshot reuse one plan.
pub struct SpectrumProcessor {
    planner: FftPlanner<f32>,
}

impl SpectrumProcessor {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// Compute the magnitude spectrum of `samples`.
    ///
    /// Returns positive-frequency magnitudes only (real-input symmetry) and
    /// the bin scale derived from `sample_rate / samples.len()`.
    pub fn compute(&mut self, samples: &[f32], sample_rate: u32) -> Spectrum {
        let n = samples.len();
        if n == 0 {
            return Spectrum {
                magnitudes: Vec::new(),
                bin_hz: 0.0,
            };
        }

        let mut buffer: Vec<Complex<f32>> =
            samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        let magnitudes = buffer[..n / 2 + 1].iter().map(|c| c.norm()).collect();
        Spectrum {
            magnitudes,
            bin_hz: sample_rate as f32 / n as f32,
        }
    }
}

impl Default for SpectrumProcessor {
    fn default() -> Self {
        Self::new()
    }
}
