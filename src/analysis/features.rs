// Feature extraction - per-cycle acoustic features from one snapshot
//
// One FeatureVector per invoked cycle, always. Estimator misbehavior (NaN,
// negative, out-of-range values) degrades to the "undetected"/"undefined"
// sentinels for that feature only and never aborts the cycle.

use crate::analysis::formant::FormantEstimator;
use crate::analysis::pitch::PitchEstimator;
use crate::analysis::spectrum::SpectrumProcessor;
use crate::config::MAX_FORMANTS;

/// Per-cycle analysis output.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Detected fundamental in Hz; 0.0 means undetected.
    pub f0_hz: f32,
    /// Amplitude ratio in [0, 1] for harmonics 1..=harmonic_count.
    /// All zeros when unvoiced.
    pub harmonic_ratios: Vec<f32>,
    /// Up to 4 formant frequencies; `None` marks an undefined slot, which is
    /// distinct from 0 Hz on the wire.
    pub formants_hz: [Option<f32>; MAX_FORMANTS],
    /// Maximum harmonic ratio this cycle; 0.0 when unvoiced.
    pub peak_ratio: f32,
}

impl FeatureVector {
    pub fn is_voiced(&self) -> bool {
        self.f0_hz > 0.0
    }
}

/// Computes a FeatureVector from a buffer snapshot.
pub struct FeatureExtractor {
    spectrum: SpectrumProcessor,
    harmonic_count: usize,
    formant_count: usize,
}

/// amp_ref values at or below zero would blow the ratio up; clamp here as a
/// second line of defense behind the control surface's validation.
const MIN_AMP_REF: f32 = 1e-6;

impl FeatureExtractor {
    pub fn new(harmonic_count: usize, formant_count: usize) -> Self {
        Self {
            spectrum: SpectrumProcessor::new(),
            harmonic_count,
            formant_count: formant_count.min(MAX_FORMANTS),
        }
    }

    /// Analyze one snapshot.
    ///
    /// The caller is responsible for skipping snapshots shorter than the
    /// minimum analysis window; this method assumes a usable snapshot.
    pub fn analyze(
        &mut self,
        snapshot: &[f32],
        sample_rate: u32,
        pitch: &mut dyn PitchEstimator,
        formant: &mut dyn FormantEstimator,
        amp_ref: f32,
    ) -> FeatureVector {
        let amp_ref = amp_ref.max(MIN_AMP_REF);
        let spectrum = self.spectrum.compute(snapshot, sample_rate);

        let raw_f0 = pitch.estimate_f0(snapshot, sample_rate);
        let f0_hz = sanitize_frequency(raw_f0);

        let mut harmonic_ratios = vec![0.0f32; self.harmonic_count];
        let mut peak_ratio = 0.0f32;
        let mut formants_hz = [None; MAX_FORMANTS];

        if f0_hz > 0.0 {
            let norm = snapshot.len() as f32;
            for (i, ratio) in harmonic_ratios.iter_mut().enumerate() {
                let target = f0_hz * (i + 1) as f32;
                let bin = spectrum.nearest_bin(target);
                let amplitude = spectrum.magnitudes[bin] / norm;
                *ratio = (amplitude / amp_ref).min(1.0);
                peak_ratio = peak_ratio.max(*ratio);
            }

            if self.formant_count > 0 {
                let raw = formant.estimate_formants(snapshot, sample_rate, self.formant_count);
                for (slot, value) in formants_hz.iter_mut().zip(raw.into_iter()) {
                    let hz = sanitize_frequency(value);
                    *slot = if hz > 0.0 { Some(hz) } else { None };
                }
            }
        }

        FeatureVector {
            f0_hz,
            harmonic_ratios,
            formants_hz,
            peak_ratio,
        }
    }
}

/// Map estimator output to a usable frequency: non-finite or non-positive
/// values mean undetected.
fn sanitize_frequency(hz: f32) -> f32 {
    if hz.is_finite() && hz > 0.0 {
        hz
    } else {
        0.0
    }
}
