// Pitch estimation seam and default estimator
//
// The pipeline never hardcodes an algorithm: anything implementing
// PitchEstimator can be plugged in at start(). The default is a windowed
// autocorrelation estimator, good enough for monophonic voice and cheap
// enough for a 90 Hz analysis rate.

/// Fundamental frequency estimator capability.
///
/// Returns the detected F0 in Hz. A return of `0.0`, a negative value, or a
/// non-finite value means "undetected"; the extractor sanitizes all of these
/// to the undetected sentinel and never treats them as fatal.
pub trait PitchEstimator: Send {
    fn estimate_f0(&mut self, samples: &[f32], sample_rate: u32) -> f32;
}

/// Autocorrelation pitch estimator over the tail of the snapshot.
///
/// Removes the mean, correlates lags within the configured pitch band, skips
/// the zero-lag lobe by waiting for the correlation to start rising, then
/// takes the strongest peak. A clarity gate (peak vs zero-lag energy)
/// rejects unvoiced frames.
pub struct AutocorrelationPitch {
    /// Samples analyzed per call (tail of the snapshot).
    window: usize,
    min_hz: f32,
    max_hz: f32,
    clarity_threshold: f32,
}

impl AutocorrelationPitch {
    pub fn new(window: usize, min_hz: f32, max_hz: f32) -> Self {
        Self {
            window,
            min_hz,
            max_hz,
            clarity_threshold: 0.3,
        }
    }
}

impl Default for AutocorrelationPitch {
    fn default() -> Self {
        Self::new(2048, 50.0, 1000.0)
    }
}

impl PitchEstimator for AutocorrelationPitch {
    fn estimate_f0(&mut self, samples: &[f32], sample_rate: u32) -> f32 {
        let window = self.window.min(samples.len());
        if window < 64 || sample_rate == 0 {
            return 0.0;
        }
        let frame = &samples[samples.len() - window..];

        let mean = frame.iter().sum::<f32>() / window as f32;

        let min_lag = ((sample_rate as f32 / self.max_hz) as usize).max(1);
        let max_lag = ((sample_rate as f32 / self.min_hz) as usize).min(window - 1);
        if min_lag >= max_lag {
            return 0.0;
        }

        let corr_at = |lag: usize| -> f32 {
            let mut acc = 0.0f32;
            for i in 0..window - lag {
                acc += (frame[i] - mean) * (frame[i + lag] - mean);
            }
            acc
        };

        let energy = corr_at(0);
        if energy <= f32::EPSILON {
            return 0.0;
        }

        // Walk past the zero-lag lobe: the first lag where the correlation
        // turns upward marks the start of the first period candidate.
        let mut rise = 0usize;
        let mut prev = energy;
        for lag in 1..=max_lag {
            let c = corr_at(lag);
            if c > prev {
                rise = lag;
                break;
            }
            prev = c;
        }
        if rise == 0 {
            return 0.0;
        }

        let mut best_lag = 0usize;
        let mut best_corr = f32::MIN;
        for lag in rise.max(min_lag)..=max_lag {
            let c = corr_at(lag);
            if c > best_corr {
                best_corr = c;
                best_lag = lag;
            }
        }

        if best_lag == 0 || best_corr / energy < self.clarity_threshold {
            return 0.0;
        }
        sample_rate as f32 / best_lag as f32
    }
}
