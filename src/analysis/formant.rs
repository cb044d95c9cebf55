// Formant estimation seam and default LPC estimator
//
// Formants are resonance peaks of the vocal tract, independent of pitch.
// The default estimator runs classic LPC analysis: decimate to a speech
// band, pre-emphasize, window, fit an all-pole model via Levinson-Durbin,
// and read formant frequencies off the complex pole angles.

use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

/// Formant frequency estimator capability.
///
/// Returns up to `count` formant frequencies in Hz, lowest first. Missing,
/// non-finite, or non-positive entries are treated as "undefined" slots by
/// the extractor.
pub trait FormantEstimator: Send {
    fn estimate_formants(&mut self, samples: &[f32], sample_rate: u32, count: usize) -> Vec<f32>;
}

/// LPC formant estimator.
pub struct LpcFormant {
    order: usize,
    /// Samples analyzed per call, at the decimated rate.
    window: usize,
    min_hz: f64,
    max_hz: f64,
    /// Poles wider than this bandwidth are spectral tilt, not formants.
    max_bandwidth_hz: f64,
}

const PREEMPHASIS_COEF: f32 = 0.97;
/// LPC runs near this rate; full-band analysis wastes poles above 5 kHz.
const TARGET_RATE: u32 = 10_000;

impl LpcFormant {
    pub fn new(order: usize, min_hz: f64, max_hz: f64) -> Self {
        Self {
            order,
            window: 512,
            min_hz,
            max_hz,
            max_bandwidth_hz: 1000.0,
        }
    }
}

impl Default for LpcFormant {
    fn default() -> Self {
        Self::new(12, 90.0, 5000.0)
    }
}

impl FormantEstimator for LpcFormant {
    fn estimate_formants(&mut self, samples: &[f32], sample_rate: u32, count: usize) -> Vec<f32> {
        if count == 0 || sample_rate == 0 {
            return Vec::new();
        }

        // Boxcar decimation toward the target rate.
        let decim = (sample_rate / TARGET_RATE).max(1) as usize;
        let effective_rate = sample_rate as f64 / decim as f64;

        let needed = self.window * decim;
        if samples.len() < needed {
            return Vec::new();
        }
        let tail = &samples[samples.len() - needed..];
        let mut frame: Vec<f32> = tail
            .chunks_exact(decim)
            .map(|group| group.iter().sum::<f32>() / decim as f32)
            .collect();

        // Pre-emphasis: x[n] - 0.97 * x[n-1].
        let mut prev = frame[0];
        for value in frame.iter_mut().skip(1) {
            let current = *value;
            *value -= PREEMPHASIS_COEF * prev;
            prev = current;
        }

        // Hamming window.
        let n = frame.len();
        for (i, value) in frame.iter_mut().enumerate() {
            let w = 0.54 - 0.46 * ((2.0 * PI * i as f64) / (n as f64 - 1.0)).cos();
            *value *= w as f32;
        }

        let r = autocorrelation(&frame, self.order);
        let a = match levinson_durbin(&r, self.order) {
            Some(a) => a,
            None => return Vec::new(),
        };

        let mut formants = pole_frequencies(
            &a,
            effective_rate,
            self.min_hz,
            self.max_hz,
            self.max_bandwidth_hz,
        );
        formants.truncate(count);
        formants.into_iter().map(|f| f as f32).collect()
    }
}

/// Autocorrelation at lags 0..=order.
fn autocorrelation(x: &[f32], order: usize) -> Vec<f64> {
    let n = x.len();
    let mut r = vec![0.0f64; order + 1];
    for (lag, slot) in r.iter_mut().enumerate() {
        let mut acc = 0.0f64;
        for i in 0..n - lag {
            acc += x[i] as f64 * x[i + lag] as f64;
        }
        *slot = acc;
    }
    r
}

/// Levinson-Durbin recursion; returns prediction coefficients a[0..=order]
/// with a[0] = 1, or None when the signal is degenerate.
fn levinson_durbin(r: &[f64], order: usize) -> Option<Vec<f64>> {
    if r.len() < order + 1 || r[0] == 0.0 {
        return None;
    }

    let mut a = vec![0.0f64; order + 1];
    a[0] = 1.0;
    let mut e = r[0];

    for i in 1..=order {
        let mut acc = r[i];
        for j in 1..i {
            acc += a[j] * r[i - j];
        }
        let k = -acc / e;
        let a_prev = a.clone();
        a[i] = k;
        for j in 1..i {
            a[j] = a_prev[j] + k * a_prev[i - j];
        }
        e *= 1.0 - k * k;
        if e <= 0.0 {
            return None;
        }
    }

    Some(a)
}

/// Frequencies of in-range, narrow-bandwidth poles, ascending.
fn pole_frequencies(
    a: &[f64],
    sample_rate: f64,
    fmin: f64,
    fmax: f64,
    bw_max: f64,
) -> Vec<f64> {
    if a.len() < 2 || a[0].abs() < 1e-12 {
        return Vec::new();
    }

    let roots = durand_kerner_roots(a, 60, 1e-8);
    let mut formants = Vec::new();
    for z in roots.iter() {
        let radius = z.norm();
        if radius >= 1.0 || z.im <= 0.0 {
            continue;
        }
        let freq = z.arg() * sample_rate / (2.0 * PI);
        let bandwidth = -sample_rate / PI * radius.ln();
        if freq > fmin && freq < fmax && bandwidth < bw_max {
            formants.push(freq);
        }
    }
    formants.sort_by(|a, b| a.partial_cmp(b).unwrap());
    formants
}

/// Durand-Kerner simultaneous root iteration for the LPC polynomial.
fn durand_kerner_roots(a: &[f64], max_iter: usize, tol: f64) -> Vec<Complex64> {
    let n = a.len().saturating_sub(1);
    if n == 0 {
        return Vec::new();
    }

    let radius = 0.9;
    let mut roots: Vec<Complex64> = (0..n)
        .map(|k| {
            let theta = 2.0 * PI * (k as f64) / (n as f64);
            Complex64::new(radius * theta.cos(), radius * theta.sin())
        })
        .collect();

    for _ in 0..max_iter {
        let mut converged = true;
        for i in 0..n {
            let mut denom = Complex64::new(1.0, 0.0);
            for j in 0..n {
                if i != j {
                    denom *= roots[i] - roots[j];
                }
            }
            let p = poly_eval(a, roots[i]);
            let delta = if denom.norm() < 1e-12 {
                Complex64::new(1e-6, 1e-6)
            } else {
                p / denom
            };
            let next = roots[i] - delta;
            if (next - roots[i]).norm() > tol {
                converged = false;
            }
            roots[i] = next;
        }
        if converged {
            break;
        }
    }

    roots
}

fn poly_eval(a: &[f64], z: Complex64) -> Complex64 {
    let mut acc = Complex64::new(a[0], 0.0);
    for &coef in &a[1..] {
        acc = acc * z + Complex64::new(coef, 0.0);
    }
    acc
}
