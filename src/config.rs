//! Pipeline configuration
//!
//! All tunables live in one immutable struct passed to the pipeline at
//! construction; nothing is a process-wide global. A JSON file can override
//! the defaults for fast iteration without recompilation, falling back to
//! defaults (with a logged warning) when missing or malformed.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::PipelineError;
use crate::protocol::encoding::EncodingScheme;

/// Complete pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ring buffer length in seconds of audio.
    pub buffer_seconds: f32,
    /// Analysis and send rate in Hz.
    pub target_rate_hz: f32,
    /// Number of tracked harmonics (gain slots G1..GN).
    pub harmonic_count: usize,
    /// Reference amplitude for harmonic ratio normalization (sensitivity).
    pub amp_ref: f32,
    /// Minimum snapshot length before a cycle runs; shorter snapshots are
    /// skipped as "not ready".
    pub min_analysis_window: usize,
    pub encoding: EncodingConfig,
    pub osc: OscConfig,
}

/// Quantization and wire-format parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Which wire convention to speak; the legacy schemes exist for
    /// compatibility testing against older avatar setups.
    pub scheme: EncodingScheme,
    /// Pitch quantization bounds in Hz (low note, high note).
    pub pitch_range_hz: (f32, f32),
    /// Formant quantization bounds in Hz.
    pub formant_range_hz: (f32, f32),
    /// Quantization index width; split into two 7-bit wire fields.
    pub quant_bits: u32,
    /// Formant slots to estimate and transmit (at most 4).
    pub formant_count: usize,
}

/// Outbound OSC endpoint and parameter namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OscConfig {
    pub host: String,
    pub port: u16,
    pub addresses: OscAddresses,
}

/// Avatar parameter address conventions.
///
/// Gain slots are `<gain_prefix><i>` for i in 1..=harmonic_count; formant
/// slots are `<formant_prefix><i>_L` / `<formant_prefix><i>_H`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OscAddresses {
    pub pitch_low: String,
    pub pitch_high: String,
    pub gain_prefix: String,
    pub formant_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_seconds: 0.2,
            target_rate_hz: 90.0,
            harmonic_count: 10,
            amp_ref: 0.05,
            min_analysis_window: 1024,
            encoding: EncodingConfig::default(),
            osc: OscConfig::default(),
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            scheme: EncodingScheme::LogInverseSplit14,
            // E2 to G5, the musically useful vocal band.
            pitch_range_hz: (82.407, 783.991),
            formant_range_hz: (90.0, 5000.0),
            quant_bits: 14,
            formant_count: 4,
        }
    }
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            addresses: OscAddresses::default(),
        }
    }
}

impl Default for OscAddresses {
    fn default() -> Self {
        Self {
            pitch_low: "/avatar/parameters/FT_L".to_string(),
            pitch_high: "/avatar/parameters/FT_H".to_string(),
            gain_prefix: "/avatar/parameters/G".to_string(),
            formant_prefix: "/avatar/parameters/F".to_string(),
        }
    }
}

/// Most formant slots the wire format carries.
pub const MAX_FORMANTS: usize = 4;

impl PipelineConfig {
    /// Load configuration from a JSON file, falling back to defaults if the
    /// file is missing or invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Validate invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), PipelineError> {
        fn invalid(reason: impl Into<String>) -> Result<(), PipelineError> {
            Err(PipelineError::InvalidConfig {
                reason: reason.into(),
            })
        }

        if !(self.buffer_seconds > 0.0) {
            return invalid("buffer_seconds must be positive");
        }
        if !(self.target_rate_hz > 0.0) {
            return invalid("target_rate_hz must be positive");
        }
        if self.harmonic_count == 0 {
            return invalid("harmonic_count must be at least 1");
        }
        if !(self.amp_ref > 0.0) {
            return invalid("amp_ref must be positive");
        }
        if self.min_analysis_window == 0 {
            return invalid("min_analysis_window must be positive");
        }
        let enc = &self.encoding;
        if enc.quant_bits == 0 || enc.quant_bits > 14 {
            return invalid("quant_bits must be in 1..=14 (two 7-bit wire fields)");
        }
        if enc.formant_count > MAX_FORMANTS {
            return invalid(format!("formant_count must be at most {}", MAX_FORMANTS));
        }
        let (p_min, p_max) = enc.pitch_range_hz;
        if !(p_min > 0.0 && p_max > p_min) {
            return invalid("pitch_range_hz must satisfy 0 < min < max");
        }
        let (f_min, f_max) = enc.formant_range_hz;
        if !(f_min > 0.0 && f_max > f_min) {
            return invalid("formant_range_hz must satisfy 0 < min < max");
        }
        Ok(())
    }
}
