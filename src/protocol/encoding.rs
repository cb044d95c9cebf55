// Quantization and wire encoding
//
// The avatar runtime exposes narrow numeric parameter slots, so continuous
// measurements are packed into fixed-point indexes, split into 7-bit fields,
// and (in the inverse-split schemes) transmitted as multiplicative inverses.
// The inverse convention comes from the receiving parameter range and must
// be reproduced exactly: encoded = 1.0 / field when field > 0, else -1.0.

use serde::{Deserialize, Serialize};

use crate::analysis::features::FeatureVector;
use crate::config::{EncodingConfig, OscAddresses, MAX_FORMANTS};

/// Width of one wire field.
pub const WIRE_FIELD_BITS: u32 = 7;

/// Wire value for a zero field (and for undefined formant slots).
pub const FIELD_SENTINEL: f32 = -1.0;

/// Value carried by one parameter update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Int(i32),
    Float(f32),
}

/// One outbound parameter update.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamUpdate {
    pub addr: String,
    pub value: ParamValue,
}

/// Wire conventions spoken by different avatar revisions. Mutually
/// exclusive; selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingScheme {
    /// Legacy: integer Hz clamped to 16 bits, split into two 8-bit integer
    /// parameters; gains byte-quantized to 0..=255. No formant slots.
    RawSplit16,
    /// Legacy: integer Hz clamped to the quantization width, 7-bit
    /// inverse-split; gains as float ratios.
    InverseSplit7,
    /// Current: log-scaled quantization index over the configured band,
    /// 7-bit inverse-split; gains as float ratios.
    LogInverseSplit14,
}

/// Quantize a frequency to a log-scaled index in `[0, 2^quant_bits - 1]`.
///
/// Pitch perception is logarithmic, so a log mapping spreads resolution
/// evenly across the band. Non-positive input maps to index 0. Endpoints
/// map exactly: `min_hz` to 0 and `max_hz` to the top index.
pub fn encode_frequency(hz: f32, min_hz: f32, max_hz: f32, quant_bits: u32) -> u32 {
    let max_index = (1u32 << quant_bits) - 1;
    if !hz.is_finite() || hz <= 0.0 {
        return 0;
    }
    let span = max_hz.ln() - min_hz.ln();
    let t = ((hz.ln() - min_hz.ln()) / span).clamp(0.0, 1.0);
    ((t * max_index as f32).round() as u32).min(max_index)
}

/// Split a quantized index into (low, high) fields of `low_bits` bits each.
pub fn split_fields(value: u32, low_bits: u32) -> (u32, u32) {
    let mask = (1u32 << low_bits) - 1;
    (value & mask, (value >> low_bits) & mask)
}

/// Reassemble a quantized index from its two fields.
pub fn join_fields(low: u32, high: u32, low_bits: u32) -> u32 {
    low | (high << low_bits)
}

/// Inverse wire encoding of one field: `1.0 / field` when nonzero, sentinel
/// otherwise.
pub fn encode_inverse_field(field: u32) -> f32 {
    if field > 0 {
        1.0 / field as f32
    } else {
        FIELD_SENTINEL
    }
}

/// Inverse-encode both fields of a quantized index.
pub fn encode_inverse_pair(value: u32, low_bits: u32) -> (f32, f32) {
    let (low, high) = split_fields(value, low_bits);
    (encode_inverse_field(low), encode_inverse_field(high))
}

/// Byte-quantize an amplitude ratio: `clamp(round(ratio * 255), 0, 255)`.
pub fn quantize_byte(ratio: f32) -> i32 {
    if !ratio.is_finite() {
        return 0;
    }
    (ratio * 255.0).round().clamp(0.0, 255.0) as i32
}

/// Encodes FeatureVectors into ordered parameter updates.
///
/// Addresses are precomputed so the per-tick path allocates no format
/// strings.
pub struct FrameEncoder {
    scheme: EncodingScheme,
    pitch_range: (f32, f32),
    formant_range: (f32, f32),
    quant_bits: u32,
    pitch_low: String,
    pitch_high: String,
    gain_addrs: Vec<String>,
    formant_addrs: Vec<(String, String)>,
}

impl FrameEncoder {
    pub fn new(encoding: &EncodingConfig, addresses: &OscAddresses, harmonic_count: usize) -> Self {
        let gain_addrs = (1..=harmonic_count)
            .map(|i| format!("{}{}", addresses.gain_prefix, i))
            .collect();
        let formant_addrs = (1..=encoding.formant_count.min(MAX_FORMANTS))
            .map(|i| {
                (
                    format!("{}{}_L", addresses.formant_prefix, i),
                    format!("{}{}_H", addresses.formant_prefix, i),
                )
            })
            .collect();
        Self {
            scheme: encoding.scheme,
            pitch_range: encoding.pitch_range_hz,
            formant_range: encoding.formant_range_hz,
            quant_bits: encoding.quant_bits,
            pitch_low: addresses.pitch_low.clone(),
            pitch_high: addresses.pitch_high.clone(),
            gain_addrs,
            formant_addrs,
        }
    }

    /// Encode one frame into updates in the fixed parameter order:
    /// pitch low, pitch high, then for voiced frames G1..GN followed by
    /// F1_L, F1_H, ... F4_L, F4_H. Unvoiced frames carry the pitch pair only
    /// (with the undetected index 0 / sentinel encoding).
    pub fn encode(&self, features: &FeatureVector) -> Vec<ParamUpdate> {
        let mut updates =
            Vec::with_capacity(2 + self.gain_addrs.len() + 2 * self.formant_addrs.len());

        let (low, high) = self.pitch_pair(features.f0_hz);
        updates.push(ParamUpdate {
            addr: self.pitch_low.clone(),
            value: low,
        });
        updates.push(ParamUpdate {
            addr: self.pitch_high.clone(),
            value: high,
        });

        if !features.is_voiced() {
            return updates;
        }

        for (addr, &ratio) in self.gain_addrs.iter().zip(&features.harmonic_ratios) {
            let value = match self.scheme {
                EncodingScheme::RawSplit16 => ParamValue::Int(quantize_byte(ratio)),
                _ => ParamValue::Float(ratio),
            };
            updates.push(ParamUpdate {
                addr: addr.clone(),
                value,
            });
        }

        if self.scheme != EncodingScheme::RawSplit16 {
            for ((low_addr, high_addr), slot) in
                self.formant_addrs.iter().zip(&features.formants_hz)
            {
                let (low, high) = match slot {
                    Some(hz) => {
                        let index = self.quantize_formant(*hz);
                        encode_inverse_pair(index, WIRE_FIELD_BITS)
                    }
                    None => (FIELD_SENTINEL, FIELD_SENTINEL),
                };
                updates.push(ParamUpdate {
                    addr: low_addr.clone(),
                    value: ParamValue::Float(low),
                });
                updates.push(ParamUpdate {
                    addr: high_addr.clone(),
                    value: ParamValue::Float(high),
                });
            }
        }

        updates
    }

    fn pitch_pair(&self, f0_hz: f32) -> (ParamValue, ParamValue) {
        match self.scheme {
            EncodingScheme::RawSplit16 => {
                let q = if f0_hz > 0.0 {
                    (f0_hz.round() as i64).clamp(0, 65535) as u32
                } else {
                    0
                };
                (
                    ParamValue::Int((q & 0xFF) as i32),
                    ParamValue::Int(((q >> 8) & 0xFF) as i32),
                )
            }
            EncodingScheme::InverseSplit7 => {
                let max_index = ((1u64 << self.quant_bits) - 1) as i64;
                let q = if f0_hz > 0.0 {
                    (f0_hz.round() as i64).clamp(0, max_index) as u32
                } else {
                    0
                };
                let (low, high) = encode_inverse_pair(q, WIRE_FIELD_BITS);
                (ParamValue::Float(low), ParamValue::Float(high))
            }
            EncodingScheme::LogInverseSplit14 => {
                let q = encode_frequency(
                    f0_hz,
                    self.pitch_range.0,
                    self.pitch_range.1,
                    self.quant_bits,
                );
                let (low, high) = encode_inverse_pair(q, WIRE_FIELD_BITS);
                (ParamValue::Float(low), ParamValue::Float(high))
            }
        }
    }

    fn quantize_formant(&self, hz: f32) -> u32 {
        match self.scheme {
            EncodingScheme::LogInverseSplit14 => encode_frequency(
                hz,
                self.formant_range.0,
                self.formant_range.1,
                self.quant_bits,
            ),
            _ => {
                let max_index = ((1u64 << self.quant_bits) - 1) as i64;
                (hz.round() as i64).clamp(0, max_index) as u32
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_FORMANTS;

    fn default_encoder(scheme: EncodingScheme, harmonics: usize) -> FrameEncoder {
        let mut encoding = EncodingConfig::default();
        encoding.scheme = scheme;
        FrameEncoder::new(&encoding, &OscAddresses::default(), harmonics)
    }

    fn voiced_frame(f0: f32, ratios: Vec<f32>) -> FeatureVector {
        let peak = ratios.iter().copied().fold(0.0f32, f32::max);
        FeatureVector {
            f0_hz: f0,
            harmonic_ratios: ratios,
            formants_hz: [Some(500.0), Some(1500.0), None, None],
            peak_ratio: peak,
        }
    }

    #[test]
    fn test_encode_frequency_endpoints() {
        assert_eq!(encode_frequency(82.407, 82.407, 783.991, 14), 0);
        assert_eq!(encode_frequency(783.991, 82.407, 783.991, 14), (1 << 14) - 1);
    }

    #[test]
    fn test_encode_frequency_clamps_out_of_band() {
        assert_eq!(encode_frequency(10.0, 82.407, 783.991, 14), 0);
        assert_eq!(encode_frequency(5000.0, 82.407, 783.991, 14), (1 << 14) - 1);
        assert_eq!(encode_frequency(0.0, 82.407, 783.991, 14), 0);
        assert_eq!(encode_frequency(f32::NAN, 82.407, 783.991, 14), 0);
    }

    #[test]
    fn test_encode_frequency_monotone() {
        let mut prev = 0;
        let mut hz = 82.407f32;
        while hz <= 783.991 {
            let index = encode_frequency(hz, 82.407, 783.991, 14);
            assert!(index >= prev, "not monotone at {} Hz", hz);
            prev = index;
            hz += 0.25;
        }
    }

    #[test]
    fn test_split_fields_roundtrip_all_14_bit_values() {
        for value in 0u32..(1 << 14) {
            let (low, high) = split_fields(value, WIRE_FIELD_BITS);
            assert!(low < 128 && high < 128);
            assert_eq!(join_fields(low, high, WIRE_FIELD_BITS), value);
        }
    }

    #[test]
    fn test_inverse_field_sentinel_and_recovery() {
        assert_eq!(encode_inverse_field(0), -1.0);
        for field in 1u32..128 {
            let encoded = encode_inverse_field(field);
            assert_eq!(encoded, 1.0 / field as f32);
            let recovered = (1.0 / encoded).round() as u32;
            assert_eq!(recovered, field);
        }
    }

    #[test]
    fn test_quantize_byte_clamps() {
        assert_eq!(quantize_byte(0.0), 0);
        assert_eq!(quantize_byte(1.0), 255);
        assert_eq!(quantize_byte(0.5), 128);
        assert_eq!(quantize_byte(4.0), 255);
        assert_eq!(quantize_byte(-0.3), 0);
        assert_eq!(quantize_byte(f32::NAN), 0);
    }

    #[test]
    fn test_frame_order_log_scheme() {
        let encoder = default_encoder(EncodingScheme::LogInverseSplit14, 3);
        let frame = voiced_frame(220.0, vec![1.0, 0.5, 0.1]);
        let updates = encoder.encode(&frame);

        let addrs: Vec<&str> = updates.iter().map(|u| u.addr.as_str()).collect();
        assert_eq!(
            addrs,
            vec![
                "/avatar/parameters/FT_L",
                "/avatar/parameters/FT_H",
                "/avatar/parameters/G1",
                "/avatar/parameters/G2",
                "/avatar/parameters/G3",
                "/avatar/parameters/F1_L",
                "/avatar/parameters/F1_H",
                "/avatar/parameters/F2_L",
                "/avatar/parameters/F2_H",
                "/avatar/parameters/F3_L",
                "/avatar/parameters/F3_H",
                "/avatar/parameters/F4_L",
                "/avatar/parameters/F4_H",
            ]
        );
        // Undefined formant slots carry the sentinel pair.
        assert_eq!(updates[9].value, ParamValue::Float(FIELD_SENTINEL));
        assert_eq!(updates[10].value, ParamValue::Float(FIELD_SENTINEL));
    }

    #[test]
    fn test_unvoiced_frame_sends_pitch_pair_only() {
        let encoder = default_encoder(EncodingScheme::LogInverseSplit14, 10);
        let frame = FeatureVector {
            f0_hz: 0.0,
            harmonic_ratios: vec![0.0; 10],
            formants_hz: [None; MAX_FORMANTS],
            peak_ratio: 0.0,
        };
        let updates = encoder.encode(&frame);
        assert_eq!(updates.len(), 2);
        // Index 0 splits to zero fields, which encode as sentinels.
        assert_eq!(updates[0].value, ParamValue::Float(FIELD_SENTINEL));
        assert_eq!(updates[1].value, ParamValue::Float(FIELD_SENTINEL));
    }

    #[test]
    fn test_raw_split16_scheme() {
        let encoder = default_encoder(EncodingScheme::RawSplit16, 2);
        let frame = voiced_frame(437.4, vec![1.0, 0.25]);
        let updates = encoder.encode(&frame);

        // 437 = 0x01B5: low byte 0xB5 (181), high byte 0x01.
        assert_eq!(updates[0].value, ParamValue::Int(181));
        assert_eq!(updates[1].value, ParamValue::Int(1));
        assert_eq!(updates[2].value, ParamValue::Int(255));
        assert_eq!(updates[3].value, ParamValue::Int(64));
        // No formant slots in this legacy scheme.
        assert_eq!(updates.len(), 4);
    }

    #[test]
    fn test_inverse_split7_scheme_recovers_hz() {
        let encoder = default_encoder(EncodingScheme::InverseSplit7, 1);
        let frame = voiced_frame(220.0, vec![0.5]);
        let updates = encoder.encode(&frame);

        let low = match updates[0].value {
            ParamValue::Float(v) => v,
            _ => panic!("expected float"),
        };
        let high = match updates[1].value {
            ParamValue::Float(v) => v,
            _ => panic!("expected float"),
        };
        let low_field = if low == FIELD_SENTINEL {
            0
        } else {
            (1.0 / low).round() as u32
        };
        let high_field = if high == FIELD_SENTINEL {
            0
        } else {
            (1.0 / high).round() as u32
        };
        assert_eq!(join_fields(low_field, high_field, WIRE_FIELD_BITS), 220);
        // Gains stay as float ratios in this scheme.
        assert_eq!(updates[2].value, ParamValue::Float(0.5));
    }

    #[test]
    fn test_log_scheme_pitch_roundtrips_within_one_step() {
        let encoder = default_encoder(EncodingScheme::LogInverseSplit14, 1);
        let frame = voiced_frame(220.0, vec![0.5]);
        let updates = encoder.encode(&frame);

        let decode = |value: &ParamValue| -> u32 {
            match value {
                ParamValue::Float(v) if *v == FIELD_SENTINEL => 0,
                ParamValue::Float(v) => (1.0 / v).round() as u32,
                _ => panic!("expected float"),
            }
        };
        let index = join_fields(
            decode(&updates[0].value),
            decode(&updates[1].value),
            WIRE_FIELD_BITS,
        );
        // Invert the log mapping and check we land back near 220 Hz.
        let (min_hz, max_hz) = (82.407f32, 783.991f32);
        let t = index as f32 / ((1 << 14) - 1) as f32;
        let hz = (min_hz.ln() + t * (max_hz.ln() - min_hz.ln())).exp();
        assert!((hz - 220.0).abs() < 0.5, "decoded {} Hz", hz);
    }
}
