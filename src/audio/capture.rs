// Microphone capture via cpal
//
// The capture callback only appends to the sample ring; all analysis happens
// on the worker thread. Multichannel devices are reduced to their first
// channel, matching what the analyzers expect.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, SupportedStreamConfig};
use std::sync::Arc;
use tracing::warn;

use crate::audio::ring_buffer::SampleRing;
use crate::error::PipelineError;

/// Names of the available input devices, for device selection UIs and the
/// CLI's --list-devices.
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    match host.input_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(err) => {
            warn!("failed to enumerate input devices: {}", err);
            Vec::new()
        }
    }
}

/// Resolve the capture device: the named device when given, the host default
/// otherwise.
pub fn resolve_input_device(
    name: Option<&str>,
) -> Result<(Device, SupportedStreamConfig), PipelineError> {
    let host = cpal::default_host();

    let device = match name {
        Some(wanted) => host
            .input_devices()
            .map_err(|err| {
                warn!("device enumeration failed: {}", err);
                PipelineError::DeviceUnavailable {
                    name: wanted.to_string(),
                }
            })?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| PipelineError::DeviceUnavailable {
                name: wanted.to_string(),
            })?,
        None => host
            .default_input_device()
            .ok_or_else(|| PipelineError::DeviceUnavailable {
                name: String::new(),
            })?,
    };

    let config = device
        .default_input_config()
        .map_err(|e| PipelineError::StreamOpenFailed {
            reason: format!("Failed to get default input config: {:?}", e),
        })?;

    Ok((device, config))
}

/// Build the input stream feeding `ring`. The stream is returned paused;
/// the caller starts it with `play()`.
pub fn build_input_stream(
    device: &Device,
    config: &SupportedStreamConfig,
    ring: Arc<SampleRing>,
) -> Result<cpal::Stream, PipelineError> {
    let stream_config: cpal::StreamConfig = config.clone().into();
    let channel_count = stream_config.channels as usize;

    let err_fn = |err| warn!("input stream error: {}", err);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if channel_count == 1 {
                    ring.append(data);
                } else {
                    // De-interleave: take first channel
                    let mono: Vec<f32> = data
                        .chunks(channel_count)
                        .map(|frame| frame.first().copied().unwrap_or(0.0))
                        .collect();
                    ring.append(&mono);
                }
            },
            err_fn,
            None,
        ),
        other => {
            return Err(PipelineError::StreamOpenFailed {
                reason: format!("Unsupported input sample format: {:?}", other),
            })
        }
    }
    .map_err(|e| PipelineError::StreamOpenFailed {
        reason: format!("{:?}", e),
    })?;

    Ok(stream)
}
