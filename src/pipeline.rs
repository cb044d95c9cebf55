//! Pipeline lifecycle and control surface.
//!
//! A `VoicePipeline` ties the capture stream, sample ring, and analysis
//! thread together. Construction validates configuration; `start()` opens
//! the device and spawns the worker; `stop()` tears both down. The struct is
//! not `Send` (it owns the cpal stream), so it lives on whichever thread
//! drives the application.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::StreamTrait;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::analysis::features::FeatureExtractor;
use crate::analysis::formant::{FormantEstimator, LpcFormant};
use crate::analysis::pitch::{AutocorrelationPitch, PitchEstimator};
use crate::analysis::{
    frame_channel, spawn_analysis_thread, AnalysisWorker, FeatureFrame, SharedLevel, WorkerParts,
};
use crate::audio::capture;
use crate::audio::ring_buffer::SampleRing;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::protocol::encoding::{EncodingScheme, FrameEncoder};
use crate::protocol::osc::{OscTransport, ParamTransport};

struct RunningState {
    // Held to keep capture alive; dropped after the worker joins.
    _stream: cpal::Stream,
    worker: JoinHandle<()>,
}

/// The voice-to-parameter pipeline.
pub struct VoicePipeline {
    config: PipelineConfig,
    running: Arc<AtomicBool>,
    amp_ref: SharedLevel,
    peak_ratio: SharedLevel,
    cycles: Arc<AtomicU64>,
    frames: broadcast::Sender<FeatureFrame>,
    state: Option<RunningState>,
}

impl VoicePipeline {
    /// Validate `config` and construct a stopped pipeline.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let amp_ref = SharedLevel::new(config.amp_ref);
        Ok(Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            amp_ref,
            peak_ratio: SharedLevel::new(0.0),
            cycles: Arc::new(AtomicU64::new(0)),
            frames: frame_channel(),
            state: None,
        })
    }

    /// Start capture and analysis with the default estimators and the OSC
    /// transport from the configuration.
    pub fn start(&mut self, device_name: Option<&str>) -> Result<(), PipelineError> {
        let transport = OscTransport::connect(&self.config.osc.host, self.config.osc.port)?;
        let (f_min, f_max) = self.config.encoding.formant_range_hz;
        self.start_with(
            device_name,
            Box::new(transport),
            Box::new(AutocorrelationPitch::default()),
            Box::new(LpcFormant::new(12, f_min as f64, f_max as f64)),
        )
    }

    /// Start with caller-supplied transport and estimators.
    pub fn start_with(
        &mut self,
        device_name: Option<&str>,
        transport: Box<dyn ParamTransport>,
        pitch: Box<dyn PitchEstimator>,
        formant: Box<dyn FormantEstimator>,
    ) -> Result<(), PipelineError> {
        if self.state.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }

        let (device, stream_config) = capture::resolve_input_device(device_name)?;
        let sample_rate = stream_config.sample_rate().0;

        let capacity = (self.config.buffer_seconds * sample_rate as f32).round() as usize;
        let ring = Arc::new(SampleRing::new(capacity.max(1)));

        let stream = capture::build_input_stream(&device, &stream_config, Arc::clone(&ring))?;
        stream.play().map_err(|e| PipelineError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })?;

        // Legacy raw-split avatars have no formant slots; skip the LPC work.
        let formant_count = match self.config.encoding.scheme {
            EncodingScheme::RawSplit16 => 0,
            _ => self.config.encoding.formant_count,
        };

        self.cycles.store(0, Ordering::Release);
        self.peak_ratio.store(0.0);
        self.running.store(true, Ordering::Release);

        let worker = spawn_analysis_thread(AnalysisWorker::new(WorkerParts {
            ring,
            sample_rate,
            min_window: self.config.min_analysis_window,
            running: Arc::clone(&self.running),
            amp_ref: self.amp_ref.clone(),
            peak_ratio: self.peak_ratio.clone(),
            extractor: FeatureExtractor::new(self.config.harmonic_count, formant_count),
            pitch,
            formant,
            encoder: FrameEncoder::new(
                &self.config.encoding,
                &self.config.osc.addresses,
                self.config.harmonic_count,
            ),
            transport,
            frames: self.frames.clone(),
            cycles: Arc::clone(&self.cycles),
            rate_hz: self.config.target_rate_hz,
        }));

        self.state = Some(RunningState {
            _stream: stream,
            worker,
        });
        info!(sample_rate, capacity, "pipeline started");
        Ok(())
    }

    /// Stop capture and analysis. Idempotent: stopping a stopped pipeline is
    /// a no-op. No parameters are sent after this returns.
    pub fn stop(&mut self) -> Result<(), PipelineError> {
        let state = match self.state.take() {
            Some(state) => state,
            None => return Ok(()),
        };

        self.running.store(false, Ordering::Release);
        if state.worker.join().is_err() {
            warn!("analysis thread panicked before join");
        }
        // The stream drops here, after the worker has exited.
        info!(
            cycles = self.cycles.load(Ordering::Acquire),
            "pipeline stopped"
        );
        Ok(())
    }

    /// Update the reference amplitude used for harmonic normalization.
    /// Rejected values leave the previous setting in place.
    pub fn set_sensitivity(&self, amp_ref: f32) -> Result<(), PipelineError> {
        if !amp_ref.is_finite() || amp_ref <= 0.0 {
            return Err(PipelineError::InvalidParameter {
                name: "sensitivity",
                value: amp_ref,
            });
        }
        self.amp_ref.store(amp_ref);
        Ok(())
    }

    pub fn sensitivity(&self) -> f32 {
        self.amp_ref.load()
    }

    /// Peak harmonic ratio from the most recent cycle, for level meters.
    pub fn peak_ratio(&self) -> f32 {
        self.peak_ratio.load()
    }

    /// Analysis cycles completed since the last start.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Subscribe to per-cycle feature frames. Slow subscribers miss frames
    /// rather than slowing the worker.
    pub fn subscribe_frames(&self) -> broadcast::Receiver<FeatureFrame> {
        self.frames.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }
}

impl Drop for VoicePipeline {
    fn drop(&mut self) {
        if self.state.is_some() {
            let _ = self.stop();
        }
    }
}
