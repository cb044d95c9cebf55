//! Analysis thread: fixed-rate feature extraction and parameter emission.
//!
//! The worker owns everything the per-cycle path touches (FFT planner,
//! estimators, encoder, transport) so the hot loop takes no locks beyond
//! the ring snapshot.

pub mod clock;
pub mod features;
pub mod formant;
pub mod pitch;
pub mod spectrum;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::analysis::clock::TickClock;
use crate::analysis::features::{FeatureExtractor, FeatureVector};
use crate::analysis::formant::FormantEstimator;
use crate::analysis::pitch::PitchEstimator;
use crate::audio::ring_buffer::SampleRing;
use crate::protocol::encoding::FrameEncoder;
use crate::protocol::osc::ParamTransport;

/// One analysis cycle's output, published to observers.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    pub features: FeatureVector,
    /// Completed-cycle ordinal, starting at 1.
    pub cycle: u64,
}

/// f32 shared across threads as atomic bits. Plain load/store is enough:
/// readers only ever want "a recent value".
#[derive(Clone)]
pub struct SharedLevel(Arc<AtomicU32>);

impl SharedLevel {
    pub fn new(value: f32) -> Self {
        Self(Arc::new(AtomicU32::new(value.to_bits())))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Frame broadcast channel depth; slow observers lose old frames, never
/// stall the worker.
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// State owned by the analysis thread.
pub struct AnalysisWorker {
    ring: Arc<SampleRing>,
    sample_rate: u32,
    min_window: usize,
    running: Arc<AtomicBool>,
    amp_ref: SharedLevel,
    peak_ratio: SharedLevel,
    extractor: FeatureExtractor,
    pitch: Box<dyn PitchEstimator>,
    formant: Box<dyn FormantEstimator>,
    encoder: FrameEncoder,
    transport: Box<dyn ParamTransport>,
    frames: broadcast::Sender<FeatureFrame>,
    cycles: Arc<AtomicU64>,
    clock: TickClock,
}

/// Everything the worker needs, assembled by the pipeline before spawn.
pub struct WorkerParts {
    pub ring: Arc<SampleRing>,
    pub sample_rate: u32,
    pub min_window: usize,
    pub running: Arc<AtomicBool>,
    pub amp_ref: SharedLevel,
    pub peak_ratio: SharedLevel,
    pub extractor: FeatureExtractor,
    pub pitch: Box<dyn PitchEstimator>,
    pub formant: Box<dyn FormantEstimator>,
    pub encoder: FrameEncoder,
    pub transport: Box<dyn ParamTransport>,
    pub frames: broadcast::Sender<FeatureFrame>,
    pub cycles: Arc<AtomicU64>,
    pub rate_hz: f32,
}

impl AnalysisWorker {
    pub fn new(parts: WorkerParts) -> Self {
        Self {
            ring: parts.ring,
            sample_rate: parts.sample_rate,
            min_window: parts.min_window,
            running: parts.running,
            amp_ref: parts.amp_ref,
            peak_ratio: parts.peak_ratio,
            extractor: parts.extractor,
            pitch: parts.pitch,
            formant: parts.formant,
            encoder: parts.encoder,
            transport: parts.transport,
            frames: parts.frames,
            cycles: parts.cycles,
            clock: TickClock::new(parts.rate_hz),
        }
    }

    /// Run analysis cycles until the running flag is cleared.
    pub fn run(mut self) {
        info!(
            sample_rate = self.sample_rate,
            interval_us = self.clock.interval().as_micros() as u64,
            "analysis thread started"
        );

        while self.clock.tick(&self.running) {
            let snapshot = self.ring.snapshot();
            if snapshot.len() < self.min_window {
                debug!(
                    have = snapshot.len(),
                    need = self.min_window,
                    "buffer not ready, skipping cycle"
                );
                continue;
            }

            let features = self.extractor.analyze(
                &snapshot,
                self.sample_rate,
                self.pitch.as_mut(),
                self.formant.as_mut(),
                self.amp_ref.load(),
            );

            for update in self.encoder.encode(&features) {
                self.transport.send(&update);
            }

            self.peak_ratio.store(features.peak_ratio);
            let cycle = self.cycles.fetch_add(1, Ordering::Release) + 1;
            // Observers are optional; a send error just means nobody is
            // subscribed right now.
            let _ = self.frames.send(FeatureFrame { features, cycle });
        }

        info!(
            cycles = self.cycles.load(Ordering::Acquire),
            "analysis thread stopped"
        );
    }
}

/// Create the frame broadcast channel shared by the worker and observers.
pub fn frame_channel() -> broadcast::Sender<FeatureFrame> {
    broadcast::channel(FRAME_CHANNEL_CAPACITY).0
}

/// Spawn the analysis thread.
pub fn spawn_analysis_thread(worker: AnalysisWorker) -> JoinHandle<()> {
    thread::Builder::new()
        .name("voxlink-analysis".to_string())
        .spawn(move || worker.run())
        .unwrap_or_else(|err| panic!("failed to spawn analysis thread: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_level_roundtrip() {
        let level = SharedLevel::new(0.05);
        assert_eq!(level.load(), 0.05);
        level.store(1.25);
        assert_eq!(level.load(), 1.25);
    }

    #[test]
    fn test_shared_level_clones_share_storage() {
        let a = SharedLevel::new(0.0);
        let b = a.clone();
        b.store(0.7);
        assert_eq!(a.load(), 0.7);
    }
}
