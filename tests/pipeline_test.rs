// End-to-end analysis loop tests, run against a pre-filled ring and a
// recording transport so no audio device or UDP receiver is needed.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use voxlink::analysis::features::FeatureExtractor;
use voxlink::analysis::formant::LpcFormant;
use voxlink::analysis::pitch::AutocorrelationPitch;
use voxlink::analysis::{
    frame_channel, spawn_analysis_thread, AnalysisWorker, SharedLevel, WorkerParts,
};
use voxlink::audio::ring_buffer::SampleRing;
use voxlink::config::{EncodingConfig, OscAddresses, PipelineConfig};
use voxlink::error::PipelineError;
use voxlink::pipeline::VoicePipeline;
use voxlink::protocol::encoding::{FrameEncoder, ParamUpdate, ParamValue};
use voxlink::protocol::osc::ParamTransport;

/// Transport that records every update instead of sending it.
#[derive(Clone)]
struct RecordingTransport {
    updates: Arc<Mutex<Vec<ParamUpdate>>>,
}

impl RecordingTransport {
    fn new() -> Self {
        Self {
            updates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn recorded(&self) -> Vec<ParamUpdate> {
        self.updates.lock().unwrap().clone()
    }

    fn count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

impl ParamTransport for RecordingTransport {
    fn send(&self, update: &ParamUpdate) {
        self.updates.lock().unwrap().push(update.clone());
    }
}

fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

struct Harness {
    running: Arc<AtomicBool>,
    cycles: Arc<AtomicU64>,
    transport: RecordingTransport,
    frames: tokio::sync::broadcast::Receiver<voxlink::FeatureFrame>,
    worker: AnalysisWorker,
}

fn build_harness(ring: Arc<SampleRing>, rate_hz: f32, harmonics: usize) -> Harness {
    let running = Arc::new(AtomicBool::new(true));
    let cycles = Arc::new(AtomicU64::new(0));
    let transport = RecordingTransport::new();
    let sender = frame_channel();
    let frames = sender.subscribe();

    let worker = AnalysisWorker::new(WorkerParts {
        ring,
        sample_rate: 48_000,
        min_window: 1024,
        running: Arc::clone(&running),
        amp_ref: SharedLevel::new(0.05),
        peak_ratio: SharedLevel::new(0.0),
        extractor: FeatureExtractor::new(harmonics, 0),
        pitch: Box::new(AutocorrelationPitch::default()),
        formant: Box::new(LpcFormant::default()),
        encoder: FrameEncoder::new(&EncodingConfig::default(), &OscAddresses::default(), harmonics),
        transport: Box::new(transport.clone()),
        frames: sender,
        cycles: Arc::clone(&cycles),
        rate_hz,
    });

    Harness {
        running,
        cycles,
        transport,
        frames,
        worker,
    }
}

#[test]
fn test_tone_flows_from_ring_to_transport() {
    // Half a second of buffer at 48 kHz, pre-filled with a 200 Hz tone.
    let ring = Arc::new(SampleRing::new(24_000));
    ring.append(&sine(200.0, 48_000, 48_000));

    let mut harness = build_harness(Arc::clone(&ring), 60.0, 3);
    let transport = harness.transport.clone();
    let handle = spawn_analysis_thread(harness.worker);

    thread::sleep(Duration::from_millis(1000));
    harness.running.store(false, Ordering::Release);
    handle.join().unwrap();

    // ~60 cycles in a second; the drift-corrected clock catches up after
    // slow cycles, so the count tracks wall time closely.
    let cycles = harness.cycles.load(Ordering::Acquire);
    assert!(cycles >= 55, "only {} cycles completed", cycles);

    // Every observed frame detected the 200 Hz tone.
    let mut frames_seen = 0;
    loop {
        use tokio::sync::broadcast::error::TryRecvError;
        match harness.frames.try_recv() {
            Ok(frame) => {
                frames_seen += 1;
                assert!(
                    (frame.features.f0_hz - 200.0).abs() < 6.0,
                    "cycle {} detected {} Hz",
                    frame.cycle,
                    frame.features.f0_hz
                );
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    assert!(frames_seen > 0);

    // A full-scale tone saturates G1 and leaves G3 near silence.
    let updates = transport.recorded();
    let value_of = |addr: &str| -> Vec<ParamValue> {
        updates
            .iter()
            .filter(|u| u.addr == addr)
            .map(|u| u.value)
            .collect()
    };
    let g1 = value_of("/avatar/parameters/G1");
    let g3 = value_of("/avatar/parameters/G3");
    assert!(!g1.is_empty());
    assert_eq!(g1.len(), g3.len());
    for value in g1 {
        assert_eq!(value, ParamValue::Float(1.0));
    }
    for value in g3 {
        match value {
            ParamValue::Float(v) => assert!(v < 0.1, "G3 = {}", v),
            other => panic!("unexpected {:?}", other),
        }
    }

    // Nothing is sent after stop() has joined the worker.
    let sent = transport.count();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(transport.count(), sent);
}

#[test]
fn test_short_buffer_skips_cycles_without_sending() {
    let ring = Arc::new(SampleRing::new(24_000));
    ring.append(&sine(200.0, 48_000, 500)); // below the 1024-sample minimum

    let harness = build_harness(Arc::clone(&ring), 60.0, 3);
    let transport = harness.transport.clone();
    let handle = spawn_analysis_thread(harness.worker);

    thread::sleep(Duration::from_millis(200));
    harness.running.store(false, Ordering::Release);
    handle.join().unwrap();

    assert_eq!(transport.count(), 0);
    assert_eq!(harness.cycles.load(Ordering::Acquire), 0);
}

#[test]
fn test_unvoiced_input_sends_pitch_pair_only() {
    let ring = Arc::new(SampleRing::new(24_000));
    ring.append(&vec![0.0; 24_000]);

    let harness = build_harness(Arc::clone(&ring), 120.0, 3);
    let transport = harness.transport.clone();
    let handle = spawn_analysis_thread(harness.worker);

    thread::sleep(Duration::from_millis(150));
    harness.running.store(false, Ordering::Release);
    handle.join().unwrap();

    let updates = transport.recorded();
    assert!(!updates.is_empty());
    for update in &updates {
        assert!(
            update.addr == "/avatar/parameters/FT_L" || update.addr == "/avatar/parameters/FT_H",
            "unexpected address {} on an unvoiced frame",
            update.addr
        );
        // Undetected pitch encodes as the sentinel on both fields.
        assert_eq!(update.value, ParamValue::Float(-1.0));
    }
}

#[test]
fn test_pipeline_sensitivity_rejection_keeps_previous_value() {
    let pipeline = VoicePipeline::new(PipelineConfig::default()).unwrap();
    pipeline.set_sensitivity(0.2).unwrap();

    let err = pipeline.set_sensitivity(-1.0).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InvalidParameter {
            name: "sensitivity",
            ..
        }
    ));
    assert_eq!(pipeline.sensitivity(), 0.2);
}
