//! voxlink: real-time voice feature streaming over OSC.
//!
//! Captures microphone audio into a bounded sample ring, analyzes it at a
//! fixed drift-corrected rate (pitch, harmonic gains, formants), quantizes
//! the features into the avatar wire format, and streams them as OSC
//! parameter updates over UDP.
//!
//! The typical embedding is:
//!
//! ```no_run
//! use voxlink::config::PipelineConfig;
//! use voxlink::pipeline::VoicePipeline;
//!
//! let mut pipeline = VoicePipeline::new(PipelineConfig::default())?;
//! pipeline.start(None)?;
//! // ... run until shutdown ...
//! pipeline.stop()?;
//! # Ok::<(), voxlink::error::PipelineError>(())
//! ```

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod protocol;

pub use analysis::{FeatureFrame, SharedLevel};
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use pipeline::VoicePipeline;
