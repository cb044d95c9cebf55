// Error types for the voxlink pipeline
//
// Per-cycle analysis failures never surface here: estimator failures degrade
// to "undetected" inside the extractor and transport send failures are
// dropped. These variants cover lifecycle and configuration faults only.

use log::error;
use std::fmt;

/// Pipeline lifecycle and configuration errors.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// No capture device is available, or the named device was not found.
    /// Recoverable by retrying `start()` with a valid device.
    DeviceUnavailable { name: String },

    /// The pipeline is already running.
    AlreadyRunning,

    /// Failed to open or start the capture stream.
    StreamOpenFailed { reason: String },

    /// Failed to bind or connect the outbound UDP socket.
    TransportUnavailable { reason: String },

    /// A runtime parameter was rejected; the previous value is retained.
    InvalidParameter { name: &'static str, value: f32 },

    /// The configuration failed validation at construction.
    InvalidConfig { reason: String },
}

impl PipelineError {
    pub fn message(&self) -> String {
        match self {
            PipelineError::DeviceUnavailable { name } => {
                if name.is_empty() {
                    "No capture device available".to_string()
                } else {
                    format!("Capture device not found: {}", name)
                }
            }
            PipelineError::AlreadyRunning => {
                "Pipeline already running. Call stop() first.".to_string()
            }
            PipelineError::StreamOpenFailed { reason } => {
                format!("Failed to open capture stream: {}", reason)
            }
            PipelineError::TransportUnavailable { reason } => {
                format!("Failed to set up transport socket: {}", reason)
            }
            PipelineError::InvalidParameter { name, value } => {
                format!("Invalid value {} for parameter '{}'", value, name)
            }
            PipelineError::InvalidConfig { reason } => {
                format!("Invalid configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::TransportUnavailable {
            reason: err.to_string(),
        }
    }
}

/// Log a pipeline error with the operation it occurred in.
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    error!("Pipeline error in {}: {}", context, err.message());
}
