//! Caller-visible error taxonomy.

use thiserror::Error;

use crate::engine::StageError;
use crate::probe::ProbeError;

/// Everything an operation can fail with.
///
/// Validation-class variants (including [`PipelineError::NoCropDetected`])
/// describe the caller's input; the rest are server faults.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("{reason}")]
    Validation { reason: String },

    #[error("Unsupported image format '{format}', expected one of jpg, jpeg, png, webp, avif")]
    UnsupportedImageFormat { format: String },

    #[error("Media has no usable duration ({duration})")]
    InvalidDuration { duration: f64 },

    #[error("no black bars detected")]
    NoCropDetected,

    #[error("Probe failed: {message}")]
    Probe { message: String },

    /// The engine's diagnostic text, verbatim.
    #[error("{message}")]
    Engine { message: String },

    #[error("Engine timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("{message}")]
    Resource { message: String },
}

impl PipelineError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource {
            message: message.into(),
        }
    }

    /// Stable snake_case tag for responses and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::UnsupportedImageFormat { .. } => "unsupported_image_format",
            Self::InvalidDuration { .. } => "invalid_duration",
            Self::NoCropDetected => "no_crop_detected",
            Self::Probe { .. } => "probe_failed",
            Self::Engine { .. } => "engine_failure",
            Self::Timeout { .. } => "timeout",
            Self::Resource { .. } => "resource_error",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::UnsupportedImageFormat { .. }
                | Self::InvalidDuration { .. }
                | Self::NoCropDetected
        )
    }
}

impl From<StageError> for PipelineError {
    fn from(err: StageError) -> Self {
        match err {
            StageError::EngineFailure { message } => Self::Engine { message },
            StageError::Timeout { timeout_secs } => Self::Timeout { timeout_secs },
            StageError::Resource { message } => Self::Resource { message },
        }
    }
}

impl From<ProbeError> for PipelineError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::EmptySource => Self::validation("No media source given"),
            ProbeError::Engine(StageError::Timeout { timeout_secs }) => {
                Self::Timeout { timeout_secs }
            }
            ProbeError::Engine(stage) => Self::Probe {
                message: stage.to_string(),
            },
            ProbeError::Malformed { reason } => Self::Probe { message: reason },
        }
    }
}
