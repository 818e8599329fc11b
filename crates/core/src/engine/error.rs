//! Error types for the engine module.

use thiserror::Error;

/// Errors raised while running the external engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The binary could not be started.
    #[error("Failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// The process ran and exited unsuccessfully.
    #[error("{program} exited with code {code:?}: {diagnostics}")]
    Exited {
        program: String,
        code: Option<i32>,
        diagnostics: String,
    },

    /// The process exceeded the configured stage timeout and was killed.
    #[error("Engine timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while talking to the child process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a spawn error for the given program.
    pub fn spawn(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Spawn {
            program: program.into(),
            reason: reason.into(),
        }
    }

    /// The engine's own diagnostic text, when the process got far enough to produce any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Exited { diagnostics, .. } if !diagnostics.is_empty() => Some(diagnostics),
            _ => None,
        }
    }
}

/// Failure half of a [`StageOutcome`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    /// Spawn failure or non-zero exit, carrying the engine's diagnostic text.
    #[error("{message}")]
    EngineFailure { message: String },

    /// The stage exceeded its configured time limit.
    #[error("Stage timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Filesystem failure around the stage (reading output, checking artifacts).
    #[error("{message}")]
    Resource { message: String },
}

impl StageError {
    pub fn engine_failure(message: impl Into<String>) -> Self {
        Self::EngineFailure {
            message: message.into(),
        }
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource {
            message: message.into(),
        }
    }

    /// Label used for stage metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::EngineFailure { .. } => "engine_failure",
            Self::Timeout { .. } => "timeout",
            Self::Resource { .. } => "resource_error",
        }
    }
}

impl From<EngineError> for StageError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Exited {
                ref diagnostics, ..
            } if !diagnostics.is_empty() => Self::engine_failure(diagnostics.clone()),
            EngineError::Timeout { timeout_secs } => Self::Timeout { timeout_secs },
            EngineError::Io(e) => Self::resource(e.to_string()),
            other => Self::engine_failure(other.to_string()),
        }
    }
}

/// Tagged result of one engine invocation.
pub type StageOutcome<T> = Result<T, StageError>;
