//! Error types for the probe module.

use thiserror::Error;

use crate::engine::StageError;

/// Errors that can occur while probing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    /// No path or URL was given.
    #[error("No media source given")]
    EmptySource,

    /// The inspection process failed.
    #[error("Probe failed: {0}")]
    Engine(StageError),

    /// The engine's report could not be parsed.
    #[error("Failed to parse media info: {reason}")]
    Malformed { reason: String },
}
