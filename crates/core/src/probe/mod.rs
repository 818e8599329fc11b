//! Metadata probe.
//!
//! Runs the engine's inspection mode against a local path or a remote URL
//! and parses its JSON report into [`MediaMetadata`].

mod error;
mod parse;
mod types;

pub use error::ProbeError;
pub use parse::parse_probe_output;
pub use types::{FormatDescriptor, MediaMetadata, StreamDescriptor, StreamKind};

use std::time::Instant;
use tracing::debug;

use crate::engine::{EngineCommand, MediaSource, ProcessInvoker, ProgressLogger, StageError};
use crate::metrics::STAGE_DURATION;

/// Probes `source` and returns its metadata.
///
/// The source must name something; reachability of a URL is judged only
/// by the engine's exit status.
pub async fn probe<I: ProcessInvoker + ?Sized>(
    invoker: &I,
    source: &MediaSource,
    job_id: &str,
) -> Result<MediaMetadata, ProbeError> {
    if source.is_empty() {
        return Err(ProbeError::EmptySource);
    }

    let start = Instant::now();
    let command = EngineCommand::inspect(source.clone());
    let mut observer = ProgressLogger::new(job_id, "probe");

    let mut engine_ms = 0;
    let result = match invoker.invoke(&command, &mut observer).await {
        Ok(invocation) => {
            engine_ms = invocation.elapsed_ms;
            let stdout = String::from_utf8_lossy(&invocation.stdout);
            parse_probe_output(&stdout)
        }
        Err(e) => Err(ProbeError::Engine(StageError::from(e))),
    };

    let outcome = match &result {
        Ok(_) => "success",
        Err(ProbeError::Engine(stage)) => stage.outcome_label(),
        Err(_) => "malformed",
    };
    STAGE_DURATION
        .with_label_values(&["probe", outcome])
        .observe(start.elapsed().as_secs_f64());

    if let Ok(metadata) = &result {
        debug!(
            job_id,
            format = %metadata.format.name,
            duration_secs = metadata.duration_secs,
            streams = metadata.streams.len(),
            engine_ms,
            "Probed {}",
            source
        );
    }

    result
}
