//! Transcode stage: format conversion, frame extraction and crop-filtered
//! re-encoding.
//!
//! The caller allocates (and tracks) the output path before calling
//! [`TranscodeStage::run`], so an interrupted encode still leaves a known
//! path behind for cleanup.

mod format;
mod timestamp;

pub use format::{content_type_for, normalize_container, ImageFormat, DEFAULT_CONTAINER};
pub use timestamp::{default_capture_time, format_seek, resolve_capture_time, EDGE_MARGIN_SECS};

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error};

use crate::crop::CropRegion;
use crate::engine::{
    EngineCommand, MediaSource, ProcessInvoker, ProgressLogger, StageError, StageOutcome,
};
use crate::metrics::STAGE_DURATION;

/// What a transform stage should produce.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeRequest {
    /// Re-encode into the container named by `container` (also the extension).
    Convert { container: String },
    /// A single frame at `timestamp_secs`.
    Frame {
        timestamp_secs: f64,
        format: ImageFormat,
    },
    /// Re-encode with the crop filter applied.
    Crop {
        region: CropRegion,
        container: String,
    },
}

impl TranscodeRequest {
    /// Extension of the artifact this request produces.
    pub fn extension(&self) -> &str {
        match self {
            Self::Convert { container } | Self::Crop { container, .. } => container,
            Self::Frame { format, .. } => format.extension(),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Frame { format, .. } => format.content_type(),
            _ => content_type_for(self.extension()),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Convert { .. } => "convert",
            Self::Frame { .. } => "frame",
            Self::Crop { .. } => "crop",
        }
    }

    /// Builds the engine command writing to `output`.
    pub fn build_command(
        &self,
        input: MediaSource,
        output: impl Into<PathBuf>,
        duration_secs: Option<f64>,
    ) -> EngineCommand {
        let command = EngineCommand::transform(input, output);
        match self {
            Self::Convert { .. } => command.with_expected_duration(duration_secs),
            Self::Frame {
                timestamp_secs,
                format,
            } => command
                // Seeking before the input decodes only from the nearest keyframe
                .with_input_options(["-ss".to_string(), format_seek(*timestamp_secs)])
                .with_options(["-frames:v", "1", "-update", "1"])
                .with_options(format.encoder_args().iter().copied()),
            Self::Crop { region, .. } => command
                .with_options(["-vf".to_string(), region.filter_expr()])
                .with_expected_duration(duration_secs),
        }
    }
}

/// Runs transform-mode invocations.
pub struct TranscodeStage<'a, I: ProcessInvoker + ?Sized> {
    invoker: &'a I,
}

impl<'a, I: ProcessInvoker + ?Sized> TranscodeStage<'a, I> {
    pub fn new(invoker: &'a I) -> Self {
        Self { invoker }
    }

    /// Produces `output` from `input`.
    ///
    /// Succeeds only when the engine exits cleanly and the output exists
    /// with a non-zero size.
    pub async fn run(
        &self,
        request: &TranscodeRequest,
        input: MediaSource,
        output: &Path,
        duration_secs: Option<f64>,
        job_id: &str,
    ) -> StageOutcome<PathBuf> {
        let start = Instant::now();
        let command = request.build_command(input, output, duration_secs);
        let mut observer = ProgressLogger::new(job_id, "transcode");

        let result = self.invoke_and_verify(&command, output, &mut observer).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome_label(),
        };
        STAGE_DURATION
            .with_label_values(&["transcode", outcome])
            .observe(start.elapsed().as_secs_f64());

        match &result {
            Ok(_) => debug!(
                job_id,
                kind = request.label(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Transcode produced {}",
                output.display()
            ),
            Err(e) => error!(job_id, kind = request.label(), "Transcode failed: {}", e),
        }

        result
    }

    async fn invoke_and_verify(
        &self,
        command: &EngineCommand,
        output: &Path,
        observer: &mut ProgressLogger,
    ) -> StageOutcome<PathBuf> {
        self.invoker.invoke(command, observer).await?;

        let metadata = tokio::fs::metadata(output).await.map_err(|e| {
            StageError::resource(format!(
                "Engine reported success but {} is unreadable: {}",
                output.display(),
                e
            ))
        })?;
        if metadata.len() == 0 {
            return Err(StageError::resource(format!(
                "Engine produced an empty output: {}",
                output.display()
            )));
        }
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_for(request: &TranscodeRequest) -> Vec<String> {
        request
            .build_command(MediaSource::path("/up/in.mp4"), "/out/result", Some(8.0))
            .to_args(&[])
    }

    #[test]
    fn test_convert_command() {
        let request = TranscodeRequest::Convert {
            container: "webm".to_string(),
        };
        let args = args_for(&request);
        assert_eq!(
            args,
            vec![
                "-hide_banner",
                "-nostdin",
                "-y",
                "-i",
                "/up/in.mp4",
                "-progress",
                "pipe:2",
                "/out/result"
            ]
        );
        assert_eq!(request.extension(), "webm");
        assert_eq!(request.content_type(), "video/webm");
    }

    #[test]
    fn test_frame_command_seeks_before_input() {
        let request = TranscodeRequest::Frame {
            timestamp_secs: 1.0,
            format: ImageFormat::Avif,
        };
        let args = args_for(&request);
        let seek = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(seek < input);
        assert_eq!(args[seek + 1], "1.000");
        assert!(args.contains(&"-frames:v".to_string()));
        assert!(args.contains(&"libaom-av1".to_string()));
        assert_eq!(request.content_type(), "image/avif");

        let command = request.build_command(MediaSource::path("/up/in.mp4"), "/out/x.avif", Some(8.0));
        assert_eq!(command.expected_duration_secs, None);
    }

    #[test]
    fn test_crop_command_applies_filter() {
        let request = TranscodeRequest::Crop {
            region: CropRegion {
                width: 1920,
                height: 800,
                x: 0,
                y: 140,
            },
            container: "mp4".to_string(),
        };
        let args = args_for(&request);
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "crop=1920:800:0:140");
        assert_eq!(request.extension(), "mp4");
    }
}
