//! Pipeline orchestrator.
//!
//! Composes probe, crop detection and transcode stages into the public
//! operations. Every operation consumes its [`Job`] and closes it before
//! returning, on success and on failure alike; outputs leave as a
//! [`Delivery`] released from the job's tracker just before it closes.

mod error;
mod types;

pub use error::PipelineError;
pub use types::{Delivery, Thumbnail, ThumbnailProbe};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{Config, StorageConfig};
use crate::crop::{CropDetection, CropDetector};
use crate::engine::{MediaSource, ProcessInvoker};
use crate::job::{IdGenerator, Job, JobState, Operation, TimestampIdGenerator};
use crate::probe::{self, MediaMetadata};
use crate::transcode::{
    normalize_container, resolve_capture_time, ImageFormat, TranscodeRequest, TranscodeStage,
};

/// Runs jobs against a process invoker.
pub struct PipelineOrchestrator {
    invoker: Arc<dyn ProcessInvoker>,
    storage: StorageConfig,
    detector: CropDetector,
    default_thumbnail: ImageFormat,
    ids: Arc<dyn IdGenerator>,
}

impl PipelineOrchestrator {
    pub fn new(config: &Config, invoker: Arc<dyn ProcessInvoker>) -> Self {
        let default_thumbnail =
            ImageFormat::parse(&config.thumbnail.default_format).unwrap_or(ImageFormat::Jpg);
        Self {
            invoker,
            storage: config.storage.clone(),
            detector: CropDetector::new(config.crop.clone()),
            default_thumbnail,
            ids: Arc::new(TimestampIdGenerator::new()),
        }
    }

    /// Replaces the job id source.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn invoker(&self) -> &dyn ProcessInvoker {
        self.invoker.as_ref()
    }

    /// Creates the upload and output directories.
    pub async fn prepare(&self) -> Result<(), PipelineError> {
        for dir in [&self.storage.upload_dir, &self.storage.output_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                PipelineError::resource(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }

    /// Opens a job. It must be handed to one of the operations (or to
    /// [`PipelineOrchestrator::abandon`]) so that it is closed.
    pub fn begin(&self, operation: Operation) -> Job {
        let job = Job::new(self.ids.next_id(), operation, self.storage.clone());
        info!(job_id = job.id(), operation = operation.as_str(), "Job started");
        job
    }

    /// Closes a job that failed before reaching an operation (e.g. a broken upload).
    pub async fn abandon(&self, job: Job, error: PipelineError) -> PipelineError {
        match self.complete::<()>(job, Err(error)).await {
            Err(e) => e,
            Ok(()) => PipelineError::resource("job abandoned"),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Metadata of an uploaded file.
    pub async fn info(&self, mut job: Job) -> Result<MediaMetadata, PipelineError> {
        let result = self.run_info(&mut job).await;
        self.complete(job, result).await
    }

    /// Metadata of a remote URL.
    pub async fn probe(&self, url: &str) -> Result<MediaMetadata, PipelineError> {
        let mut job = self.begin(Operation::Probe);
        let result = self.run_probe(&mut job, url).await;
        self.complete(job, result).await
    }

    /// Metadata of a remote URL plus one frame from it.
    pub async fn probe_with_thumbnail(
        &self,
        url: &str,
        format: Option<&str>,
        time_secs: Option<f64>,
    ) -> Result<ThumbnailProbe, PipelineError> {
        let mut job = self.begin(Operation::ProbeWithThumbnail);
        let result = self
            .run_probe_with_thumbnail(&mut job, url, format, time_secs)
            .await;
        self.complete(job, result).await
    }

    /// Re-encodes an upload into `format` (default mp4).
    pub async fn convert(&self, mut job: Job, format: Option<&str>) -> Result<Delivery, PipelineError> {
        let result = self.run_convert(&mut job, format).await;
        self.complete(job, result).await
    }

    /// Extracts one frame of an upload.
    pub async fn screenshot(
        &self,
        mut job: Job,
        format: Option<&str>,
        time_secs: Option<f64>,
    ) -> Result<Delivery, PipelineError> {
        let result = self.run_screenshot(&mut job, format, time_secs).await;
        self.complete(job, result).await
    }

    /// Detects letterboxing and re-encodes the upload without it.
    pub async fn remove_letterbox(
        &self,
        mut job: Job,
        format: Option<&str>,
    ) -> Result<Delivery, PipelineError> {
        let result = self.run_remove_letterbox(&mut job, format).await;
        self.complete(job, result).await
    }

    // =========================================================================
    // Pipelines
    // =========================================================================

    async fn run_info(&self, job: &mut Job) -> Result<MediaMetadata, PipelineError> {
        let input = validated_input(job).await?;
        job.advance(JobState::Validated);

        job.advance(JobState::Probing);
        let metadata = probe::probe(self.invoker(), &MediaSource::Path(input), job.id()).await?;
        Ok(metadata)
    }

    async fn run_probe(&self, job: &mut Job, url: &str) -> Result<MediaMetadata, PipelineError> {
        let source = validated_url(url)?;
        job.advance(JobState::Validated);

        job.advance(JobState::Probing);
        Ok(probe::probe(self.invoker(), &source, job.id()).await?)
    }

    async fn run_probe_with_thumbnail(
        &self,
        job: &mut Job,
        url: &str,
        format: Option<&str>,
        time_secs: Option<f64>,
    ) -> Result<ThumbnailProbe, PipelineError> {
        let source = validated_url(url)?;
        let format = self.image_format(format)?;
        job.advance(JobState::Validated);

        job.advance(JobState::Probing);
        let metadata = probe::probe(self.invoker(), &source, job.id()).await?;
        let timestamp_secs = capture_time(&metadata, time_secs)?;

        job.advance(JobState::Processing);
        let request = TranscodeRequest::Frame {
            timestamp_secs,
            format,
        };
        let output = self
            .transcode(job, &request, source, Some(metadata.duration_secs))
            .await?;

        job.advance(JobState::Delivering);
        let delivered = release(job, &output)?;
        let bytes = delivered.read().await.map_err(|e| {
            PipelineError::resource(format!("Failed to read thumbnail: {}", e))
        })?;

        Ok(ThumbnailProbe {
            metadata,
            thumbnail: Thumbnail {
                format,
                content_type: format.content_type(),
                bytes,
            },
        })
    }

    async fn run_convert(
        &self,
        job: &mut Job,
        format: Option<&str>,
    ) -> Result<Delivery, PipelineError> {
        let input = validated_input(job).await?;
        let container = validated_container(format)?;
        job.advance(JobState::Validated);

        job.advance(JobState::Processing);
        let request = TranscodeRequest::Convert { container };
        let output = self
            .transcode(job, &request, MediaSource::Path(input), None)
            .await?;

        job.advance(JobState::Delivering);
        deliver(job, &request, &output)
    }

    async fn run_screenshot(
        &self,
        job: &mut Job,
        format: Option<&str>,
        time_secs: Option<f64>,
    ) -> Result<Delivery, PipelineError> {
        let format = self.image_format(format)?;
        let input = validated_input(job).await?;
        job.advance(JobState::Validated);

        job.advance(JobState::Probing);
        let source = MediaSource::Path(input);
        let metadata = probe::probe(self.invoker(), &source, job.id()).await?;
        let timestamp_secs = capture_time(&metadata, time_secs)?;

        job.advance(JobState::Processing);
        let request = TranscodeRequest::Frame {
            timestamp_secs,
            format,
        };
        let output = self
            .transcode(job, &request, source, Some(metadata.duration_secs))
            .await?;

        job.advance(JobState::Delivering);
        deliver(job, &request, &output)
    }

    async fn run_remove_letterbox(
        &self,
        job: &mut Job,
        format: Option<&str>,
    ) -> Result<Delivery, PipelineError> {
        let input = validated_input(job).await?;
        let container = validated_container(format)?;
        job.advance(JobState::Validated);

        job.advance(JobState::Probing);
        let source = MediaSource::Path(input);
        let metadata = probe::probe(self.invoker(), &source, job.id()).await?;

        job.advance(JobState::Detecting);
        let detection = self
            .detector
            .detect(self.invoker(), source.clone(), &metadata, job.id())
            .await?;
        let region = match detection {
            CropDetection::Detected(region) => region,
            CropDetection::NoneDetected { .. } => return Err(PipelineError::NoCropDetected),
        };

        job.advance(JobState::Processing);
        let request = TranscodeRequest::Crop { region, container };
        let output = self
            .transcode(job, &request, source, Some(metadata.duration_secs))
            .await?;

        job.advance(JobState::Delivering);
        deliver(job, &request, &output)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn image_format(&self, format: Option<&str>) -> Result<ImageFormat, PipelineError> {
        match format.map(str::trim).filter(|f| !f.is_empty()) {
            None => Ok(self.default_thumbnail),
            Some(f) => ImageFormat::parse(f).ok_or_else(|| PipelineError::UnsupportedImageFormat {
                format: f.to_string(),
            }),
        }
    }

    /// Allocates (and tracks) the output, then runs the stage.
    async fn transcode(
        &self,
        job: &mut Job,
        request: &TranscodeRequest,
        input: MediaSource,
        duration_secs: Option<f64>,
    ) -> Result<PathBuf, PipelineError> {
        let output = job.allocate_output(request.extension());
        let produced = TranscodeStage::new(self.invoker())
            .run(request, input, &output, duration_secs, job.id())
            .await?;
        Ok(produced)
    }

    /// Moves the job to its terminal state, closes it and records the outcome.
    async fn complete<T>(
        &self,
        mut job: Job,
        result: Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        match &result {
            Ok(_) => job.advance(JobState::Done),
            Err(e) => job.advance(JobState::Failed(e.kind())),
        };

        let job_id = job.id().to_string();
        let operation = job.operation();
        let elapsed_ms = job.elapsed().as_millis() as u64;
        let report = job.close().await;
        if !report.is_clean() {
            warn!(job_id = %job_id, failures = report.failures, "Job cleanup incomplete");
        }

        match &result {
            Ok(_) => info!(
                job_id = %job_id,
                operation = operation.as_str(),
                elapsed_ms,
                removed = report.removed,
                "Job done"
            ),
            Err(e) if e.is_client_error() => info!(
                job_id = %job_id,
                operation = operation.as_str(),
                kind = e.kind(),
                "Job rejected: {}",
                e
            ),
            Err(e) => error!(
                job_id = %job_id,
                operation = operation.as_str(),
                kind = e.kind(),
                "Job failed: {}",
                e
            ),
        }

        result
    }
}

/// The staged upload, which must exist and be non-empty.
async fn validated_input(job: &Job) -> Result<PathBuf, PipelineError> {
    let path = job
        .input_path()
        .map(Path::to_path_buf)
        .ok_or_else(|| PipelineError::validation("No input file provided"))?;
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.len() > 0 => Ok(path),
        Ok(_) => Err(PipelineError::validation("Uploaded file is empty")),
        Err(_) => Err(PipelineError::validation("No input file provided")),
    }
}

fn validated_url(url: &str) -> Result<MediaSource, PipelineError> {
    let source = MediaSource::url(url);
    if source.is_empty() {
        return Err(PipelineError::validation("A url is required"));
    }
    Ok(source)
}

fn validated_container(format: Option<&str>) -> Result<String, PipelineError> {
    normalize_container(format).ok_or_else(|| {
        PipelineError::validation(format!(
            "Invalid output format '{}'",
            format.unwrap_or_default()
        ))
    })
}

fn capture_time(metadata: &MediaMetadata, requested: Option<f64>) -> Result<f64, PipelineError> {
    if !metadata.has_usable_duration() {
        return Err(PipelineError::InvalidDuration {
            duration: metadata.duration_secs,
        });
    }
    Ok(resolve_capture_time(requested, metadata.duration_secs))
}

fn release(job: &mut Job, output: &Path) -> Result<crate::job::DeliveredArtifact, PipelineError> {
    job.release_output(output).ok_or_else(|| {
        PipelineError::resource(format!("Output {} is not tracked", output.display()))
    })
}

fn deliver(
    job: &mut Job,
    request: &TranscodeRequest,
    output: &Path,
) -> Result<Delivery, PipelineError> {
    let artifact = release(job, output)?;
    Ok(Delivery {
        artifact,
        file_name: job.delivery_name(request.extension()),
        content_type: request.content_type(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{FormatDescriptor, StreamDescriptor, StreamKind};

    fn metadata(duration_secs: f64) -> MediaMetadata {
        MediaMetadata {
            format: FormatDescriptor::default(),
            duration_secs,
            streams: vec![StreamDescriptor {
                index: 0,
                kind: StreamKind::Video,
                codec: Some("h264".to_string()),
                codec_long_name: None,
                width: Some(640),
                height: Some(360),
                rotation: None,
                bit_rate: None,
                frame_rate: None,
                duration_secs: None,
                sample_rate: None,
                channels: None,
            }],
        }
    }

    #[test]
    fn test_capture_time_requires_duration() {
        assert_eq!(
            capture_time(&metadata(0.0), None),
            Err(PipelineError::InvalidDuration { duration: 0.0 })
        );
        let clamped = capture_time(&metadata(10.0), Some(15.0)).unwrap();
        assert!((clamped - 9.9).abs() < 1e-9);
    }

    #[test]
    fn test_validated_url() {
        assert!(validated_url("  ").is_err());
        assert_eq!(
            validated_url("https://cdn.example.com/a.mp4").unwrap(),
            MediaSource::url("https://cdn.example.com/a.mp4")
        );
    }

    #[test]
    fn test_validated_container() {
        assert_eq!(validated_container(None).unwrap(), "mp4");
        assert!(matches!(
            validated_container(Some("mp4/../../x")),
            Err(PipelineError::Validation { .. })
        ));
    }
}
