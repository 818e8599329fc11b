use std::time::Instant;
use tracing::{debug, info};

use super::{resolve, CropDetection, CropScanner};
use crate::config::CropConfig;
use crate::engine::{
    EngineCommand, MediaSource, ProcessInvoker, StageError, StageObserver, StageOutcome,
};
use crate::metrics::STAGE_DURATION;
use crate::probe::MediaMetadata;

/// Forwards lines to the scanner and logs progress for the job.
struct DetectObserver<'a> {
    scanner: CropScanner,
    job_id: &'a str,
}

impl StageObserver for DetectObserver<'_> {
    fn on_start(&mut self, command_line: &str) {
        debug!(job_id = self.job_id, stage = "crop_detect", "Running: {}", command_line);
    }

    fn on_line(&mut self, line: &str) {
        self.scanner.scan(line);
    }

    fn on_progress(&mut self, percent: f32) {
        debug!(job_id = self.job_id, stage = "crop_detect", "Progress: {:.1}%", percent);
    }
}

/// Runs one full `cropdetect` pass over an input.
#[derive(Debug, Clone)]
pub struct CropDetector {
    config: CropConfig,
}

impl CropDetector {
    pub fn new(config: CropConfig) -> Self {
        Self { config }
    }

    /// Builds the analysis command: video only, output discarded.
    pub fn command(&self, input: MediaSource, duration_secs: f64) -> EngineCommand {
        let filter = format!(
            "cropdetect=limit={}:round={}:reset=0",
            self.config.limit, self.config.round
        );
        EngineCommand::analyze(
            input,
            vec![
                "-vf".to_string(),
                filter,
                "-an".to_string(),
                "-sn".to_string(),
            ],
        )
        .with_expected_duration(Some(duration_secs))
    }

    /// Analyses `input` and resolves the detected region.
    ///
    /// Candidates are kept in memory only. An empty or rejected candidate
    /// sequence is a successful pass returning [`CropDetection::NoneDetected`].
    pub async fn detect<I: ProcessInvoker + ?Sized>(
        &self,
        invoker: &I,
        input: MediaSource,
        metadata: &MediaMetadata,
        job_id: &str,
    ) -> StageOutcome<CropDetection> {
        let start = Instant::now();
        let command = self.command(input, metadata.duration_secs);
        let mut observer = DetectObserver {
            scanner: CropScanner::new(),
            job_id,
        };

        let result = invoker
            .invoke(&command, &mut observer)
            .await
            .map_err(StageError::from);
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome_label(),
        };
        STAGE_DURATION
            .with_label_values(&["crop_detect", outcome])
            .observe(start.elapsed().as_secs_f64());
        result?;

        let candidates = observer.scanner.into_candidates();
        let detection = resolve(&candidates, metadata.frame_dimensions());
        match &detection {
            CropDetection::Detected(region) => info!(
                job_id,
                candidates = candidates.len(),
                "Detected crop region {}",
                region
            ),
            CropDetection::NoneDetected { candidates, reason } => info!(
                job_id,
                candidates,
                reason = reason.as_str(),
                "No crop region detected"
            ),
        }
        Ok(detection)
    }
}
