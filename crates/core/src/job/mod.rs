//! Jobs and the files they own.
//!
//! A [`Job`] is created per request and consumed by [`Job::close`]. Every
//! file it creates goes through its [`ResourceTracker`], which either
//! releases it for delivery or deletes it.

mod artifact;
mod id;
mod tracker;

pub use artifact::{Artifact, ArtifactRole, DeliveredArtifact};
pub use id::{IdGenerator, SequentialIdGenerator, TimestampIdGenerator};
pub use tracker::{CleanupReport, ResourceTracker};

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::StorageConfig;
use crate::metrics::{JOBS_IN_FLIGHT, JOBS_TOTAL};

/// Outcome label for a job that was dropped before reaching a terminal state.
pub const DROPPED_OUTCOME: &str = "dropped";

/// Public operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Info,
    Probe,
    ProbeWithThumbnail,
    Convert,
    Screenshot,
    RemoveLetterbox,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Probe => "probe",
            Self::ProbeWithThumbnail => "probe_with_thumbnail",
            Self::Convert => "convert",
            Self::Screenshot => "screenshot",
            Self::RemoveLetterbox => "remove_letterbox",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state. Only moves forward; `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Received,
    Validated,
    Probing,
    Detecting,
    Processing,
    Delivering,
    Done,
    /// Carries the error kind that ended the job.
    Failed(&'static str),
}

impl JobState {
    fn rank(&self) -> u8 {
        match self {
            Self::Received => 0,
            Self::Validated => 1,
            Self::Probing => 2,
            Self::Detecting => 3,
            Self::Processing => 4,
            Self::Delivering => 5,
            Self::Done | Self::Failed(_) => 6,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Whether `next` may follow `self`. Optional states may be skipped.
    pub fn can_advance_to(&self, next: JobState) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Metrics outcome of a terminal state: "done" or the failure kind.
    pub fn outcome(&self) -> Option<&'static str> {
        match self {
            Self::Done => Some("done"),
            Self::Failed(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Probing => "probing",
            Self::Detecting => "detecting",
            Self::Processing => "processing",
            Self::Delivering => "delivering",
            Self::Done => "done",
            Self::Failed(_) => "failed",
        }
    }
}

/// Keeps the parts of an uploaded name that are safe in a header and a path.
fn sanitize_stem(name: &str) -> Option<String> {
    let file_name = Path::new(name).file_name()?.to_string_lossy().into_owned();
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name,
    };
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

fn sanitize_extension(name: &str) -> Option<String> {
    let (_, ext) = Path::new(name).file_name()?.to_str()?.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 16 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

/// Holds a job's slot in the in-flight gauge and records its outcome.
///
/// Both happen on drop, so a job whose future is cancelled mid-pipeline
/// is still counted, under [`DROPPED_OUTCOME`].
#[derive(Debug)]
struct InFlight {
    operation: Operation,
    outcome: Option<&'static str>,
}

impl InFlight {
    fn enter(operation: Operation) -> Self {
        JOBS_IN_FLIGHT.inc();
        Self {
            operation,
            outcome: None,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        JOBS_IN_FLIGHT.dec();
        JOBS_TOTAL
            .with_label_values(&[
                self.operation.as_str(),
                self.outcome.unwrap_or(DROPPED_OUTCOME),
            ])
            .inc();
    }
}

/// One request's processing context.
#[derive(Debug)]
pub struct Job {
    id: String,
    operation: Operation,
    state: JobState,
    tracker: ResourceTracker,
    storage: StorageConfig,
    original_name: Option<String>,
    started: Instant,
    in_flight: InFlight,
}

impl Job {
    pub fn new(id: impl Into<String>, operation: Operation, storage: StorageConfig) -> Self {
        let id = id.into();
        Self {
            tracker: ResourceTracker::new(id.clone()),
            id,
            operation,
            state: JobState::Received,
            storage,
            original_name: None,
            started: Instant::now(),
            in_flight: InFlight::enter(operation),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn tracker(&self) -> &ResourceTracker {
        &self.tracker
    }

    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Moves to `next` if the transition is legal; returns whether it moved.
    pub fn advance(&mut self, next: JobState) -> bool {
        if !self.state.can_advance_to(next) {
            warn!(
                job_id = %self.id,
                from = self.state.as_str(),
                to = next.as_str(),
                "Ignoring illegal job state transition"
            );
            return false;
        }
        debug!(job_id = %self.id, "{} -> {}", self.state.as_str(), next.as_str());
        self.state = next;
        if let Some(outcome) = next.outcome() {
            self.in_flight.outcome = Some(outcome);
        }
        true
    }

    /// Registers the path an upload named `original_name` is written to.
    ///
    /// The returned path is tracked before anything is written, so a failed
    /// or interrupted upload is still cleaned up.
    pub fn stage_input(&mut self, original_name: &str) -> PathBuf {
        self.original_name = Some(original_name.to_string());
        let extension = sanitize_extension(original_name).unwrap_or_else(|| "bin".to_string());
        let artifact = Artifact::named(
            &self.storage.upload_dir,
            &self.id,
            ArtifactRole::Input,
            &extension,
        );
        self.tracker.register(artifact)
    }

    /// Registers the path the output with `extension` will be written to.
    pub fn allocate_output(&mut self, extension: &str) -> PathBuf {
        let artifact = Artifact::named(
            &self.storage.output_dir,
            &self.id,
            ArtifactRole::Output,
            extension,
        );
        self.tracker.register(artifact)
    }

    /// The current input artifact, if an upload was staged.
    pub fn input_path(&self) -> Option<&Path> {
        self.tracker
            .tracked()
            .iter()
            .find(|a| a.role == ArtifactRole::Input)
            .map(|a| a.path.as_path())
    }

    /// Hands the output at `path` over for delivery.
    pub fn release_output(&mut self, path: &Path) -> Option<DeliveredArtifact> {
        self.tracker.release(path)
    }

    /// Download name: the upload's stem (or the job id) plus `extension`.
    pub fn delivery_name(&self, extension: &str) -> String {
        let stem = self
            .original_name
            .as_deref()
            .and_then(sanitize_stem)
            .unwrap_or_else(|| self.id.clone());
        format!("{}.{}", stem, extension)
    }

    /// Ends the job: deletes whatever is still tracked. The outcome is
    /// recorded once the job is gone.
    pub async fn close(mut self) -> CleanupReport {
        self.tracker.close_all().await
    }
}
