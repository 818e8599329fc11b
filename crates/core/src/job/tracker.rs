use std::path::{Path, PathBuf};
use tracing::warn;

use super::artifact::{remove_file_logged, remove_file_logged_async, Artifact, DeliveredArtifact, Removal};

/// Outcome of [`ResourceTracker::close_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub already_absent: usize,
    pub failures: usize,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }

    fn record(&mut self, removal: Removal) {
        match removal {
            Removal::Removed => self.removed += 1,
            Removal::AlreadyAbsent => self.already_absent += 1,
            Removal::Failed => self.failures += 1,
        }
    }
}

/// Per-job registry of files that must not outlive the job.
///
/// Anything still tracked when the tracker is dropped is removed
/// synchronously and reported, so even a panicking handler cannot leak.
#[derive(Debug)]
pub struct ResourceTracker {
    job_id: String,
    artifacts: Vec<Artifact>,
}

impl ResourceTracker {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            artifacts: Vec::new(),
        }
    }

    /// Starts tracking an artifact and returns its path.
    pub fn register(&mut self, artifact: Artifact) -> PathBuf {
        let path = artifact.path.clone();
        if !self.artifacts.iter().any(|a| a.path == path) {
            self.artifacts.push(artifact);
        }
        path
    }

    /// Stops tracking `path` and hands it over for delivery.
    ///
    /// Returns `None` when the path was never registered (or already released).
    pub fn release(&mut self, path: &Path) -> Option<DeliveredArtifact> {
        let index = self.artifacts.iter().position(|a| a.path == path)?;
        let artifact = self.artifacts.remove(index);
        Some(DeliveredArtifact::new(artifact.path, self.job_id.clone()))
    }

    pub fn tracked(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.artifacts.iter().any(|a| a.path == path)
    }

    /// Deletes every tracked artifact.
    ///
    /// Missing files are counted, not reported as errors. Failures are
    /// logged. The tracker is empty afterwards, so a second call is a no-op.
    pub async fn close_all(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for artifact in std::mem::take(&mut self.artifacts) {
            report.record(remove_file_logged_async(&artifact.path, &self.job_id).await);
        }
        report
    }
}

impl Drop for ResourceTracker {
    fn drop(&mut self) {
        if self.artifacts.is_empty() {
            return;
        }
        warn!(
            job_id = %self.job_id,
            count = self.artifacts.len(),
            "Tracker dropped with live artifacts, removing"
        );
        for artifact in self.artifacts.drain(..) {
            remove_file_logged(&artifact.path, &self.job_id);
        }
    }
}
