use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::metrics::{ARTIFACTS_CLEANED, CLEANUP_FAILURES};

/// What a tracked file is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactRole {
    Input,
    DiagnosticLog,
    Output,
}

impl ArtifactRole {
    /// Suffix appended to the job id when naming the file.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::DiagnosticLog => "diagnostics",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A filesystem path owned by one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub role: ArtifactRole,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, role: ArtifactRole) -> Self {
        Self {
            path: path.into(),
            role,
        }
    }

    /// `{dir}/{job_id}-{role}.{extension}`
    pub fn named(dir: &Path, job_id: &str, role: ArtifactRole, extension: &str) -> Self {
        Self::new(
            dir.join(format!("{}-{}.{}", job_id, role.suffix(), extension)),
            role,
        )
    }
}

/// Result of removing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    Removed,
    AlreadyAbsent,
    Failed,
}

/// Removes `path`, treating "not found" as success. Failures are logged.
pub(crate) fn remove_file_logged(path: &Path, job_id: &str) -> Removal {
    match std::fs::remove_file(path) {
        Ok(()) => {
            ARTIFACTS_CLEANED.inc();
            debug!(job_id, "Removed {}", path.display());
            Removal::Removed
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Removal::AlreadyAbsent,
        Err(e) => {
            CLEANUP_FAILURES.inc();
            warn!(job_id, "Failed to remove {}: {}", path.display(), e);
            Removal::Failed
        }
    }
}

/// Async variant of [`remove_file_logged`].
pub(crate) async fn remove_file_logged_async(path: &Path, job_id: &str) -> Removal {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            ARTIFACTS_CLEANED.inc();
            debug!(job_id, "Removed {}", path.display());
            Removal::Removed
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Removal::AlreadyAbsent,
        Err(e) => {
            CLEANUP_FAILURES.inc();
            warn!(job_id, "Failed to remove {}: {}", path.display(), e);
            Removal::Failed
        }
    }
}

/// An output whose ownership left the job for delivery.
///
/// The file is removed when this value is dropped, whether the transfer
/// finished or was abandoned.
#[derive(Debug)]
pub struct DeliveredArtifact {
    path: PathBuf,
    job_id: String,
}

impl DeliveredArtifact {
    pub(crate) fn new(path: PathBuf, job_id: impl Into<String>) -> Self {
        Self {
            path,
            job_id: job_id.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Size on disk.
    pub async fn size(&self) -> std::io::Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    /// Reads the whole file; the artifact is still removed on drop.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

impl Drop for DeliveredArtifact {
    // Runs on the runtime thread that polled the response body. A single
    // unlink of a local file is accepted as a short blocking call here so the
    // file is gone before the response future completes.
    fn drop(&mut self) {
        remove_file_logged(&self.path, &self.job_id);
    }
}
