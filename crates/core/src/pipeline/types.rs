use serde::Serialize;

use crate::job::DeliveredArtifact;
use crate::probe::MediaMetadata;
use crate::transcode::ImageFormat;

/// A produced file on its way to the caller.
///
/// Dropping it (or its [`DeliveredArtifact`]) deletes the file.
#[derive(Debug)]
pub struct Delivery {
    pub artifact: DeliveredArtifact,
    /// Suggested download name, `<upload stem>.<extension>`.
    pub file_name: String,
    pub content_type: &'static str,
}

impl Delivery {
    pub fn job_id(&self) -> &str {
        self.artifact.job_id()
    }
}

/// An extracted frame held in memory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thumbnail {
    pub format: ImageFormat,
    pub content_type: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Result of `probe_with_thumbnail`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThumbnailProbe {
    pub metadata: MediaMetadata,
    pub thumbnail: Thumbnail,
}
