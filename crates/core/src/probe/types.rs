//! Types for the probe module.

use serde::{Deserialize, Serialize};

/// Kind of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

impl StreamKind {
    /// Maps ffprobe's `codec_type`.
    pub fn from_codec_type(codec_type: &str) -> Self {
        match codec_type {
            "video" => Self::Video,
            "audio" => Self::Audio,
            "subtitle" => Self::Subtitle,
            _ => Self::Other,
        }
    }
}

/// Container-level description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Short container name (first entry of ffprobe's `format_name`).
    pub name: String,
    /// Human-readable container name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,
    /// File size in bytes, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Overall bit rate in bits per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,
}

impl Default for FormatDescriptor {
    fn default() -> Self {
        Self {
            name: "unknown".to_string(),
            long_name: None,
            size_bytes: None,
            bit_rate: None,
        }
    }
}

/// One elementary stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub index: u32,
    pub kind: StreamKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec_long_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Clockwise display rotation in degrees (0, 90, 180 or 270).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<u16>,
    /// Bits per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,
    /// Frames per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
}

/// Parsed result of a probe. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub format: FormatDescriptor,
    /// Total duration in seconds; 0 means "no usable duration".
    pub duration_secs: f64,
    /// Streams in container order.
    pub streams: Vec<StreamDescriptor>,
}

impl MediaMetadata {
    /// Whether the duration can drive timestamp selection.
    pub fn has_usable_duration(&self) -> bool {
        self.duration_secs.is_finite() && self.duration_secs > 0.0
    }

    /// First video stream, if any.
    pub fn primary_video(&self) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.kind == StreamKind::Video)
    }

    /// Displayed width and height of the first video stream, when both
    /// are known.
    ///
    /// The engine autorotates before filtering, so a stream rotated by a
    /// quarter turn reports its coded dimensions swapped.
    pub fn frame_dimensions(&self) -> Option<(u32, u32)> {
        let video = self.primary_video()?;
        let (width, height) = (video.width?, video.height?);
        match video.rotation {
            Some(90 | 270) => Some((height, width)),
            _ => Some((width, height)),
        }
    }
}
