//! Output formats and content types.

use serde::Serialize;
use std::fmt;

/// Container used by `convert` when none is requested.
pub const DEFAULT_CONTAINER: &str = "mp4";

/// Image formats a single frame can be extracted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpg,
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 5] = [
        ImageFormat::Jpg,
        ImageFormat::Jpeg,
        ImageFormat::Png,
        ImageFormat::Webp,
        ImageFormat::Avif,
    ];

    /// Case-insensitive lookup; `None` for anything outside the allow-list.
    pub fn parse(format: &str) -> Option<Self> {
        let format = format.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.extension().eq_ignore_ascii_case(format))
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpg | Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
        }
    }

    /// Encoder selection and quality settings; empty means the container default.
    pub fn encoder_args(&self) -> &'static [&'static str] {
        match self {
            Self::Avif => &[
                "-c:v",
                "libaom-av1",
                "-still-picture",
                "1",
                "-crf",
                "32",
                "-b:v",
                "0",
                "-pix_fmt",
                "yuv420p",
            ],
            Self::Webp => &["-c:v", "libwebp", "-quality", "80"],
            Self::Jpg | Self::Jpeg | Self::Png => &[],
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Normalizes a requested container string.
///
/// The value is not checked against any list of containers; the engine
/// decides whether it can write it. It only has to be usable as a file
/// extension, so anything but ASCII letters and digits is refused.
pub fn normalize_container(format: Option<&str>) -> Option<String> {
    let format = format.map(str::trim).filter(|f| !f.is_empty());
    match format {
        None => Some(DEFAULT_CONTAINER.to_string()),
        Some(f) if f.len() <= 16 && f.chars().all(|c| c.is_ascii_alphanumeric()) => {
            Some(f.to_ascii_lowercase())
        }
        Some(_) => None,
    }
}

/// Content type for an output extension.
pub fn content_type_for(extension: &str) -> &'static str {
    if let Some(image) = ImageFormat::parse(extension) {
        return image.content_type();
    }
    match extension.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "ts" => "video/mp2t",
        "gif" => "image/gif",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" | "aac" => "audio/mp4",
        "opus" => "audio/opus",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list() {
        assert_eq!(ImageFormat::parse("avif"), Some(ImageFormat::Avif));
        assert_eq!(ImageFormat::parse("PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::parse(" jpeg "), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::parse("bmp"), None);
        assert_eq!(ImageFormat::parse("gif"), None);
        assert_eq!(ImageFormat::parse(""), None);
    }

    #[test]
    fn test_encoder_args() {
        assert!(ImageFormat::Avif.encoder_args().contains(&"libaom-av1"));
        assert!(ImageFormat::Webp.encoder_args().contains(&"libwebp"));
        assert!(ImageFormat::Png.encoder_args().is_empty());
        assert!(ImageFormat::Jpg.encoder_args().is_empty());
    }

    #[test]
    fn test_normalize_container() {
        assert_eq!(normalize_container(None), Some("mp4".to_string()));
        assert_eq!(normalize_container(Some("  ")), Some("mp4".to_string()));
        assert_eq!(normalize_container(Some("WebM")), Some("webm".to_string()));
        // Unknown but well-formed values are left for the engine to judge
        assert_eq!(normalize_container(Some("xyz")), Some("xyz".to_string()));
        assert_eq!(normalize_container(Some("../etc")), None);
        assert_eq!(normalize_container(Some("mp4 -y")), None);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("webm"), "video/webm");
        assert_eq!(content_type_for("JPG"), "image/jpeg");
        assert_eq!(content_type_for("mp3"), "audio/mpeg");
        assert_eq!(content_type_for("xyz"), "application/octet-stream");
    }
}
