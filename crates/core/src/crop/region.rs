use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;
use std::fmt;

// cropdetect can print negative sizes before it has seen a non-black pixel
static CROP_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"crop=(-?\d+):(-?\d+):(-?\d+):(-?\d+)").ok());

/// One raw `crop=w:h:x:y` suggestion, as printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropCandidate {
    pub width: i64,
    pub height: i64,
    pub x: i64,
    pub y: i64,
}

impl CropCandidate {
    /// Converts to a region if every component is usable.
    pub fn to_region(&self) -> Option<CropRegion> {
        if self.width <= 0 || self.height <= 0 || self.x < 0 || self.y < 0 {
            return None;
        }
        Some(CropRegion {
            width: u32::try_from(self.width).ok()?,
            height: u32::try_from(self.height).ok()?,
            x: u32::try_from(self.x).ok()?,
            y: u32::try_from(self.y).ok()?,
        })
    }
}

impl fmt::Display for CropCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

/// A validated sub-rectangle of the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRegion {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl CropRegion {
    /// The `-vf` expression applying this crop.
    pub fn filter_expr(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }
}

impl fmt::Display for CropRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Extracts the crop suggestion from a diagnostic line, if it has one.
///
/// When a line carries several, the last is taken.
pub fn parse_candidate(line: &str) -> Option<CropCandidate> {
    let regex = CROP_PATTERN.as_ref()?;
    let caps = regex.captures_iter(line).last()?;
    Some(CropCandidate {
        width: caps.get(1)?.as_str().parse().ok()?,
        height: caps.get(2)?.as_str().parse().ok()?,
        x: caps.get(3)?.as_str().parse().ok()?,
        y: caps.get(4)?.as_str().parse().ok()?,
    })
}
