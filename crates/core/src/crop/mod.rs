//! Crop detection for letterbox removal.
//!
//! The engine's `cropdetect` filter prints a `crop=w:h:x:y` suggestion for
//! every analysed frame. [`CropScanner`] collects those in arrival order and
//! [`resolve`] reduces them to a single region: the last one wins, after a
//! bounds check against the probed frame.

mod detector;
mod region;

pub use detector::CropDetector;
pub use region::{parse_candidate, CropCandidate, CropRegion};

use tracing::trace;

use crate::engine::StageObserver;

/// Why no usable region came out of a detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoCropReason {
    /// The diagnostic stream held no crop suggestion at all.
    NoCandidates,
    /// Width or height is zero or negative, or an offset is negative.
    Degenerate,
    /// The region reaches outside the source frame.
    ExceedsFrame,
    /// The region is the whole frame, so there are no bars to remove.
    FullFrame,
}

impl NoCropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCandidates => "no_candidates",
            Self::Degenerate => "degenerate",
            Self::ExceedsFrame => "exceeds_frame",
            Self::FullFrame => "full_frame",
        }
    }
}

/// Terminal result of a detection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CropDetection {
    Detected(CropRegion),
    NoneDetected {
        candidates: usize,
        reason: NoCropReason,
    },
}

impl CropDetection {
    pub fn region(&self) -> Option<&CropRegion> {
        match self {
            Self::Detected(region) => Some(region),
            Self::NoneDetected { .. } => None,
        }
    }
}

/// Observer that accumulates crop candidates from the diagnostic stream.
#[derive(Debug, Default)]
pub struct CropScanner {
    candidates: Vec<CropCandidate>,
}

impl CropScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans one diagnostic line.
    pub fn scan(&mut self, line: &str) {
        if let Some(candidate) = parse_candidate(line) {
            trace!("Crop candidate: {}", candidate);
            self.candidates.push(candidate);
        }
    }

    pub fn candidates(&self) -> &[CropCandidate] {
        &self.candidates
    }

    pub fn into_candidates(self) -> Vec<CropCandidate> {
        self.candidates
    }
}

impl StageObserver for CropScanner {
    fn on_line(&mut self, line: &str) {
        self.scan(line);
    }
}

/// Reduces a candidate sequence to a region.
///
/// Only the last candidate is considered. `frame` is the source's
/// (width, height) when known; without it only degenerate regions are
/// rejected.
pub fn resolve(candidates: &[CropCandidate], frame: Option<(u32, u32)>) -> CropDetection {
    let none = |reason| CropDetection::NoneDetected {
        candidates: candidates.len(),
        reason,
    };

    let Some(last) = candidates.last() else {
        return none(NoCropReason::NoCandidates);
    };

    let Some(region) = last.to_region() else {
        return none(NoCropReason::Degenerate);
    };

    if let Some((frame_width, frame_height)) = frame {
        let right = u64::from(region.x) + u64::from(region.width);
        let bottom = u64::from(region.y) + u64::from(region.height);
        if right > u64::from(frame_width) || bottom > u64::from(frame_height) {
            return none(NoCropReason::ExceedsFrame);
        }
        if region.width == frame_width && region.height == frame_height {
            return none(NoCropReason::FullFrame);
        }
    }

    CropDetection::Detected(region)
}
