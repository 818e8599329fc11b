//! Capture time selection for frame extraction.

/// Distance kept from either end of the media.
pub const EDGE_MARGIN_SECS: f64 = 0.1;

/// Capture time used when the caller gives none.
pub fn default_capture_time(duration_secs: f64) -> f64 {
    if duration_secs > 2.0 {
        1.0
    } else {
        duration_secs / 2.0
    }
}

/// Resolves the capture time for a clip of `duration_secs`.
///
/// A requested time is clamped into `[0.1, duration - 0.1]`; a clip too
/// short for that window is captured at its midpoint. Non-finite requests
/// count as absent.
pub fn resolve_capture_time(requested: Option<f64>, duration_secs: f64) -> f64 {
    let Some(requested) = requested.filter(|t| t.is_finite()) else {
        return default_capture_time(duration_secs);
    };

    let low = EDGE_MARGIN_SECS;
    let high = duration_secs - EDGE_MARGIN_SECS;
    if high < low {
        return duration_secs / 2.0;
    }
    requested.clamp(low, high)
}

/// Renders seconds for `-ss`.
pub fn format_seek(secs: f64) -> String {
    format!("{:.3}", secs.max(0.0))
}
