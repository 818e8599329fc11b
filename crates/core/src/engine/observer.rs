//! Stage observers: start, per-line and progress notifications.
//!
//! Invokers call `on_start` once before any output is read, then `on_line`
//! for every diagnostic line in arrival order, interleaved with
//! `on_progress` whenever a percentage can be derived. The terminal outcome
//! is the invoker's return value, so it always comes last.

use regex_lite::Regex;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Receives notifications while an engine stage runs.
pub trait StageObserver: Send {
    /// Fired once with the resolved command line, before the stream is read.
    fn on_start(&mut self, _command_line: &str) {}

    /// Fired for each diagnostic line.
    fn on_line(&mut self, _line: &str) {}

    /// Fired with an advisory completion percentage (0.0 - 100.0).
    fn on_progress(&mut self, _percent: f32) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

/// Observer that logs progress for a job.
#[derive(Debug, Clone)]
pub struct ProgressLogger {
    job_id: String,
    stage: &'static str,
}

impl ProgressLogger {
    pub fn new(job_id: impl Into<String>, stage: &'static str) -> Self {
        Self {
            job_id: job_id.into(),
            stage,
        }
    }
}

impl StageObserver for ProgressLogger {
    fn on_start(&mut self, command_line: &str) {
        debug!(job_id = %self.job_id, stage = self.stage, "Running: {}", command_line);
    }

    fn on_progress(&mut self, percent: f32) {
        debug!(job_id = %self.job_id, stage = self.stage, "Progress: {:.1}%", percent);
    }
}

/// Derives completion percentages from the engine's diagnostic stream.
///
/// Understands the `-progress` key/value lines (`out_time_ms=`,
/// `progress=end`) and, when no duration was supplied up front, the
/// `Duration: HH:MM:SS.ss` line ffmpeg prints for its input.
pub struct ProgressParser {
    duration_secs: Option<f64>,
    interval: Duration,
    last_emit: Option<Instant>,
    finished: bool,
    duration_regex: Option<Regex>,
    time_regex: Option<Regex>,
}

impl ProgressParser {
    pub fn new(duration_secs: Option<f64>) -> Self {
        Self {
            duration_secs,
            interval: Duration::from_millis(500),
            last_emit: None,
            finished: false,
            duration_regex: Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").ok(),
            time_regex: Regex::new(r"^out_time_(?:ms|us)=(\d+)").ok(),
        }
    }

    /// Minimum spacing between two reported percentages.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Feeds one line; returns a percentage when one is due.
    pub fn feed(&mut self, line: &str) -> Option<f32> {
        let line = line.trim();

        if self.duration_secs.is_none() {
            if let Some(duration) = self.parse_duration(line) {
                trace!("Input duration from diagnostics: {:.3}s", duration);
                self.duration_secs = Some(duration);
                return None;
            }
        }

        if line == "progress=end" {
            if self.finished {
                return None;
            }
            self.finished = true;
            return Some(100.0);
        }

        let duration = self.duration_secs.filter(|d| *d > 0.0)?;
        let caps = self.time_regex.as_ref()?.captures(line)?;
        // Both keys carry microseconds despite the name
        let micros = caps.get(1)?.as_str().parse::<f64>().ok()?;

        if let Some(last) = self.last_emit {
            if last.elapsed() < self.interval {
                return None;
            }
        }
        self.last_emit = Some(Instant::now());

        let percent = (micros / 1_000_000.0 / duration * 100.0).clamp(0.0, 100.0);
        Some(percent as f32)
    }

    fn parse_duration(&self, line: &str) -> Option<f64> {
        let caps = self.duration_regex.as_ref()?.captures(line)?;
        let hours = caps.get(1)?.as_str().parse::<f64>().ok()?;
        let minutes = caps.get(2)?.as_str().parse::<f64>().ok()?;
        let seconds = caps.get(3)?.as_str().parse::<f64>().ok()?;
        let total = hours * 3600.0 + minutes * 60.0 + seconds;
        (total > 0.0).then_some(total)
    }
}

/// Whether a line is one of the `-progress` key/value records.
pub(crate) fn is_progress_record(line: &str) -> bool {
    let line = line.trim();
    match line.split_once('=') {
        Some((key, value)) => {
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
                && !value.contains(' ')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_from_known_duration() {
        let mut parser = ProgressParser::new(Some(10.0)).with_interval(Duration::ZERO);
        assert_eq!(parser.feed("frame=12"), None);
        let percent = parser.feed("out_time_ms=2500000").unwrap();
        assert!((percent - 25.0).abs() < 0.01);
        let percent = parser.feed("out_time_us=5000000").unwrap();
        assert!((percent - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_progress_duration_from_stream() {
        let mut parser = ProgressParser::new(None).with_interval(Duration::ZERO);
        assert_eq!(parser.feed("out_time_ms=1000000"), None);
        assert_eq!(
            parser.feed("  Duration: 00:00:08.00, start: 0.000000, bitrate: 1205 kb/s"),
            None
        );
        let percent = parser.feed("out_time_ms=2000000").unwrap();
        assert!((percent - 25.0).abs() < 0.01);
    }

    #[test]
    fn test_progress_end_reported_once() {
        let mut parser = ProgressParser::new(None);
        assert_eq!(parser.feed("progress=end"), Some(100.0));
        assert_eq!(parser.feed("progress=end"), None);
    }

    #[test]
    fn test_progress_rate_limited() {
        let mut parser = ProgressParser::new(Some(10.0)).with_interval(Duration::from_secs(3600));
        assert!(parser.feed("out_time_ms=1000000").is_some());
        assert!(parser.feed("out_time_ms=2000000").is_none());
    }

    #[test]
    fn test_progress_clamped() {
        let mut parser = ProgressParser::new(Some(1.0)).with_interval(Duration::ZERO);
        assert_eq!(parser.feed("out_time_ms=9000000"), Some(100.0));
    }

    #[test]
    fn test_is_progress_record() {
        assert!(is_progress_record("out_time_ms=1000"));
        assert!(is_progress_record("bitrate=N/A"));
        assert!(is_progress_record("progress=continue"));
        assert!(!is_progress_record(
            "[Parsed_cropdetect_0 @ 0x55] x1:0 x2:1919 crop=1920:800:0:140"
        ));
        assert!(!is_progress_record("Error opening output file out.xyz."));
    }
}
