//! Command descriptors for engine invocations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::EngineConfig;

/// Where the engine reads its input from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MediaSource {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// A remote location the engine fetches itself (http, https, rtmp, ...).
    Url(String),
}

impl MediaSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// Whether the source names nothing at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Path(path) => path.as_os_str().is_empty(),
            Self::Url(url) => url.trim().is_empty(),
        }
    }

    /// The string handed to the engine after `-i`.
    pub fn as_arg(&self) -> String {
        match self {
            Self::Path(path) => path.to_string_lossy().to_string(),
            Self::Url(url) => url.trim().to_string(),
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Which facet of the engine a command uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineMode {
    /// ffprobe: structured metadata on stdout.
    Inspect,
    /// ffmpeg with a discarded output: only the diagnostic stream matters.
    Analyze,
    /// ffmpeg producing an output artifact.
    Transform,
}

impl EngineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inspect => "inspect",
            Self::Analyze => "analyze",
            Self::Transform => "transform",
        }
    }
}

/// Where the engine writes its primary output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write to a file path (overwritten if present).
    File(PathBuf),
    /// Decode everything, keep nothing (`-f null -`).
    Discard,
    /// Capture standard output.
    Stdout,
}

/// A fully described engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineCommand {
    pub mode: EngineMode,
    pub input: MediaSource,
    /// Options placed before `-i` (seeking, input format hints).
    pub input_options: Vec<String>,
    /// Options placed after the input (filters, codecs, frame limits).
    pub options: Vec<String>,
    pub output: OutputTarget,
    /// Known media duration, used to turn progress timestamps into percentages.
    pub expected_duration_secs: Option<f64>,
}

impl EngineCommand {
    /// Metadata inspection of a path or URL.
    pub fn inspect(input: MediaSource) -> Self {
        Self {
            mode: EngineMode::Inspect,
            input,
            input_options: Vec::new(),
            options: Vec::new(),
            output: OutputTarget::Stdout,
            expected_duration_secs: None,
        }
    }

    /// Full decode with the output discarded; used for filter analysis.
    pub fn analyze(input: MediaSource, options: Vec<String>) -> Self {
        Self {
            mode: EngineMode::Analyze,
            input,
            input_options: Vec::new(),
            options,
            output: OutputTarget::Discard,
            expected_duration_secs: None,
        }
    }

    /// Transcode into `output`.
    pub fn transform(input: MediaSource, output: impl Into<PathBuf>) -> Self {
        Self {
            mode: EngineMode::Transform,
            input,
            input_options: Vec::new(),
            options: Vec::new(),
            output: OutputTarget::File(output.into()),
            expected_duration_secs: None,
        }
    }

    pub fn with_input_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_options.extend(options.into_iter().map(Into::into));
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.extend(options.into_iter().map(Into::into));
        self
    }

    pub fn with_expected_duration(mut self, duration_secs: Option<f64>) -> Self {
        self.expected_duration_secs = duration_secs.filter(|d| d.is_finite() && *d > 0.0);
        self
    }

    /// The output file, if this command produces one.
    pub fn output_path(&self) -> Option<&Path> {
        match &self.output {
            OutputTarget::File(path) => Some(path),
            _ => None,
        }
    }

    /// The binary this command runs.
    pub fn program<'a>(&self, config: &'a EngineConfig) -> &'a Path {
        match self.mode {
            EngineMode::Inspect => &config.ffprobe_path,
            EngineMode::Analyze | EngineMode::Transform => &config.ffmpeg_path,
        }
    }

    /// Builds the argument list. `extra_args` are inserted just before a file output.
    pub fn to_args(&self, extra_args: &[String]) -> Vec<String> {
        let input = self.input.as_arg();

        if self.mode == EngineMode::Inspect {
            let mut args: Vec<String> = [
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect();
            args.extend(self.input_options.iter().cloned());
            args.push(input);
            return args;
        }

        let mut args = vec!["-hide_banner".to_string(), "-nostdin".to_string()];
        if self.mode == EngineMode::Transform {
            args.push("-y".to_string());
        }
        args.extend(self.input_options.iter().cloned());
        args.extend(["-i".to_string(), input]);
        args.extend(self.options.iter().cloned());

        match &self.output {
            OutputTarget::File(path) => {
                // Machine-readable progress on the diagnostic stream
                args.extend(["-progress".to_string(), "pipe:2".to_string()]);
                args.extend(extra_args.iter().cloned());
                args.push(path.to_string_lossy().to_string());
            }
            OutputTarget::Discard => {
                args.extend(["-f".to_string(), "null".to_string(), "-".to_string()]);
            }
            OutputTarget::Stdout => {
                args.push("pipe:1".to_string());
            }
        }

        args
    }

    /// Shell-like rendering of the resolved command line, for logs.
    pub fn command_line(&self, config: &EngineConfig) -> String {
        let mut parts = vec![quote(&self.program(config).to_string_lossy())];
        parts.extend(self.to_args(&config.extra_ffmpeg_args).iter().map(|a| quote(a)));
        parts.join(" ")
    }
}

fn quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,+@%".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
