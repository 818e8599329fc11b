//! FFmpeg/FFprobe-based invoker implementation.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, trace, warn};

use super::command::{EngineCommand, OutputTarget};
use super::error::EngineError;
use super::observer::{is_progress_record, ProgressParser, StageObserver};
use super::traits::{Invocation, ProcessInvoker};
use crate::config::EngineConfig;

/// Keeps the last `capacity` diagnostic lines.
struct DiagnosticTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl DiagnosticTail {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(256)),
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    fn into_vec(self) -> Vec<String> {
        self.lines.into()
    }
}

/// Invoker that runs the configured `ffmpeg` and `ffprobe` binaries.
pub struct FfmpegInvoker {
    config: EngineConfig,
}

impl FfmpegInvoker {
    /// Creates a new invoker with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Creates an invoker with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn spawn_error(program: &Path, err: std::io::Error) -> EngineError {
        let reason = if err.kind() == std::io::ErrorKind::NotFound {
            "binary not found".to_string()
        } else {
            err.to_string()
        };
        EngineError::spawn(program.display().to_string(), reason)
    }

    async fn check_binary(program: &Path) -> Result<(), EngineError> {
        let output = Command::new(program)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Self::spawn_error(program, e))?;

        if !output.status.success() {
            return Err(EngineError::Exited {
                program: program.display().to_string(),
                code: output.status.code(),
                diagnostics: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessInvoker for FfmpegInvoker {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn invoke(
        &self,
        command: &EngineCommand,
        observer: &mut dyn StageObserver,
    ) -> Result<Invocation, EngineError> {
        let start = Instant::now();
        let program = command.program(&self.config);
        let args = command.to_args(&self.config.extra_ffmpeg_args);

        let command_line = command.command_line(&self.config);
        debug!(mode = command.mode.as_str(), "Spawning engine: {}", command_line);
        observer.on_start(&command_line);

        let capture_stdout = command.output == OutputTarget::Stdout;
        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(if capture_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Self::spawn_error(program, e))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Io(std::io::Error::other("stderr was not captured")))?;

        // Drained concurrently so a full stdout pipe cannot stall the child
        let stdout_task = child.stdout.take().map(|mut stdout| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                stdout.read_to_end(&mut buf).await.map(|_| buf)
            })
        });

        let mut tail = DiagnosticTail::new(self.config.diagnostic_tail_lines);
        let mut progress = ProgressParser::new(command.expected_duration_secs);

        let run = async {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                if reader.read_until(b'\n', &mut buf).await? == 0 {
                    break;
                }
                let chunk = String::from_utf8_lossy(&buf);
                // Stats lines are separated by carriage returns
                for line in chunk.split(['\r', '\n']).filter(|l| !l.is_empty()) {
                    trace!("engine: {}", line);
                    observer.on_line(line);
                    if let Some(percent) = progress.feed(line) {
                        observer.on_progress(percent);
                    }
                    if !is_progress_record(line) {
                        tail.push(line);
                    }
                }
            }
            child.wait().await
        };

        let status = match self.config.stage_timeout_secs {
            Some(timeout_secs) => match timeout(Duration::from_secs(timeout_secs), run).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(
                        "Engine exceeded {}s, killing: {}",
                        timeout_secs, command_line
                    );
                    let _ = child.kill().await;
                    return Err(EngineError::Timeout { timeout_secs });
                }
            },
            None => run.await?,
        };

        let stdout = match stdout_task {
            Some(task) => task
                .await
                .map_err(|e| EngineError::Io(std::io::Error::other(e)))??,
            None => Vec::new(),
        };

        let diagnostics = tail.into_vec();
        if !status.success() {
            return Err(EngineError::Exited {
                program: program.display().to_string(),
                code: status.code(),
                diagnostics: diagnostics.join("\n"),
            });
        }

        Ok(Invocation {
            stdout,
            diagnostics,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn validate(&self) -> Result<(), EngineError> {
        Self::check_binary(&self.config.ffmpeg_path).await?;
        Self::check_binary(&self.config.ffprobe_path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MediaSource, NoopObserver};
    use std::path::PathBuf;

    #[test]
    fn test_diagnostic_tail_keeps_last_lines() {
        let mut tail = DiagnosticTail::new(2);
        tail.push("one");
        tail.push("");
        tail.push("two");
        tail.push("three");
        assert_eq!(tail.into_vec(), vec!["two", "three"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let invoker = FfmpegInvoker::new(EngineConfig::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
        ));
        let command = EngineCommand::inspect(MediaSource::path("/tmp/none.mp4"));
        let err = invoker
            .invoke(&command, &mut NoopObserver)
            .await
            .unwrap_err();
        match err {
            EngineError::Spawn { program, reason } => {
                assert_eq!(program, "/nonexistent/ffprobe");
                assert_eq!(reason, "binary not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validate_missing_binary() {
        let invoker = FfmpegInvoker::new(EngineConfig::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
        ));
        assert!(matches!(
            invoker.validate().await,
            Err(EngineError::Spawn { .. })
        ));
    }

    /// Installs `body` as an executable shell script standing in for both
    /// engine binaries.
    #[cfg(unix)]
    fn fake_engine(dir: &tempfile::TempDir, body: &str) -> EngineConfig {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("fake-engine");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        EngineConfig::with_paths(path.clone(), path)
    }

    #[derive(Default)]
    struct LineRecorder {
        started: bool,
        lines: Vec<String>,
    }

    impl StageObserver for LineRecorder {
        fn on_start(&mut self, _command_line: &str) {
            self.started = true;
        }

        fn on_line(&mut self, line: &str) {
            self.lines.push(line.to_string());
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_streams_lines_split_on_carriage_returns() {
        let dir = tempfile::TempDir::new().unwrap();
        let invoker = FfmpegInvoker::new(fake_engine(
            &dir,
            r"printf 'first\rsecond\nthird\n' >&2",
        ));
        let command = EngineCommand::analyze(MediaSource::path("/tmp/in.mp4"), vec![]);
        let mut recorder = LineRecorder::default();

        let invocation = invoker.invoke(&command, &mut recorder).await.unwrap();

        assert!(recorder.started);
        assert_eq!(recorder.lines, vec!["first", "second", "third"]);
        assert_eq!(invocation.diagnostics, vec!["first", "second", "third"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout_for_inspection() {
        let dir = tempfile::TempDir::new().unwrap();
        let invoker = FfmpegInvoker::new(fake_engine(&dir, r#"echo '{"streams": []}'"#));
        let command = EngineCommand::inspect(MediaSource::path("/tmp/in.mp4"));

        let invocation = invoker.invoke(&command, &mut NoopObserver).await.unwrap();

        assert_eq!(String::from_utf8_lossy(&invocation.stdout).trim(), r#"{"streams": []}"#);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_crop_detection_through_real_process() {
        use crate::config::CropConfig;
        use crate::crop::CropDetector;
        use crate::probe::parse_probe_output;
        use crate::testing::fixtures;

        let dir = tempfile::TempDir::new().unwrap();
        let invoker = FfmpegInvoker::new(fake_engine(
            &dir,
            r"printf '[Parsed_cropdetect_0 @ 0x1] crop=100:100:0:0\r[Parsed_cropdetect_0 @ 0x1] crop=96:96:2:2\n' >&2",
        ));
        let metadata = parse_probe_output(&fixtures::probe_json(8.0, 100, 100)).unwrap();

        let detection = CropDetector::new(CropConfig::default())
            .detect(&invoker, MediaSource::path("/tmp/in.mp4"), &metadata, "job-1")
            .await
            .unwrap();

        assert_eq!(detection.region().unwrap().to_string(), "96x96+2+2");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_carries_diagnostic_tail() {
        let dir = tempfile::TempDir::new().unwrap();
        let invoker = FfmpegInvoker::new(fake_engine(
            &dir,
            "echo 'out_time_ms=1000' >&2\necho 'Unknown encoder foo' >&2\nexit 3",
        ));
        let command = EngineCommand::analyze(MediaSource::path("/tmp/in.mp4"), vec![]);

        let err = invoker
            .invoke(&command, &mut NoopObserver)
            .await
            .unwrap_err();

        match err {
            EngineError::Exited {
                code, diagnostics, ..
            } => {
                assert_eq!(code, Some(3));
                assert_eq!(diagnostics, "Unknown encoder foo");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stage_timeout_kills_child() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = fake_engine(&dir, "exec sleep 30").with_timeout(1);
        let invoker = FfmpegInvoker::new(config);
        let command = EngineCommand::analyze(MediaSource::path("/tmp/in.mp4"), vec![]);

        let started = Instant::now();
        let err = invoker
            .invoke(&command, &mut NoopObserver)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Timeout { timeout_secs: 1 }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
