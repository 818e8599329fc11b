//! Scripted engine for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::fixtures;
use crate::config::EngineConfig;
use crate::engine::{
    EngineCommand, EngineError, EngineMode, Invocation, ProcessInvoker, ProgressParser,
    StageObserver,
};

/// How a scripted run ends.
#[derive(Debug, Clone, PartialEq)]
pub enum MockExit {
    Success,
    /// Non-zero exit; the text becomes the diagnostic tail.
    Failure { code: i32, diagnostics: String },
    /// The binary could not be started.
    SpawnFailure,
    /// The stage ran into its time limit.
    Timeout { timeout_secs: u64 },
}

/// What one invocation in a given mode does.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    /// Diagnostic lines streamed to the observer, in order.
    pub lines: Vec<String>,
    /// Captured stdout (inspection mode).
    pub stdout: Vec<u8>,
    /// Bytes written to the output file, if the command has one. Written
    /// before the exit is applied, so failures leave partial files behind.
    pub output_bytes: Option<Vec<u8>>,
    pub exit: MockExit,
}

impl ScriptedRun {
    pub fn success() -> Self {
        Self {
            lines: Vec::new(),
            stdout: Vec::new(),
            output_bytes: None,
            exit: MockExit::Success,
        }
    }

    pub fn failure(diagnostics: impl Into<String>) -> Self {
        Self {
            exit: MockExit::Failure {
                code: 1,
                diagnostics: diagnostics.into(),
            },
            ..Self::success()
        }
    }

    pub fn with_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lines = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stdout(mut self, stdout: impl Into<Vec<u8>>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_output(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.output_bytes = Some(bytes.into());
        self
    }
}

/// Mock implementation of [`ProcessInvoker`].
///
/// Each [`EngineMode`] has its own script. The defaults describe an
/// 8 second 1920x1080 H.264 clip without letterboxing: inspection prints its
/// metadata, analysis prints full-frame crop candidates, and transforms
/// write a small output file.
///
/// # Example
///
/// ```rust,ignore
/// use reframe_core::testing::{MockInvoker, ScriptedRun};
/// use reframe_core::engine::EngineMode;
///
/// let invoker = MockInvoker::new();
/// invoker
///     .set_script(EngineMode::Transform, ScriptedRun::failure("Unknown encoder"))
///     .await;
///
/// // ... run a pipeline ...
///
/// assert_eq!(invoker.invocation_count(EngineMode::Transform).await, 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockInvoker {
    scripts: Arc<RwLock<HashMap<EngineMode, ScriptedRun>>>,
    recorded: Arc<RwLock<Vec<EngineCommand>>>,
    delay: Arc<RwLock<Duration>>,
}

impl Default for MockInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInvoker {
    pub fn new() -> Self {
        let mut scripts = HashMap::new();
        scripts.insert(
            EngineMode::Inspect,
            ScriptedRun::success().with_stdout(fixtures::probe_json(8.0, 1920, 1080)),
        );
        scripts.insert(
            EngineMode::Analyze,
            ScriptedRun::success().with_lines(fixtures::cropdetect_lines(1920, 1080, 0, 0, 3)),
        );
        scripts.insert(
            EngineMode::Transform,
            ScriptedRun::success()
                .with_lines(["out_time_ms=4000000", "progress=end"])
                .with_output(b"mock output".to_vec()),
        );

        Self {
            scripts: Arc::new(RwLock::new(scripts)),
            recorded: Arc::new(RwLock::new(Vec::new())),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    /// Replaces the script for `mode`.
    pub async fn set_script(&self, mode: EngineMode, run: ScriptedRun) {
        self.scripts.write().await.insert(mode, run);
    }

    /// Inspection reports `duration_secs` and a video stream of the given size.
    pub async fn set_probe(&self, duration_secs: f64, width: u32, height: u32) {
        self.set_script(
            EngineMode::Inspect,
            ScriptedRun::success().with_stdout(fixtures::probe_json(duration_secs, width, height)),
        )
        .await;
    }

    /// Analysis streams these diagnostic lines.
    pub async fn set_analysis_lines<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_script(EngineMode::Analyze, ScriptedRun::success().with_lines(lines))
            .await;
    }

    /// Makes `mode` exit non-zero with `diagnostics`. Transforms still leave
    /// a partial output file.
    pub async fn fail(&self, mode: EngineMode, diagnostics: impl Into<String>) {
        let mut run = ScriptedRun::failure(diagnostics);
        if mode == EngineMode::Transform {
            run = run.with_output(b"partial".to_vec());
        }
        self.set_script(mode, run).await;
    }

    /// Simulated run time of every invocation, spent after the start
    /// notification and before any output is written.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Every command received, in order.
    pub async fn recorded_commands(&self) -> Vec<EngineCommand> {
        self.recorded.read().await.clone()
    }

    pub async fn invocation_count(&self, mode: EngineMode) -> usize {
        self.recorded
            .read()
            .await
            .iter()
            .filter(|c| c.mode == mode)
            .count()
    }
}

#[async_trait]
impl ProcessInvoker for MockInvoker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(
        &self,
        command: &EngineCommand,
        observer: &mut dyn StageObserver,
    ) -> Result<Invocation, EngineError> {
        self.recorded.write().await.push(command.clone());
        let run = self
            .scripts
            .read()
            .await
            .get(&command.mode)
            .cloned()
            .unwrap_or_else(ScriptedRun::success);

        let config = EngineConfig::default();
        let program = command.program(&config).display().to_string();
        if run.exit == MockExit::SpawnFailure {
            return Err(EngineError::spawn(program, "binary not found"));
        }

        observer.on_start(&command.command_line(&config));

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut progress = ProgressParser::new(command.expected_duration_secs)
            .with_interval(Duration::ZERO);
        for line in &run.lines {
            observer.on_line(line);
            if let Some(percent) = progress.feed(line) {
                observer.on_progress(percent);
            }
        }

        if let (Some(path), Some(bytes)) = (command.output_path(), run.output_bytes.as_ref()) {
            tokio::fs::write(path, bytes).await?;
        }

        match run.exit {
            MockExit::Success => Ok(Invocation {
                stdout: run.stdout,
                diagnostics: run.lines,
                elapsed_ms: delay.as_millis() as u64,
            }),
            MockExit::Failure { code, diagnostics } => Err(EngineError::Exited {
                program,
                code: Some(code),
                diagnostics,
            }),
            MockExit::Timeout { timeout_secs } => Err(EngineError::Timeout { timeout_secs }),
            MockExit::SpawnFailure => Err(EngineError::spawn(program, "binary not found")),
        }
    }

    async fn validate(&self) -> Result<(), EngineError> {
        Ok(())
    }
}
