//! Trait definitions for the engine module.

use async_trait::async_trait;

use super::command::EngineCommand;
use super::error::EngineError;
use super::observer::StageObserver;

/// What a successful invocation produced besides its output file.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// Captured standard output (only for `OutputTarget::Stdout`).
    pub stdout: Vec<u8>,
    /// Trailing diagnostic lines, progress records excluded.
    pub diagnostics: Vec<String>,
    /// Wall clock time of the invocation in milliseconds.
    pub elapsed_ms: u64,
}

/// Runs the external media engine.
///
/// One call spawns exactly one process and returns only after it has
/// terminated. Implementations never retry.
#[async_trait]
pub trait ProcessInvoker: Send + Sync {
    /// Returns the name of this invoker implementation.
    fn name(&self) -> &str;

    /// Runs `command`, streaming diagnostics to `observer`.
    async fn invoke(
        &self,
        command: &EngineCommand,
        observer: &mut dyn StageObserver,
    ) -> Result<Invocation, EngineError>;

    /// Validates that the engine binaries are reachable.
    async fn validate(&self) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MediaSource, NoopObserver};

    struct EchoInvoker;

    #[async_trait]
    impl ProcessInvoker for EchoInvoker {
        fn name(&self) -> &str {
            "echo"
        }

        async fn invoke(
            &self,
            command: &EngineCommand,
            observer: &mut dyn StageObserver,
        ) -> Result<Invocation, EngineError> {
            observer.on_start(&command.input.as_arg());
            Ok(Invocation {
                stdout: command.input.as_arg().into_bytes(),
                ..Default::default()
            })
        }

        async fn validate(&self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_invoker_trait_object() {
        let invoker: Box<dyn ProcessInvoker> = Box::new(EchoInvoker);
        let command = EngineCommand::inspect(MediaSource::url("https://x/y.mp4"));
        let invocation = invoker.invoke(&command, &mut NoopObserver).await.unwrap();
        assert_eq!(invocation.stdout, b"https://x/y.mp4");
        assert_eq!(invoker.name(), "echo");
    }
}
