//! Process invoker for the external media engine.
//!
//! Every stage of a job is one invocation of `ffmpeg` or `ffprobe`. This
//! module turns an [`EngineCommand`] into a child process, streams its
//! diagnostic output line by line to a [`StageObserver`], and reports the
//! terminal status as an [`Invocation`] or an [`EngineError`].
//!
//! # Example
//!
//! ```ignore
//! use reframe_core::engine::{EngineCommand, FfmpegInvoker, MediaSource, NoopObserver, ProcessInvoker};
//!
//! let invoker = FfmpegInvoker::with_defaults();
//! invoker.validate().await?;
//!
//! let command = EngineCommand::inspect(MediaSource::path("/srv/uploads/clip.mp4"));
//! let invocation = invoker.invoke(&command, &mut NoopObserver).await?;
//! println!("{} bytes of probe output", invocation.stdout.len());
//! ```

mod command;
mod error;
mod ffmpeg;
mod observer;
mod traits;

pub use command::{EngineCommand, EngineMode, MediaSource, OutputTarget};
pub use error::{EngineError, StageError, StageOutcome};
pub use ffmpeg::FfmpegInvoker;
pub use observer::{NoopObserver, ProgressLogger, ProgressParser, StageObserver};
pub use traits::{Invocation, ProcessInvoker};
