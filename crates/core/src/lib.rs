pub mod config;
pub mod crop;
pub mod engine;
pub mod job;
pub mod metrics;
pub mod pipeline;
pub mod probe;
pub mod testing;
pub mod transcode;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use engine::{FfmpegInvoker, MediaSource, ProcessInvoker};
pub use job::{Job, JobState, Operation};
pub use pipeline::{Delivery, PipelineError, PipelineOrchestrator, ThumbnailProbe};
pub use probe::MediaMetadata;
