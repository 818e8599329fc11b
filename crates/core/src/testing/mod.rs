//! Testing utilities: a scripted engine and canned engine output.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use reframe_core::testing::MockInvoker;
//! use reframe_core::pipeline::PipelineOrchestrator;
//!
//! let invoker = MockInvoker::new();
//! invoker.set_analysis_lines(fixtures::cropdetect_lines(1920, 800, 0, 140, 5)).await;
//! let orchestrator = PipelineOrchestrator::new(&config, Arc::new(invoker.clone()));
//! ```

pub mod fixtures;
mod mock_invoker;

pub use mock_invoker::{MockExit, MockInvoker, ScriptedRun};
