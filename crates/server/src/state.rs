use reframe_core::{Config, PipelineOrchestrator, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: PipelineOrchestrator,
}

impl AppState {
    pub fn new(config: Config, orchestrator: PipelineOrchestrator) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &PipelineOrchestrator {
        &self.orchestrator
    }
}
