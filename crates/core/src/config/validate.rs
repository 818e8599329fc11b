use super::{types::Config, ConfigError};
use crate::transcode::ImageFormat;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Stage timeout, when set, is not 0
/// - Diagnostic tail keeps at least one line
/// - Crop rounding is not 0
/// - Default thumbnail format is on the image allow-list
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.engine.stage_timeout_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "engine.stage_timeout_secs cannot be 0 (omit it to disable the timeout)".to_string(),
        ));
    }

    if config.engine.diagnostic_tail_lines == 0 {
        return Err(ConfigError::ValidationError(
            "engine.diagnostic_tail_lines cannot be 0".to_string(),
        ));
    }

    if config.crop.round == 0 {
        return Err(ConfigError::ValidationError(
            "crop.round cannot be 0".to_string(),
        ));
    }

    if ImageFormat::parse(&config.thumbnail.default_format).is_none() {
        return Err(ConfigError::ValidationError(format!(
            "thumbnail.default_format '{}' is not a supported image format",
            config.thumbnail.default_format
        )));
    }

    Ok(())
}
