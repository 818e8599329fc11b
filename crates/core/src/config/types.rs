use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub crop: CropConfig,
    #[serde(default)]
    pub thumbnail: ThumbnailConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for a single multipart upload body.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    2 * 1024 * 1024 * 1024
}

/// External media engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Per-stage wall clock limit. `None` waits for the engine indefinitely.
    #[serde(default)]
    pub stage_timeout_secs: Option<u64>,

    /// Additional ffmpeg arguments inserted before the output target of transform stages.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,

    /// Number of trailing diagnostic lines kept for error reports.
    #[serde(default = "default_diagnostic_tail_lines")]
    pub diagnostic_tail_lines: usize,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_diagnostic_tail_lines() -> usize {
    40
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            stage_timeout_secs: None,
            extra_ffmpeg_args: Vec::new(),
            diagnostic_tail_lines: default_diagnostic_tail_lines(),
        }
    }
}

impl EngineConfig {
    /// Creates a config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the per-stage timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.stage_timeout_secs = Some(timeout_secs);
        self
    }
}

/// Filesystem locations for job artifacts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    std::env::temp_dir().join("reframe").join("uploads")
}

fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("reframe").join("outputs")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl StorageConfig {
    /// Places both directories under a single root.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            upload_dir: root.join("uploads"),
            output_dir: root.join("outputs"),
        }
    }
}

/// Parameters handed to the engine's `cropdetect` filter
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CropConfig {
    /// Black threshold (0-255). Pixels darker than this count as bars.
    #[serde(default = "default_crop_limit")]
    pub limit: u8,
    /// Width/height are rounded down to a multiple of this value.
    #[serde(default = "default_crop_round")]
    pub round: u8,
}

fn default_crop_limit() -> u8 {
    24
}

fn default_crop_round() -> u8 {
    2
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            limit: default_crop_limit(),
            round: default_crop_round(),
        }
    }
}

/// Thumbnail defaults for URL probes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThumbnailConfig {
    #[serde(default = "default_thumbnail_format")]
    pub default_format: String,
}

fn default_thumbnail_format() -> String {
    "jpg".to_string()
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            default_format: default_thumbnail_format(),
        }
    }
}

/// Sanitized config for API responses (binary locations reduced to file names)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub engine: SanitizedEngineConfig,
    pub crop: CropConfig,
    pub thumbnail: ThumbnailConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEngineConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_timeout_secs: Option<u64>,
}

fn binary_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            engine: SanitizedEngineConfig {
                ffmpeg: binary_name(&config.engine.ffmpeg_path),
                ffprobe: binary_name(&config.engine.ffprobe_path),
                stage_timeout_secs: config.engine.stage_timeout_secs,
            },
            crop: config.crop.clone(),
            thumbnail: config.thumbnail.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_server_section() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.server.max_upload_bytes, 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.crop.limit, 24);
        assert_eq!(config.crop.round, 2);
        assert_eq!(config.thumbnail.default_format, "jpg");
        assert_eq!(config.engine.diagnostic_tail_lines, 40);
        assert!(config.storage.upload_dir.ends_with("reframe/uploads"));
    }

    #[test]
    fn test_deserialize_engine_section() {
        let toml = r#"
[engine]
ffprobe_path = "/usr/local/bin/ffprobe"
extra_ffmpeg_args = ["-threads", "2"]

[crop]
limit = 16
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.engine.ffprobe_path,
            PathBuf::from("/usr/local/bin/ffprobe")
        );
        assert_eq!(config.engine.extra_ffmpeg_args, vec!["-threads", "2"]);
        assert_eq!(config.crop.limit, 16);
        assert_eq!(config.crop.round, 2);
    }

    #[test]
    fn test_storage_rooted_at() {
        let storage = StorageConfig::rooted_at(Path::new("/srv/reframe"));
        assert_eq!(storage.upload_dir, PathBuf::from("/srv/reframe/uploads"));
        assert_eq!(storage.output_dir, PathBuf::from("/srv/reframe/outputs"));
    }

    #[test]
    fn test_sanitized_config_hides_binary_locations() {
        let mut config = Config::default();
        config.engine = EngineConfig::with_paths(
            PathBuf::from("/opt/media/bin/ffmpeg"),
            PathBuf::from("/opt/media/bin/ffprobe"),
        )
        .with_timeout(120);

        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.engine.ffmpeg, "ffmpeg");
        assert_eq!(sanitized.engine.ffprobe, "ffprobe");
        assert_eq!(sanitized.engine.stage_timeout_secs, Some(120));
        assert_eq!(sanitized.server.port, 8080);
    }
}
