// Server configuration: built-in defaults, then an optional TOML file, then
// SITESAFE__* environment variables

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use sitesafe_eye::config::{
    DetectorConfig, EyeConfig, RetentionConfig, SettleConfig, StorageConfig, VerdictConfig,
};
use std::net::SocketAddr;
use std::path::Path;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sitesafe.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_upload_bytes: 200 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("Invalid listen address {}:{}: {}", self.host, self.port, e))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.socket_addr()?;
        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Fallback filter when RUST_LOG is unset
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSafeConfig {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub detector: DetectorConfig,
    pub storage: StorageConfig,
    pub settle: SettleConfig,
    pub verdict: VerdictConfig,
    pub retention: RetentionConfig,
}

impl SiteSafeConfig {
    /// Load configuration. An explicit `path` must exist; otherwise
    /// `sitesafe.toml` is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);
        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        builder
            .add_source(
                Environment::with_prefix("SITESAFE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Settings consumed by the detection pipeline
    pub fn eye(&self) -> EyeConfig {
        EyeConfig {
            detector: self.detector.clone(),
            storage: self.storage.clone(),
            settle: self.settle.clone(),
            verdict: self.verdict.clone(),
            retention: self.retention.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.eye().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_defaults() {
        let config = SiteSafeConfig::default();
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.log.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9000

[detector]
program = "/opt/venv/bin/yolo"
class_names = ["Hardhat", "Mask", "Person"]

[verdict]
video_scope = "all_frames"

[verdict.labels]
helmet = ["Hardhat"]
mask = ["Mask"]
"#
        )
        .unwrap();

        let config = SiteSafeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.detector.program, "/opt/venv/bin/yolo");
        assert_eq!(config.detector.class_names.len(), 3);
        assert_eq!(
            config.verdict.video_scope,
            sitesafe_eye::VideoVerdictScope::AllFrames
        );
        assert_eq!(config.verdict.labels.helmet, vec!["Hardhat".to_string()]);
        assert_eq!(config.retention.max_runs, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[settle]\nstable_polls = 4").unwrap();

        // no other test in this module reads the settle section
        std::env::set_var("SITESAFE__SETTLE__STABLE_POLLS", "7");
        let result = SiteSafeConfig::load(Some(file.path()));
        std::env::remove_var("SITESAFE__SETTLE__STABLE_POLLS");

        let config = result.unwrap();
        assert_eq!(config.settle.stable_polls, 7);
        assert_eq!(config.server.port, 8501);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let result = SiteSafeConfig::load(Some(Path::new("/nonexistent/sitesafe.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_host() {
        let mut config = SiteSafeConfig::default();
        config.server.host = "not a host".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_eye_config_carries_sections() {
        let mut config = SiteSafeConfig::default();
        config.retention.max_runs = 3;
        config.settle.timeout_ms = 900;
        let eye = config.eye();
        assert_eq!(eye.retention.max_runs, 3);
        assert_eq!(eye.settle.timeout_ms, 900);
    }
}
