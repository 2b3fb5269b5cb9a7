//! Process configuration, read once at startup.
//!
//! Values come from an optional TOML file and are overridden by command line
//! flags. Capture and overlay settings are not here; they live in the
//! hot-reloadable settings record.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub camera: CameraConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServerConfig {
    #[serde(default = "default_bind_ip")]
    pub bind_ip: String,

    #[serde(default = "default_web_port")]
    pub web_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: default_bind_ip(),
            web_port: default_web_port(),
        }
    }
}

/// Camera selection and settings storage
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CameraConfig {
    /// V4L2 device index (`/dev/videoN`). Changing it requires a restart.
    #[serde(default)]
    pub device_id: usize,

    /// Env-style file holding the persisted capture/overlay settings
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,

    /// Serve a synthetic test pattern instead of opening the camera
    #[serde(default)]
    pub test_pattern: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            settings_file: default_settings_file(),
            test_pattern: false,
        }
    }
}

// Default value functions
fn default_bind_ip() -> String { "0.0.0.0".to_string() }
fn default_web_port() -> u16 { 8877 }
fn default_settings_file() -> PathBuf { PathBuf::from("settings.env") }

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Load from the file if it exists, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr().map(|_| ())
    }

    /// Socket address the HTTP server binds to
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.bind_ip, self.server.web_port)
            .parse()
            .map_err(|e| {
                ConfigError::Invalid(format!(
                    "bad bind address {}:{}: {}",
                    self.server.bind_ip, self.server.web_port, e
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.web_port, 8877);
        assert_eq!(config.server.bind_ip, "0.0.0.0");
        assert_eq!(config.camera.device_id, 0);
        assert_eq!(config.camera.settings_file, PathBuf::from("settings.env"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            web-port = 9000

            [camera]
            device-id = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.server.web_port, 9000);
        assert_eq!(config.server.bind_ip, "0.0.0.0");
        assert_eq!(config.camera.device_id, 2);
        assert!(!config.camera.test_pattern);
    }

    #[test]
    fn test_bad_bind_ip_rejected() {
        let err = Config::from_toml("[server]\nbind-ip = \"not an ip\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_or_default("/nonexistent/crosshair-cam.toml").unwrap();
        assert_eq!(config.server.web_port, 8877);
    }
}
