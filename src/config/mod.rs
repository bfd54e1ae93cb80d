// file: src/config/mod.rs
// version: 2.0.0
// guid: a1b2c3d4-e5f6-7a8b-9c0d-1e2f3a4b5c6d

//! Configuration module for vela
//!
//! Handles loading and validation of the command line configuration: which
//! cluster backend to talk to and how to log.

pub mod loader;

pub use loader::ConfigLoader;

use crate::{Result, VelaError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Where cluster resources are read from and written to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// YAML files under the vela home directory
    #[default]
    Local,
    /// The platform API server
    Api,
}

impl std::str::FromStr for Backend {
    type Err = VelaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "api" => Ok(Backend::Api),
            _ => Err(VelaError::config(format!("Unknown cluster backend: {}", s))),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = VelaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(VelaError::config(format!("Unknown log format: {}", s))),
        }
    }
}

/// Command line configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CliConfig {
    #[validate(nested)]
    pub cluster: ClusterConfig,
    #[validate(nested)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClusterConfig {
    pub backend: Backend,

    /// Root of the local store; `~` is expanded
    #[validate(length(min = 1))]
    pub home: String,

    #[validate(url)]
    pub api_server: Option<String>,

    pub token: Option<String>,

    #[validate(length(min = 1, max = 63))]
    pub namespace: String,

    /// Per-request timeout for API calls
    #[validate(range(min = 1, max = 600))]
    pub timeout_seconds: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            home: "~/.vela".to_string(),
            api_server: None,
            token: None,
            namespace: "default".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ClusterConfig {
    /// Local store root with `~` expanded
    pub fn home_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.home).into_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    #[validate(length(min = 1))]
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl CliConfig {
    /// Default location of the user configuration file
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vela").join("config.toml"))
    }

    /// Field validation plus cross-field rules
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| VelaError::config(format!("Invalid configuration: {}", e)))?;

        if self.cluster.backend == Backend::Api && self.cluster.api_server.is_none() {
            return Err(VelaError::config(
                "cluster.api_server must be set when cluster.backend = \"api\"",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CliConfig::default();

        assert!(config.check().is_ok());
        assert_eq!(config.cluster.backend, Backend::Local);
        assert!(config.cluster.home_dir().ends_with(".vela"));
    }

    #[test]
    fn test_api_backend_requires_server() {
        let mut config = CliConfig::default();
        config.cluster.backend = Backend::Api;

        let err = config.check().unwrap_err();
        assert!(err.to_string().contains("api_server"));

        config.cluster.api_server = Some("https://cluster.example.com:6443".to_string());
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_field_validation() {
        let mut config = CliConfig::default();
        config.cluster.timeout_seconds = 0;
        assert!(config.check().is_err());

        let mut config = CliConfig::default();
        config.cluster.api_server = Some("not a url".to_string());
        assert!(config.check().is_err());
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("API".parse::<Backend>().unwrap(), Backend::Api);
        assert!("kube".parse::<Backend>().is_err());
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
    }
}
