// file: src/config/loader.rs
// version: 2.0.0
// guid: d4e5f6g7-h8i9-0123-4567-890123defghi

//! Configuration file loading and environment variable substitution

use super::{CliConfig, LogFormat};
use crate::{Result, VelaError};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
    env_vars: HashMap<String, String>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            env_vars: std::env::vars().collect(),
        }
    }

    /// Create a loader that sees no process environment
    pub fn isolated() -> Self {
        Self {
            env_vars: HashMap::new(),
        }
    }

    /// Load configuration from an explicit file, or from the user config
    /// directory when present, then apply `VELA_*` overrides
    pub fn load(&self, explicit: Option<&Path>) -> Result<CliConfig> {
        let mut config = match explicit {
            Some(path) => self.load_file(path)?,
            None => match CliConfig::user_config_path().filter(|p| p.exists()) {
                Some(path) => self.load_file(&path)?,
                None => CliConfig::default(),
            },
        };

        self.apply_env_overrides(&mut config)?;
        config.check()?;

        debug!("Final configuration: {:?}", config.cluster.backend);
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<CliConfig> {
        let content = fs::read_to_string(&path).map_err(|e| {
            VelaError::config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        info!("Loading configuration from: {}", path.as_ref().display());
        self.load_str(&content)
    }

    /// Parse configuration content after placeholder expansion
    pub fn load_str(&self, content: &str) -> Result<CliConfig> {
        let expanded = self.expand_env_vars(content)?;
        Ok(toml::from_str(&expanded)?)
    }

    /// Expand `${VAR}` placeholders in configuration content
    fn expand_env_vars(&self, content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| VelaError::config(format!("Invalid regex pattern: {}", e)))?;

        let mut missing_vars = Vec::new();
        let expanded = re.replace_all(content, |caps: &regex::Captures| {
            match self.env_vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => {
                    missing_vars.push(caps[1].to_string());
                    String::new()
                }
            }
        });

        if !missing_vars.is_empty() {
            return Err(VelaError::config(format!(
                "Missing environment variables: {}",
                missing_vars.join(", ")
            )));
        }

        Ok(expanded.into_owned())
    }

    /// Set environment variable for substitution and overrides
    pub fn set_env_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env_vars.insert(key.into(), value.into());
    }

    /// Apply `VELA_*` environment overrides
    fn apply_env_overrides(&self, config: &mut CliConfig) -> Result<()> {
        if let Some(backend) = self.env_vars.get("VELA_BACKEND") {
            config.cluster.backend = backend.parse()?;
        }

        if let Some(home) = self.env_vars.get("VELA_HOME") {
            config.cluster.home = home.clone();
        }

        if let Some(server) = self.env_vars.get("VELA_API_SERVER") {
            config.cluster.api_server = Some(server.clone());
        }

        if let Some(token) = self.env_vars.get("VELA_TOKEN") {
            config.cluster.token = Some(token.clone());
        }

        if let Some(namespace) = self.env_vars.get("VELA_NAMESPACE") {
            config.cluster.namespace = namespace.clone();
        }

        if let Some(timeout) = self.env_vars.get("VELA_TIMEOUT") {
            config.cluster.timeout_seconds = timeout.parse().map_err(|_| {
                VelaError::config(format!("VELA_TIMEOUT must be a number of seconds, got {}", timeout))
            })?;
        }

        if let Some(level) = self.env_vars.get("VELA_LOG_LEVEL") {
            config.logging.level = level.clone();
        }

        if let Some(format) = self.env_vars.get("VELA_LOG_FORMAT") {
            config.logging.format = format.parse::<LogFormat>()?;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
