// file: src/error.rs
// version: 1.0.0
// guid: ed18fd65-a9ce-4afe-86c1-f507f6bbbe47

use thiserror::Error;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, VelaError>;

/// Error types for the vela command line
#[derive(Error, Debug)]
pub enum VelaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cluster error: {0}")]
    Cluster(String),

    #[error(transparent)]
    Cli(#[from] clap::Error),

    #[error("failed to fetch {kind} definitions: {source}")]
    Registry {
        kind: String,
        #[source]
        source: Box<VelaError>,
    },

    #[error("{kind} definition {name} not found")]
    NotFound { kind: String, name: String },

    #[error("definition {name} is invalid: {reason}")]
    DefinitionInvalid { name: String, reason: String },

    #[error("definition {definition} is unsupported: parameter {parameter}: {reason}")]
    SchemaUnsupported {
        definition: String,
        parameter: String,
        reason: String,
    },

    #[error("command {name} conflicts with an existing command")]
    CommandConflict { name: String },

    #[error("unknown parameter {parameter} for {command}")]
    UnknownParameter { command: String, parameter: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("target not ready: {target} is {phase}")]
    TargetNotReady { target: String, phase: String },

    #[error("confirmation failed for {identity}: {reason} ({rollback})")]
    ConfirmationFailed {
        identity: String,
        reason: String,
        rollback: String,
    },

    #[error("interrupted while applying {identity} ({rollback})")]
    Interrupted { identity: String, rollback: String },
}

impl VelaError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new cluster collaborator error
    pub fn cluster(msg: impl Into<String>) -> Self {
        Self::Cluster(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new target-not-found error
    pub fn target_not_found(msg: impl Into<String>) -> Self {
        Self::TargetNotFound(msg.into())
    }

    /// Create a new invalid definition error
    pub fn definition_invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DefinitionInvalid {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new unsupported schema error
    pub fn schema_unsupported(
        definition: impl Into<String>,
        parameter: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SchemaUnsupported {
            definition: definition.into(),
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Errors confined to a single definition. The plugin loader skips the
    /// definition and keeps going.
    pub fn is_definition_level(&self) -> bool {
        matches!(
            self,
            Self::DefinitionInvalid { .. }
                | Self::SchemaUnsupported { .. }
                | Self::CommandConflict { .. }
        )
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cli(e) => e.exit_code(),
            Self::Interrupted { .. } => 130,
            _ => 1,
        }
    }
}
