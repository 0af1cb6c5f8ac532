//! Engine error types

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Problems in the declared resource set, detected before anything runs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    #[error("Resource '{from}' depends on unknown resource '{to}'")]
    UnknownReference { from: String, to: String },

    #[error("Resource '{0}' is declared more than once")]
    DuplicateResource(String),

    #[error("Resource '{name}' has type '{resource_type}', which provider '{provider}' does not support")]
    UnknownResourceType {
        name: String,
        resource_type: String,
        provider: String,
    },

    #[error("Output '{output}' references unknown resource '{resource}'")]
    UnknownOutputResource { output: String, resource: String },
}

/// Fatal engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("State is locked by {holder} since {since}; another run is in progress")]
    ConcurrentRun {
        holder: String,
        since: DateTime<Utc>,
    },

    #[error("State file error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors reported by a resource provider for a single call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Transient failure (throttling, timeouts); the call may be retried
    #[error("{0} (retryable)")]
    Retryable(String),

    /// The call cannot succeed as requested
    #[error("{0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// An output binding that could not be read after a run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MissingOutputError {
    #[error("output '{output}': resource '{resource}' did not succeed in this run")]
    NotApplied { output: String, resource: String },

    #[error("output '{output}': resource '{resource}' is not in state")]
    NotInState { output: String, resource: String },

    #[error("output '{output}': resource '{resource}' has no attribute '{attribute}'")]
    NoAttribute {
        output: String,
        resource: String,
        attribute: String,
    },
}

impl MissingOutputError {
    pub fn output(&self) -> &str {
        match self {
            Self::NotApplied { output, .. }
            | Self::NotInState { output, .. }
            | Self::NoAttribute { output, .. } => output,
        }
    }
}
