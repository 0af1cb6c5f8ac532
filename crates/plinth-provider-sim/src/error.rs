//! Simulated provider error types

use plinth_engine::ProviderError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("Unsupported resource type: {0}")]
    UnsupportedType(String),

    #[error("Missing required property '{property}'")]
    MissingProperty { property: String },

    #[error("Invalid value for '{property}': {message}")]
    InvalidProperty { property: String, message: String },

    #[error("Injected failure for '{0}'")]
    Injected(String),

    #[error("Request limit exceeded for '{0}'")]
    Throttled(String),
}

impl From<SimError> for ProviderError {
    fn from(error: SimError) -> Self {
        match error {
            SimError::Throttled(_) => ProviderError::retryable(error.to_string()),
            _ => ProviderError::permanent(error.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
