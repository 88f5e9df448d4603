//! Unified error handling for AgentFlow.
//!
//! Each subsystem keeps its own error enum close to the code that raises it;
//! this module provides the umbrella type that all of them convert into, so
//! callers composing several subsystems can use a single `Result`.

use crate::extension::ExtensionError;
use crate::function::FunctionError;
use crate::llm::LlmError;
use crate::speech::SpeechError;

/// Unified error type for AgentFlow.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Extension registry or extension runtime errors.
    #[error("Extension error: {0}")]
    Extension(#[from] ExtensionError),

    /// Function-call errors.
    #[error("Function error: {0}")]
    Function(#[from] FunctionError),

    /// Model provider errors.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Speech provider errors.
    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    /// Message pipeline errors.
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Validation errors.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Timeout errors.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
