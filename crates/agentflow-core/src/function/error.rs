//! Error taxonomy for the function-calling path.
//!
//! These errors never escape as faults: the orchestrator stores them inside a
//! failed [`FunctionResult`](super::FunctionResult), so they are plain,
//! cloneable, serializable data.

use serde::{Deserialize, Serialize};

/// Why a function call did not produce a successful result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FunctionError {
    /// The call carried no function name.
    #[error("Function name is empty")]
    EmptyFunctionName,

    /// The argument payload is not a JSON object.
    #[error("Malformed arguments for '{function}': {reason}")]
    MalformedArguments { function: String, reason: String },

    /// A parameter marked required in the schema is absent.
    #[error("Missing required parameter '{parameter}' for '{function}'")]
    MissingRequiredParameter { function: String, parameter: String },

    /// A supplied argument has the wrong type or is outside its enum.
    #[error("Invalid argument '{parameter}' for '{function}': {reason}")]
    InvalidArgument {
        function: String,
        parameter: String,
        reason: String,
    },

    /// No registered extension owns the function.
    #[error("No extension provides function '{function}'")]
    NoExtensionForFunction { function: String },

    /// The tracker is at its in-flight ceiling; the caller may retry.
    #[error("Concurrency limit of {limit} in-flight calls exceeded")]
    ConcurrencyLimitExceeded { limit: usize },

    /// The extension did not complete within the configured timeout.
    #[error("Function '{function}' timed out after {timeout_ms}ms")]
    Timeout { function: String, timeout_ms: u64 },

    /// The extension returned an error or panicked.
    #[error("Extension '{extension}' failed executing '{function}': {message}")]
    ExtensionExecutionError {
        extension: String,
        function: String,
        message: String,
    },
}

impl FunctionError {
    /// Stable, machine-friendly name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyFunctionName => "empty_function_name",
            Self::MalformedArguments { .. } => "malformed_arguments",
            Self::MissingRequiredParameter { .. } => "missing_required_parameter",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::NoExtensionForFunction { .. } => "no_extension_for_function",
            Self::ConcurrencyLimitExceeded { .. } => "concurrency_limit_exceeded",
            Self::Timeout { .. } => "timeout",
            Self::ExtensionExecutionError { .. } => "extension_execution_error",
        }
    }

    /// Validation and resolution failures are reported before any dispatch.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::EmptyFunctionName
                | Self::MalformedArguments { .. }
                | Self::MissingRequiredParameter { .. }
                | Self::InvalidArgument { .. }
                | Self::NoExtensionForFunction { .. }
        )
    }
}
