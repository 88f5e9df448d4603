//! Error types for the agent crate.

use agentflow_core::llm::LlmError;

// Re-export the core error type
pub use agentflow_core::error::Error as AgentFlowError;

/// Why a message did not make it through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The agent is already handling a message; the caller may retry later.
    #[error("Agent '{0}' is already processing a message")]
    AlreadyProcessing(String),

    /// The model answered with no text.
    #[error("Model returned an empty response")]
    EmptyResponse,

    /// The model call failed or timed out.
    #[error("Model call failed: {0}")]
    Model(#[from] LlmError),
}

impl PipelineError {
    /// Whether the message was turned away before any work started.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::AlreadyProcessing(_))
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<PipelineError> for AgentFlowError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Model(llm) => AgentFlowError::Llm(llm),
            other => AgentFlowError::Pipeline(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::AlreadyProcessing("helper".to_string());
        assert!(err.to_string().contains("helper"));
        assert!(err.is_rejection());
    }

    #[test]
    fn test_into_core_error() {
        let core: AgentFlowError = PipelineError::Model(LlmError::Timeout(5)).into();
        assert!(matches!(core, AgentFlowError::Llm(LlmError::Timeout(5))));

        let core: AgentFlowError = PipelineError::EmptyResponse.into();
        assert!(matches!(core, AgentFlowError::Pipeline(_)));
    }
}
