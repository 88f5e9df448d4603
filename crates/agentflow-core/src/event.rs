//! Notifications emitted by the orchestration engine.

use serde::{Deserialize, Serialize};

/// Every notification the engine publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentFlowEvent {
    /// A validated call is about to be dispatched.
    FunctionInvoked {
        call_id: String,
        function: String,
        extension: String,
        arguments: String,
        timestamp: i64,
    },

    /// A call produced its result (success, failure or timeout).
    FunctionCompleted {
        call_id: Option<String>,
        function: String,
        extension: String,
        success: bool,
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: i64,
    },

    /// The pipeline produced a final response for an agent.
    AgentResponseReady {
        agent: String,
        text: String,
        has_audio: bool,
        timestamp: i64,
    },

    /// The pipeline for an agent moved to a new stage.
    PipelineStageChanged {
        agent: String,
        stage: String,
        timestamp: i64,
    },

    /// A failure worth surfacing to the user.
    Error {
        source: String,
        message: String,
        timestamp: i64,
    },
}

impl AgentFlowEvent {
    /// Variant name, used for logging and filtering.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::FunctionInvoked { .. } => "FunctionInvoked",
            Self::FunctionCompleted { .. } => "FunctionCompleted",
            Self::AgentResponseReady { .. } => "AgentResponseReady",
            Self::PipelineStageChanged { .. } => "PipelineStageChanged",
            Self::Error { .. } => "Error",
        }
    }

    pub fn is_function_event(&self) -> bool {
        matches!(
            self,
            Self::FunctionInvoked { .. } | Self::FunctionCompleted { .. }
        )
    }

    pub fn is_pipeline_event(&self) -> bool {
        matches!(
            self,
            Self::AgentResponseReady { .. } | Self::PipelineStageChanged { .. }
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Convenience constructor for an error notification stamped now.
    pub fn error(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            source: source.into(),
            message: message.into(),
            timestamp: now_millis(),
        }
    }
}

/// Envelope data attached to every published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub event_id: String,
    /// Component that published the event, e.g. `function:add`
    pub source: String,
    pub timestamp: i64,
    /// Links related events, e.g. the call id of a function invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl EventMetadata {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            timestamp: now_millis(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
