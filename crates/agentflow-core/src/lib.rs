//! Core traits and types for AgentFlow.
//!
//! This crate defines the foundational abstractions shared by the function
//! engine and the message pipeline: the extension registry, the function
//! data model, provider boundaries, notifications and configuration.

pub mod config;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod extension;
pub mod function;
pub mod llm;
pub mod speech;

pub use config::{AgentFlowConfig, FunctionConfig, PipelineConfig};
pub use error::{Error, Result};

// Event exports
pub use event::{AgentFlowEvent, EventMetadata};

// Event bus exports
pub use eventbus::{EventBus, EventReceiver};

pub use extension::{
    Extension, ExtensionContext, ExtensionError, ExtensionHandle, ExtensionMetadata,
    ExtensionRegistry, ExtensionResult, FunctionOwner, FunctionProvider,
};
pub use function::{
    ArgValue, Arguments, CallId, FunctionCall, FunctionDefinition, FunctionError,
    FunctionResult, ParameterDefinition, ParameterType,
};
pub use llm::{ChatRequest, ChatResponse, LlmError, Message, MessageRole, ModelProvider};
pub use speech::{AudioClip, SpeechError, SpeechProvider};

/// Re-exports commonly used types.
pub mod prelude {
    // Configuration
    pub use crate::config::{
        AgentFlowConfig, FunctionConfig, PipelineConfig, defaults, env_vars,
    };

    // Error handling
    pub use crate::error::{Error, Result};

    // Extensions
    pub use crate::extension::{
        DynExtension, DynFunctionProvider, Extension, ExtensionContext, ExtensionError,
        ExtensionHandle, ExtensionMetadata, ExtensionRegistry, ExtensionResult,
        FunctionProvider,
    };

    // Functions
    pub use crate::function::{
        ArgValue, Arguments, FunctionCall, FunctionDefinition, FunctionError, FunctionResult,
        ParameterDefinition, ParameterType,
    };

    // Providers
    pub use crate::llm::{ChatRequest, ChatResponse, LlmError, Message, MessageRole, ModelProvider};
    pub use crate::speech::{AudioClip, SpeechError, SpeechProvider};

    // Event types
    pub use crate::event::{AgentFlowEvent, EventMetadata};

    // Event bus
    pub use crate::eventbus::{EventBus, EventReceiver};
}
