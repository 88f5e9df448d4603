//! Model provider boundary.
//!
//! The core never talks to a model API itself; it calls a [`ModelProvider`]
//! supplied by the surrounding application.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::function::{FunctionCall, FunctionDefinition};

/// Model provider errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    /// Provider not available
    #[error("Provider {0} not available")]
    Unavailable(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generation error
    #[error("Generation error: {0}")]
    Generation(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout
    #[error("Operation timed out after {0}s")]
    Timeout(u64),

    /// The provider does not implement this operation
    #[error("Not supported: {0}")]
    NotSupported(String),
}

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    /// Result of a function call, fed back to the model
    Function,
}

/// A conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Function name for `Function` messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Calls requested by an `Assistant` message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub function_calls: Vec<FunctionCall>,
}

impl Message {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            function_calls: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::with_role(MessageRole::Function, content)
        }
    }

    pub fn with_function_calls(mut self, calls: Vec<FunctionCall>) -> Self {
        self.function_calls = calls;
        self
    }
}

/// A chat request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Functions the model may call; empty disables function calling
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionDefinition>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            functions: Vec::new(),
        }
    }

    pub fn with_functions(mut self, functions: Vec<FunctionDefinition>) -> Self {
        self.functions = functions;
        self
    }

    /// Content of the last user message.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }
}

/// A chat response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    /// Function calls the model wants executed before it answers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub function_calls: Vec<FunctionCall>,
}

impl ChatResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            function_calls: Vec::new(),
        }
    }

    pub fn calls(calls: Vec<FunctionCall>) -> Self {
        Self {
            text: String::new(),
            function_calls: calls,
        }
    }

    pub fn wants_functions(&self) -> bool {
        !self.function_calls.is_empty()
    }
}

/// Stream of response text chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// A chat-capable model backend.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name for logs and events.
    fn name(&self) -> &str;

    /// Generate a complete response.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Generate a response as a stream of text chunks.
    async fn chat_stream(&self, _request: ChatRequest) -> Result<ChunkStream, LlmError> {
        Err(LlmError::NotSupported(format!(
            "{} does not support streaming",
            self.name()
        )))
    }
}
