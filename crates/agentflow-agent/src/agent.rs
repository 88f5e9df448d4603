//! Conversational agent.
//!
//! An [`Agent`] wraps a model provider with a system prompt, a conversation
//! history and a transient context slot that the message pipeline fills
//! before each model call. When a function engine is attached, model
//! requests for function calls are executed and fed back until the model
//! answers in text.

use agentflow_core::config::defaults;
use agentflow_core::function::FunctionResult;
use agentflow_core::llm::{ChatRequest, ChunkStream, LlmError, Message, ModelProvider};
use agentflow_functions::FunctionCallOrchestrator;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::pipeline::PipelineStage;

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent name, used in notifications and logs
    pub name: String,
    /// System prompt sent first in every request
    #[serde(default)]
    pub system_prompt: String,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: String::new(),
        }
    }
}

/// Final answer of one chat turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentReply {
    pub text: String,
    /// Results of every function the model called on the way
    pub function_results: Vec<FunctionResult>,
}

/// A conversational agent.
pub struct Agent {
    config: AgentConfig,
    provider: Arc<dyn ModelProvider>,
    functions: Option<Arc<FunctionCallOrchestrator>>,
    history: RwLock<Vec<Message>>,
    context: Mutex<Option<String>>,
    busy: AtomicBool,
    stage: Mutex<PipelineStage>,
}

impl Agent {
    pub fn new(config: AgentConfig, provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            config,
            provider,
            functions: None,
            history: RwLock::new(Vec::new()),
            context: Mutex::new(None),
            busy: AtomicBool::new(false),
            stage: Mutex::new(PipelineStage::Idle),
        }
    }

    /// Attach a function engine; its available functions are offered to the model.
    pub fn with_functions(mut self, functions: Arc<FunctionCallOrchestrator>) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    /// Context for the next model call only.
    pub fn set_context(&self, context: impl Into<String>) {
        *self.context.lock() = Some(context.into());
    }

    pub fn clear_context(&self) {
        *self.context.lock() = None;
    }

    pub fn context(&self) -> Option<String> {
        self.context.lock().clone()
    }

    /// Whether a pipeline run currently owns this agent.
    pub fn is_processing(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn stage(&self) -> PipelineStage {
        *self.stage.lock()
    }

    pub async fn history(&self) -> Vec<Message> {
        self.history.read().await.clone()
    }

    pub async fn clear_history(&self) {
        self.history.write().await.clear();
    }

    /// Claim the agent for one pipeline run. `false` if already claimed.
    pub(crate) fn try_begin(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn end(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }

    pub(crate) fn set_stage(&self, stage: PipelineStage) {
        *self.stage.lock() = stage;
    }

    /// Send a user message and return the model's final answer.
    ///
    /// Allows the default number of function rounds; the message pipeline
    /// passes its configured limit through [`Agent::chat_with_rounds`].
    pub async fn chat(&self, message: &str) -> Result<AgentReply, LlmError> {
        self.chat_with_rounds(message, defaults::MAX_FUNCTION_ROUNDS)
            .await
    }

    /// [`Agent::chat`] with an explicit function-round limit.
    ///
    /// When the limit is reached while the model still asks for functions,
    /// the text of that last response is returned as is.
    pub async fn chat_with_rounds(
        &self,
        message: &str,
        max_rounds: usize,
    ) -> Result<AgentReply, LlmError> {
        let mut messages = self.build_messages(message).await;
        let functions = match &self.functions {
            Some(engine) => engine.available_functions().await,
            None => Vec::new(),
        };

        let mut function_results = Vec::new();
        let mut round = 0;
        let text = loop {
            let request = ChatRequest::new(messages.clone()).with_functions(functions.clone());
            let response = self.provider.chat(request).await?;

            let engine = match &self.functions {
                Some(engine) if response.wants_functions() && round < max_rounds => engine,
                _ => {
                    if response.wants_functions() {
                        warn!(agent = %self.name(), rounds = round, "Function calls left unexecuted");
                    }
                    break response.text;
                }
            };

            round += 1;
            debug!(agent = %self.name(), round, calls = response.function_calls.len(), "Executing requested functions");
            messages.push(
                Message::assistant(response.text.clone())
                    .with_function_calls(response.function_calls.clone()),
            );
            let results = engine.execute_many(response.function_calls).await;
            for result in &results {
                messages.push(Message::function(&result.function_name, result.content()));
            }
            function_results.extend(results);
        };

        let mut history = self.history.write().await;
        history.push(Message::user(message));
        history.push(Message::assistant(text.clone()));

        Ok(AgentReply {
            text,
            function_results,
        })
    }

    /// Stream the model's answer. Function calling and history are not involved.
    pub async fn chat_stream(&self, message: &str) -> Result<ChunkStream, LlmError> {
        let messages = self.build_messages(message).await;
        self.provider.chat_stream(ChatRequest::new(messages)).await
    }

    async fn build_messages(&self, message: &str) -> Vec<Message> {
        let mut messages = Vec::new();
        if !self.config.system_prompt.is_empty() {
            messages.push(Message::system(self.config.system_prompt.clone()));
        }
        if let Some(context) = self.context() {
            messages.push(Message::system(context));
        }
        messages.extend(self.history.read().await.iter().cloned());
        messages.push(Message::user(message));
        messages
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.config.name)
            .field("provider", &self.provider.name())
            .field("functions", &self.functions.is_some())
            .field("stage", &self.stage())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_core::llm::{ChatResponse, MessageRole};
    use agentflow_testing::MockModelProvider;
    use futures::StreamExt;

    fn agent(provider: Arc<MockModelProvider>) -> Agent {
        let config = AgentConfig {
            system_prompt: "Be brief.".to_string(),
            ..AgentConfig::new("helper")
        };
        Agent::new(config, provider)
    }

    #[tokio::test]
    async fn test_chat_records_history() {
        let provider = Arc::new(MockModelProvider::with_texts(["Hello!"]));
        let agent = agent(provider.clone());

        let reply = agent.chat("hi").await.unwrap();
        assert_eq!(reply.text, "Hello!");

        let history = agent.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[1].content, "Hello!");

        agent.chat("again").await.unwrap();
        let request = &provider.requests()[1];
        // system prompt, previous exchange, new message
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].content, "Be brief.");
    }

    #[tokio::test]
    async fn test_context_is_sent_as_system_message() {
        let provider = Arc::new(MockModelProvider::new());
        let agent = agent(provider.clone());

        agent.set_context("User likes tea.");
        agent.chat("drink?").await.unwrap();
        let request = &provider.requests()[0];
        assert_eq!(request.messages[1].role, MessageRole::System);
        assert_eq!(request.messages[1].content, "User likes tea.");

        agent.clear_context();
        assert!(agent.context().is_none());
    }

    #[tokio::test]
    async fn test_function_calls_without_engine_are_ignored() {
        let provider = Arc::new(MockModelProvider::new());
        provider.push_response(ChatResponse {
            text: "Let me check.".to_string(),
            function_calls: vec![agentflow_core::FunctionCall::new("add", "{}")],
        });
        let agent = agent(provider.clone());

        let reply = agent.chat("sum").await.unwrap();
        assert_eq!(reply.text, "Let me check.");
        assert!(reply.function_results.is_empty());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_busy_flag() {
        let agent = agent(Arc::new(MockModelProvider::new()));
        assert!(agent.try_begin());
        assert!(!agent.try_begin());
        assert!(agent.is_processing());
        agent.end();
        assert!(!agent.is_processing());
    }

    #[tokio::test]
    async fn test_chat_stream() {
        let provider = Arc::new(MockModelProvider::with_texts(["one two three"]));
        let agent = agent(provider);

        let chunks: Vec<String> = agent
            .chat_stream("count")
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.concat(), "one two three");
        assert!(agent.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let provider = Arc::new(MockModelProvider::new());
        provider.push_error(LlmError::Network("offline".to_string()));
        let agent = agent(provider);

        let err = agent.chat("hi").await.unwrap_err();
        assert_eq!(err, LlmError::Network("offline".to_string()));
        assert!(agent.history().await.is_empty());
    }
}
