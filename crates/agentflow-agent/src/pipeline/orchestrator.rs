//! Message pipeline orchestrator.
//!
//! Drives one user message through an agent:
//!
//! ```text
//! Idle → Preprocessing → ModelInvocation → Postprocessing
//!      → SpeechSynthesis (optional) → Finalizing → Idle
//! ```
//!
//! Extension failures degrade the result instead of aborting it; only a
//! failed or empty model response aborts the run. Every exit path, including
//! errors and panics, releases the agent and returns it to `Idle`.

use agentflow_core::config::PipelineConfig;
use agentflow_core::event::{AgentFlowEvent, EventMetadata};
use agentflow_core::eventbus::EventBus;
use agentflow_core::extension::{
    DynExtension, ExtensionContext, ExtensionError, ExtensionRegistry, ExtensionResult,
};
use agentflow_core::function::FunctionResult;
use agentflow_core::llm::LlmError;
use agentflow_core::speech::{AudioClip, SpeechProvider};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::agent::Agent;
use crate::error::{PipelineError, Result};
use crate::pipeline::PipelineStage;

/// Per-message options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// Synthesize audio for the final text when a speech provider is set
    #[serde(default)]
    pub synthesize_speech: bool,
}

impl ProcessOptions {
    pub fn with_speech() -> Self {
        Self {
            synthesize_speech: true,
        }
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResponse {
    /// Final text after postprocessing
    pub text: String,
    pub audio: Option<AudioClip>,
    /// Context fragments that were merged, in pipeline order
    pub contexts: Vec<ExtensionContext>,
    /// Postprocessing steps that changed the text
    pub modifications: Vec<ExtensionResult>,
    /// Functions the model called while answering
    pub function_results: Vec<FunctionResult>,
    pub duration_ms: u64,
}

/// Runs messages through extensions, the model and optional speech.
pub struct MessagePipeline {
    registry: Arc<ExtensionRegistry>,
    event_bus: EventBus,
    config: PipelineConfig,
    speech: Option<Arc<dyn SpeechProvider>>,
}

impl MessagePipeline {
    pub fn new(registry: Arc<ExtensionRegistry>, event_bus: EventBus, config: PipelineConfig) -> Self {
        Self {
            registry,
            event_bus,
            config,
            speech: None,
        }
    }

    pub fn with_speech(mut self, provider: Arc<dyn SpeechProvider>) -> Self {
        self.speech = Some(provider);
        self
    }

    pub fn has_speech(&self) -> bool {
        self.speech.is_some()
    }

    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one message for `agent`.
    ///
    /// Fails with [`PipelineError::AlreadyProcessing`] if the agent is busy;
    /// requests are never queued.
    pub async fn process(
        &self,
        agent: &Agent,
        message: &str,
        options: ProcessOptions,
    ) -> Result<PipelineResponse> {
        if !agent.try_begin() {
            debug!(agent = %agent.name(), "Message rejected, agent busy");
            return Err(PipelineError::AlreadyProcessing(agent.name().to_string()));
        }

        let _release = scopeguard::guard((), |_| {
            agent.clear_context();
            agent.set_stage(PipelineStage::Idle);
            agent.end();
            self.notify_stage(agent, PipelineStage::Idle);
        });

        let started = Instant::now();
        let extensions = self.registry.pipeline_extensions().await;

        // Preprocessing
        self.enter(agent, PipelineStage::Preprocessing);
        let contexts = self.preprocess(agent, &extensions, message).await;
        if !contexts.is_empty() {
            let combined = contexts
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(&self.config.context_separator);
            agent.set_context(combined);
        }

        // Model invocation
        self.enter(agent, PipelineStage::ModelInvocation);
        let reply = match self.invoke_model(agent, message).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(agent = %agent.name(), error = %e, "Model invocation failed");
                self.event_bus.send(
                    AgentFlowEvent::error(self.source(agent), e.to_string()),
                    EventMetadata::new(self.source(agent)),
                );
                return Err(e);
            }
        };

        // Postprocessing
        self.enter(agent, PipelineStage::Postprocessing);
        let (text, modifications) = self.postprocess(agent, &extensions, reply.text).await;

        // Speech
        let audio = if options.synthesize_speech {
            match &self.speech {
                Some(speech) => {
                    self.enter(agent, PipelineStage::SpeechSynthesis);
                    self.synthesize(agent, speech.as_ref(), &text).await
                }
                None => {
                    debug!(agent = %agent.name(), "Speech requested but no provider configured");
                    None
                }
            }
        } else {
            None
        };

        // Finalizing
        self.enter(agent, PipelineStage::Finalizing);
        agent.clear_context();
        self.event_bus.send(
            AgentFlowEvent::AgentResponseReady {
                agent: agent.name().to_string(),
                text: text.clone(),
                has_audio: audio.is_some(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
            EventMetadata::new(self.source(agent)),
        );

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            agent = %agent.name(),
            contexts = contexts.len(),
            modifications = modifications.len(),
            functions = reply.function_results.len(),
            duration_ms,
            "Message processed"
        );

        Ok(PipelineResponse {
            text,
            audio,
            contexts,
            modifications,
            function_results: reply.function_results,
            duration_ms,
        })
    }

    /// Ask each extension for context, one after another.
    async fn preprocess(
        &self,
        agent: &Agent,
        extensions: &[DynExtension],
        message: &str,
    ) -> Vec<ExtensionContext> {
        let mut contexts = Vec::new();
        for extension in extensions {
            let name = extension.metadata().name.as_str();

            let responds = std::panic::catch_unwind(AssertUnwindSafe(|| {
                extension.should_respond(message)
            }))
            .unwrap_or_else(|_| {
                warn!(agent = %agent.name(), extension = %name, "should_respond panicked");
                false
            });
            if !responds {
                continue;
            }

            match self.bounded(extension.preprocess(message)).await {
                Ok(Some(context)) if !context.is_empty() => contexts.push(context),
                Ok(_) => {}
                Err(e) => {
                    warn!(agent = %agent.name(), extension = %name, error = %e, "Preprocessing failed");
                }
            }
        }
        contexts
    }

    async fn invoke_model(&self, agent: &Agent, message: &str) -> Result<crate::agent::AgentReply> {
        let timeout = self.config.model_timeout();
        let reply = tokio::time::timeout(
            timeout,
            agent.chat_with_rounds(message, self.config.max_function_rounds),
        )
        .await
        .map_err(|_| LlmError::Timeout(timeout.as_secs()))??;

        if reply.text.trim().is_empty() {
            return Err(PipelineError::EmptyResponse);
        }
        Ok(reply)
    }

    /// Thread the text through each extension in order.
    async fn postprocess(
        &self,
        agent: &Agent,
        extensions: &[DynExtension],
        mut text: String,
    ) -> (String, Vec<ExtensionResult>) {
        let mut modifications = Vec::new();
        for extension in extensions {
            let name = extension.metadata().name.as_str();
            match self.bounded(extension.postprocess(&text)).await {
                Ok(result) => {
                    if result.changed() {
                        text = result.modified.clone();
                        modifications.push(result);
                    }
                }
                Err(e) => {
                    warn!(agent = %agent.name(), extension = %name, error = %e, "Postprocessing failed, text unchanged");
                }
            }
        }
        (text, modifications)
    }

    async fn synthesize(
        &self,
        agent: &Agent,
        speech: &dyn SpeechProvider,
        text: &str,
    ) -> Option<AudioClip> {
        let timeout = self.config.speech_timeout();
        let clip = match tokio::time::timeout(timeout, speech.generate_speech(text)).await {
            Ok(Ok(clip)) => clip,
            Ok(Err(e)) => {
                warn!(agent = %agent.name(), provider = %speech.name(), error = %e, "Speech synthesis failed");
                return None;
            }
            Err(_) => {
                warn!(agent = %agent.name(), provider = %speech.name(), timeout_secs = timeout.as_secs(), "Speech synthesis timed out");
                return None;
            }
        };

        if self.config.auto_play_audio {
            match tokio::time::timeout(timeout, speech.play(&clip)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(agent = %agent.name(), error = %e, "Playback failed"),
                Err(_) => warn!(agent = %agent.name(), "Playback timed out"),
            }
        }
        Some(clip)
    }

    /// Run an extension step under the extension timeout, isolating panics.
    async fn bounded<F, T>(&self, step: F) -> std::result::Result<T, ExtensionError>
    where
        F: Future<Output = std::result::Result<T, ExtensionError>>,
    {
        bounded_step(self.config.extension_timeout(), step).await
    }

    fn enter(&self, agent: &Agent, stage: PipelineStage) {
        agent.set_stage(stage);
        self.notify_stage(agent, stage);
    }

    fn notify_stage(&self, agent: &Agent, stage: PipelineStage) {
        self.event_bus.send(
            AgentFlowEvent::PipelineStageChanged {
                agent: agent.name().to_string(),
                stage: stage.to_string(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
            EventMetadata::new(self.source(agent)),
        );
    }

    fn source(&self, agent: &Agent) -> String {
        format!("pipeline:{}", agent.name())
    }
}

async fn bounded_step<F, T>(timeout: Duration, step: F) -> std::result::Result<T, ExtensionError>
where
    F: Future<Output = std::result::Result<T, ExtensionError>>,
{
    match tokio::time::timeout(timeout, AssertUnwindSafe(step).catch_unwind()).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => Err(ExtensionError::Execution("extension panicked".to_string())),
        Err(_) => Err(ExtensionError::Timeout),
    }
}
