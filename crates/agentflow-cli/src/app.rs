//! Wiring of the demo application.

use agentflow_agent::{Agent, AgentConfig, MessagePipeline, PipelineResponse, ProcessOptions};
use agentflow_core::config::AgentFlowConfig;
use agentflow_core::eventbus::EventBus;
use agentflow_core::extension::{ExtensionHandle, ExtensionRegistry};
use agentflow_core::function::{FunctionCall, FunctionDefinition, FunctionResult};
use agentflow_functions::{FunctionCallOrchestrator, FunctionStatistics};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::demo::{ArithmeticExtension, ClockExtension, OfflineModel, TextSpeech};

/// Load configuration from `path` (defaults when absent) and apply
/// environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AgentFlowConfig> {
    let mut config = match path {
        Some(path) => AgentFlowConfig::from_file(path)?,
        None => AgentFlowConfig::default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Registry, function engine, agent and pipeline, wired together.
pub struct App {
    engine: Arc<FunctionCallOrchestrator>,
    pipeline: MessagePipeline,
    agent: Agent,
}

impl App {
    /// Build the application with the offline demo extensions.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn new(config: AgentFlowConfig) -> Result<Self> {
        let registry = Arc::new(ExtensionRegistry::new());
        registry
            .register(ExtensionHandle::with_functions(ClockExtension::new()))
            .await?;
        registry
            .register(ExtensionHandle::with_functions(ArithmeticExtension::new()))
            .await?;

        let event_bus = EventBus::new();
        let engine = Arc::new(FunctionCallOrchestrator::new(
            registry.clone(),
            config.functions.clone(),
            event_bus.clone(),
        )?);
        engine.spawn_sweeper();

        let agent_config = AgentConfig {
            system_prompt: "You are a helpful assistant.".to_string(),
            ..AgentConfig::new("assistant")
        };
        let agent = Agent::new(agent_config, Arc::new(OfflineModel)).with_functions(engine.clone());
        let pipeline =
            MessagePipeline::new(registry, event_bus, config.pipeline).with_speech(Arc::new(TextSpeech));

        info!(
            extensions = engine.registry().len().await,
            functions = engine.registry().function_count().await,
            "AgentFlow ready"
        );
        Ok(Self {
            engine,
            pipeline,
            agent,
        })
    }

    pub async fn functions(&self) -> Vec<FunctionDefinition> {
        self.engine.available_functions().await
    }

    pub async fn call(&self, name: &str, arguments: &str) -> FunctionResult {
        self.engine
            .execute_one(FunctionCall::new(name, arguments))
            .await
    }

    pub async fn chat(&self, message: &str, speech: bool) -> Result<PipelineResponse> {
        let options = ProcessOptions {
            synthesize_speech: speech,
        };
        Ok(self.pipeline.process(&self.agent, message, options).await?)
    }

    pub async fn statistics(&self) -> FunctionStatistics {
        self.engine.statistics().await
    }

    pub fn engine(&self) -> &FunctionCallOrchestrator {
        &self.engine
    }

    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}
