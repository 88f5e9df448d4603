//! AgentFlow conversational side.
//!
//! An [`Agent`] wraps a model provider and, optionally, the function engine.
//! The [`MessagePipeline`] runs a message through registered extensions,
//! the agent and an optional speech provider.
//!
//! ```rust,ignore
//! let agent = Agent::new(AgentConfig::new("assistant"), provider).with_functions(engine);
//! let pipeline = MessagePipeline::new(registry, event_bus, config.pipeline);
//!
//! let response = pipeline.process(&agent, "What is 5 + 3?", ProcessOptions::default()).await?;
//! println!("{}", response.text);
//! ```

pub mod agent;
pub mod error;
pub mod pipeline;

pub use agent::{Agent, AgentConfig, AgentReply};
pub use error::{AgentFlowError, PipelineError, Result};
pub use pipeline::{MessagePipeline, PipelineResponse, PipelineStage, ProcessOptions};
