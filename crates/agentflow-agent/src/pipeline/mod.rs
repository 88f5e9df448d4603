//! Message pipeline: context gathering, model call, postprocessing and speech.

pub mod orchestrator;
pub mod stage;

pub use orchestrator::{MessagePipeline, PipelineResponse, ProcessOptions};
pub use stage::PipelineStage;
