//! Pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a message currently is in the pipeline.
///
/// Stages advance strictly in declaration order and return to `Idle` when
/// the message is finished or abandoned. `SpeechSynthesis` is skipped when
/// no audio was requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    Idle,
    Preprocessing,
    ModelInvocation,
    Postprocessing,
    SpeechSynthesis,
    Finalizing,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preprocessing => "preprocessing",
            Self::ModelInvocation => "model_invocation",
            Self::Postprocessing => "postprocessing",
            Self::SpeechSynthesis => "speech_synthesis",
            Self::Finalizing => "finalizing",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
