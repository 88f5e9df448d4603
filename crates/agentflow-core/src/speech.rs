//! Speech synthesis boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Speech provider errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Provider {0} not available")]
    Unavailable(String),
}

/// Encoded or raw audio produced by a speech provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    /// Audio bytes in `format`
    pub data: Vec<u8>,
    pub sample_rate: u32,
    /// e.g. "wav", "pcm16", "mp3"
    pub format: String,
}

impl AudioClip {
    pub fn new(data: Vec<u8>, sample_rate: u32, format: impl Into<String>) -> Self {
        Self {
            data,
            sample_rate,
            format: format.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate_speech(&self, text: &str) -> Result<AudioClip, SpeechError>;

    /// Play a clip on the host's output device. No-op by default.
    async fn play(&self, _audio: &AudioClip) -> Result<(), SpeechError> {
        Ok(())
    }
}
