//! Scripted provider doubles.

use agentflow_core::llm::{ChatRequest, ChatResponse, ChunkStream, LlmError, ModelProvider};
use agentflow_core::speech::{AudioClip, SpeechError, SpeechProvider};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Model provider that replays queued responses.
///
/// Once the script is exhausted it echoes the last user message as
/// `Echo: <message>`.
pub struct MockModelProvider {
    name: String,
    script: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Option<Duration>,
}

impl MockModelProvider {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Respond with these texts in order.
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        for text in texts {
            provider.push_response(ChatResponse::text(text));
        }
        provider
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_response(&self, response: ChatResponse) {
        self.script.lock().push_back(Ok(response));
    }

    pub fn push_error(&self, error: LlmError) {
        self.script.lock().push_back(Err(error));
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next_response(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        match self.script.lock().pop_front() {
            Some(scripted) => scripted,
            None => Ok(ChatResponse::text(format!(
                "Echo: {}",
                request.last_user_message().unwrap_or_default()
            ))),
        }
    }
}

impl Default for MockModelProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for MockModelProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_response(&request)
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, LlmError> {
        self.requests.lock().push(request.clone());
        let response = self.next_response(&request)?;
        let chunks: Vec<Result<String, LlmError>> = response
            .text
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Speech provider that "synthesizes" the UTF-8 bytes of the text.
pub struct MockSpeechProvider {
    fail: bool,
    delay: Option<Duration>,
    synthesized: AtomicUsize,
    played: AtomicUsize,
}

impl MockSpeechProvider {
    pub fn new() -> Self {
        Self {
            fail: false,
            delay: None,
            synthesized: AtomicUsize::new(0),
            played: AtomicUsize::new(0),
        }
    }

    /// A provider whose synthesis always fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn synthesized_count(&self) -> usize {
        self.synthesized.load(Ordering::SeqCst)
    }

    pub fn played_count(&self) -> usize {
        self.played.load(Ordering::SeqCst)
    }
}

impl Default for MockSpeechProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechProvider for MockSpeechProvider {
    fn name(&self) -> &str {
        "mock-speech"
    }

    async fn generate_speech(&self, text: &str) -> Result<AudioClip, SpeechError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(SpeechError::Synthesis("voice unavailable".to_string()));
        }
        self.synthesized.fetch_add(1, Ordering::SeqCst);
        Ok(AudioClip::new(text.as_bytes().to_vec(), 16_000, "pcm16"))
    }

    async fn play(&self, _audio: &AudioClip) -> Result<(), SpeechError> {
        self.played.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
