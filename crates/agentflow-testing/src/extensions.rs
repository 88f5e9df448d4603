//! Sample extensions for exercising the registry, engine and pipeline.

use agentflow_core::extension::{
    Extension, ExtensionContext, ExtensionError, ExtensionMetadata, ExtensionResult,
    FunctionProvider, Result,
};
use agentflow_core::function::{
    format_number, Arguments, FunctionCall, FunctionDefinition, ParameterDefinition, ParameterType,
};
use async_trait::async_trait;
use semver::Version;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn metadata(name: &str) -> ExtensionMetadata {
    ExtensionMetadata::new(name, Version::new(1, 0, 0))
}

fn binary_operation(name: &str, description: &str) -> FunctionDefinition {
    FunctionDefinition::new(name, description)
        .with_parameter(ParameterDefinition::new("a", ParameterType::Number, "Left operand").required())
        .with_parameter(ParameterDefinition::new("b", ParameterType::Number, "Right operand").required())
}

// ============================================================================
// Calculator
// ============================================================================

/// Arithmetic functions: `add`, `subtract`, `multiply`, `divide`.
///
/// `divide` rejects a zero divisor through the argument hook.
pub struct CalculatorExtension {
    meta: ExtensionMetadata,
}

impl CalculatorExtension {
    pub fn new() -> Self {
        Self {
            meta: metadata("calculator").with_description("Basic arithmetic"),
        }
    }
}

impl Default for CalculatorExtension {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extension for CalculatorExtension {
    fn metadata(&self) -> &ExtensionMetadata {
        &self.meta
    }
}

#[async_trait]
impl FunctionProvider for CalculatorExtension {
    fn function_definitions(&self) -> Vec<FunctionDefinition> {
        vec![
            binary_operation("add", "Add two numbers"),
            binary_operation("subtract", "Subtract b from a"),
            binary_operation("multiply", "Multiply two numbers"),
            binary_operation("divide", "Divide a by b"),
        ]
    }

    async fn execute(&self, call: &FunctionCall) -> Result<String> {
        let args = call.args();
        let (a, b) = match (args.get_f64("a"), args.get_f64("b")) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(ExtensionError::Execution("operands must be numbers".to_string())),
        };

        let value = match call.name.as_str() {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => a / b,
            other => return Err(ExtensionError::NotSupported(other.to_string())),
        };
        Ok(format_number(value))
    }

    fn validate_arguments(&self, function: &str, args: &Arguments) -> bool {
        function != "divide" || args.get_f64("b").is_some_and(|b| b != 0.0)
    }
}

// ============================================================================
// Pipeline contributors
// ============================================================================

/// Contributes a fixed context fragment, optionally after a delay.
pub struct ContextExtension {
    meta: ExtensionMetadata,
    text: String,
    delay: Option<Duration>,
    respond: bool,
    calls: AtomicUsize,
}

impl ContextExtension {
    pub fn new(name: &str, text: impl Into<String>) -> Self {
        Self {
            meta: metadata(name),
            text: text.into(),
            delay: None,
            respond: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.meta = self.meta.with_priority(priority);
        self
    }

    /// `should_respond` answers no to every message.
    pub fn declining(mut self) -> Self {
        self.respond = false;
        self
    }

    /// How many times `preprocess` ran.
    pub fn preprocess_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extension for ContextExtension {
    fn metadata(&self) -> &ExtensionMetadata {
        &self.meta
    }

    fn should_respond(&self, _message: &str) -> bool {
        self.respond
    }

    async fn preprocess(&self, _message: &str) -> Result<Option<ExtensionContext>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Some(
            ExtensionContext::new(&self.meta.name, &self.text).with_priority(self.meta.priority),
        ))
    }
}

/// Appends a suffix to the response during postprocessing.
pub struct SuffixExtension {
    meta: ExtensionMetadata,
    suffix: String,
}

impl SuffixExtension {
    pub fn new(name: &str, suffix: impl Into<String>) -> Self {
        Self {
            meta: metadata(name),
            suffix: suffix.into(),
        }
    }
}

#[async_trait]
impl Extension for SuffixExtension {
    fn metadata(&self) -> &ExtensionMetadata {
        &self.meta
    }

    async fn postprocess(&self, text: &str) -> Result<ExtensionResult> {
        Ok(ExtensionResult::modified(
            &self.meta.name,
            text,
            format!("{}{}", text, self.suffix),
        ))
    }
}

// ============================================================================
// Misbehaving extensions
// ============================================================================

/// Fails everything it is asked to do, by error or by panic.
///
/// Exposes the function `explode`.
pub struct FailingExtension {
    meta: ExtensionMetadata,
    panics: bool,
}

impl FailingExtension {
    pub fn new(name: &str) -> Self {
        Self {
            meta: metadata(name),
            panics: false,
        }
    }

    /// Panic instead of returning an error.
    pub fn panicking(name: &str) -> Self {
        Self {
            meta: metadata(name),
            panics: true,
        }
    }

    fn fail<T>(&self, what: &str) -> Result<T> {
        if self.panics {
            panic!("{} panicked during {}", self.meta.name, what);
        }
        Err(ExtensionError::Execution(format!("{} failed", what)))
    }
}

#[async_trait]
impl Extension for FailingExtension {
    fn metadata(&self) -> &ExtensionMetadata {
        &self.meta
    }

    async fn preprocess(&self, _message: &str) -> Result<Option<ExtensionContext>> {
        self.fail("preprocess")
    }

    async fn postprocess(&self, _text: &str) -> Result<ExtensionResult> {
        self.fail("postprocess")
    }
}

#[async_trait]
impl FunctionProvider for FailingExtension {
    fn function_definitions(&self) -> Vec<FunctionDefinition> {
        vec![FunctionDefinition::new("explode", "Always fails")]
    }

    async fn execute(&self, _call: &FunctionCall) -> Result<String> {
        self.fail("execute")
    }
}

/// Never completes anything. Exposes the function `stall`.
pub struct StallingExtension {
    meta: ExtensionMetadata,
}

impl StallingExtension {
    pub fn new(name: &str) -> Self {
        Self { meta: metadata(name) }
    }
}

#[async_trait]
impl Extension for StallingExtension {
    fn metadata(&self) -> &ExtensionMetadata {
        &self.meta
    }

    async fn preprocess(&self, _message: &str) -> Result<Option<ExtensionContext>> {
        futures::future::pending().await
    }

    async fn postprocess(&self, _text: &str) -> Result<ExtensionResult> {
        futures::future::pending().await
    }
}

#[async_trait]
impl FunctionProvider for StallingExtension {
    fn function_definitions(&self) -> Vec<FunctionDefinition> {
        vec![FunctionDefinition::new("stall", "Never returns")]
    }

    async fn execute(&self, _call: &FunctionCall) -> Result<String> {
        futures::future::pending().await
    }
}

/// Exposes `slow`, which sleeps for a fixed duration and records how many
/// executions overlapped.
pub struct SlowExtension {
    meta: ExtensionMetadata,
    duration: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    completed: AtomicUsize,
}

impl SlowExtension {
    pub fn new(name: &str, duration: Duration) -> Self {
        Self {
            meta: metadata(name),
            duration,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    /// Highest number of simultaneous executions observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extension for SlowExtension {
    fn metadata(&self) -> &ExtensionMetadata {
        &self.meta
    }
}

#[async_trait]
impl FunctionProvider for SlowExtension {
    fn function_definitions(&self) -> Vec<FunctionDefinition> {
        vec![FunctionDefinition::new("slow", "Sleeps before answering")
            .with_parameter(ParameterDefinition::new("tag", ParameterType::String, "Echoed back"))]
    }

    async fn execute(&self, call: &FunctionCall) -> Result<String> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.duration).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(call.args().get_str("tag").unwrap_or("done").to_string())
    }
}
