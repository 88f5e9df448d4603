//! Offline stand-ins so the CLI runs without any external service.

use agentflow_core::extension::{
    Extension, ExtensionContext, ExtensionError, ExtensionMetadata, FunctionProvider, Result,
};
use agentflow_core::function::{
    format_number, Arguments, FunctionCall, FunctionDefinition, ParameterDefinition, ParameterType,
};
use agentflow_core::llm::{ChatRequest, ChatResponse, LlmError, MessageRole, ModelProvider};
use agentflow_core::speech::{AudioClip, SpeechError, SpeechProvider};
use async_trait::async_trait;
use semver::Version;
use serde_json::json;

// ============================================================================
// Arithmetic
// ============================================================================

/// Exposes `calculate(op, a, b)`.
pub struct ArithmeticExtension {
    meta: ExtensionMetadata,
}

impl ArithmeticExtension {
    pub fn new() -> Self {
        Self {
            meta: ExtensionMetadata::new("arithmetic", Version::new(0, 1, 0))
                .with_description("Four-function arithmetic"),
        }
    }
}

impl Default for ArithmeticExtension {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extension for ArithmeticExtension {
    fn metadata(&self) -> &ExtensionMetadata {
        &self.meta
    }
}

#[async_trait]
impl FunctionProvider for ArithmeticExtension {
    fn function_definitions(&self) -> Vec<FunctionDefinition> {
        vec![FunctionDefinition::new("calculate", "Apply an arithmetic operator to two numbers")
            .with_parameter(
                ParameterDefinition::new("op", ParameterType::String, "Operator")
                    .required()
                    .with_enum(["add", "subtract", "multiply", "divide"]),
            )
            .with_parameter(ParameterDefinition::new("a", ParameterType::Number, "Left operand").required())
            .with_parameter(ParameterDefinition::new("b", ParameterType::Number, "Right operand").required())]
    }

    async fn execute(&self, call: &FunctionCall) -> Result<String> {
        let args = call.args();
        let (Some(a), Some(b)) = (args.get_f64("a"), args.get_f64("b")) else {
            return Err(ExtensionError::Execution("operands must be numbers".to_string()));
        };
        let value = match args.get_str("op") {
            Some("add") => a + b,
            Some("subtract") => a - b,
            Some("multiply") => a * b,
            Some("divide") => a / b,
            other => {
                return Err(ExtensionError::Execution(format!(
                    "unknown operator: {}",
                    other.unwrap_or("<none>")
                )))
            }
        };
        Ok(format_number(value))
    }

    fn validate_arguments(&self, _function: &str, args: &Arguments) -> bool {
        args.get_str("op") != Some("divide") || args.get_f64("b").is_some_and(|b| b != 0.0)
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Adds the current UTC time to the model's context and exposes `current_time`.
pub struct ClockExtension {
    meta: ExtensionMetadata,
}

impl ClockExtension {
    pub fn new() -> Self {
        Self {
            meta: ExtensionMetadata::new("clock", Version::new(0, 1, 0))
                .with_description("Current time")
                .with_priority(-10),
        }
    }
}

impl Default for ClockExtension {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extension for ClockExtension {
    fn metadata(&self) -> &ExtensionMetadata {
        &self.meta
    }

    fn should_respond(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        message.contains("time") || message.contains("date")
    }

    async fn preprocess(&self, _message: &str) -> Result<Option<ExtensionContext>> {
        Ok(Some(ExtensionContext::new(
            &self.meta.name,
            format!("Current time: {}", chrono::Utc::now().to_rfc3339()),
        )))
    }
}

#[async_trait]
impl FunctionProvider for ClockExtension {
    fn function_definitions(&self) -> Vec<FunctionDefinition> {
        vec![FunctionDefinition::new("current_time", "Current UTC time").with_parameter(
            ParameterDefinition::new("format", ParameterType::String, "Output format")
                .with_enum(["rfc3339", "unix"])
                .with_default("rfc3339"),
        )]
    }

    async fn execute(&self, call: &FunctionCall) -> Result<String> {
        let now = chrono::Utc::now();
        Ok(match call.args().get_str("format") {
            Some("unix") => now.timestamp().to_string(),
            _ => now.to_rfc3339(),
        })
    }
}

// ============================================================================
// Model
// ============================================================================

/// Rule-based model.
///
/// Asks for `calculate` when the message looks like `<a> <op> <b>`, for
/// `current_time` when it mentions the time, reports function results back
/// and echoes anything else.
pub struct OfflineModel;

impl OfflineModel {
    fn arithmetic(message: &str) -> Option<serde_json::Value> {
        let tokens: Vec<&str> = message
            .trim_end_matches(['?', '.', '!'])
            .split_whitespace()
            .collect();
        let window = tokens.windows(3).find_map(|w| {
            let a: f64 = w[0].parse().ok()?;
            let b: f64 = w[2].parse().ok()?;
            let op = match w[1] {
                "+" => "add",
                "-" => "subtract",
                "*" | "x" => "multiply",
                "/" => "divide",
                _ => return None,
            };
            Some((op, a, b))
        })?;
        let (op, a, b) = window;
        Some(json!({ "op": op, "a": a, "b": b }))
    }
}

#[async_trait]
impl ModelProvider for OfflineModel {
    fn name(&self) -> &str {
        "offline"
    }

    async fn chat(&self, request: ChatRequest) -> std::result::Result<ChatResponse, LlmError> {
        let last = request
            .messages
            .last()
            .ok_or_else(|| LlmError::InvalidInput("empty conversation".to_string()))?;

        if last.role == MessageRole::Function {
            let results: Vec<&str> = request
                .messages
                .iter()
                .rev()
                .take_while(|m| m.role == MessageRole::Function)
                .map(|m| m.content.as_str())
                .collect();
            return Ok(ChatResponse::text(format!("Result: {}", results.join(", "))));
        }

        let message = request.last_user_message().unwrap_or_default();
        let offers = |name: &str| request.functions.iter().any(|f| f.name == name);

        if offers("calculate") {
            if let Some(args) = Self::arithmetic(message) {
                return Ok(ChatResponse::calls(vec![FunctionCall::from_json("calculate", &args)]));
            }
        }
        if offers("current_time") && message.to_lowercase().contains("time") {
            return Ok(ChatResponse::calls(vec![FunctionCall::new("current_time", "")]));
        }
        Ok(ChatResponse::text(format!("Echo: {}", message)))
    }
}

// ============================================================================
// Speech
// ============================================================================

/// "Synthesizes" the text as UTF-8 bytes and never plays anything.
pub struct TextSpeech;

#[async_trait]
impl SpeechProvider for TextSpeech {
    fn name(&self) -> &str {
        "text"
    }

    async fn generate_speech(&self, text: &str) -> std::result::Result<AudioClip, SpeechError> {
        if text.is_empty() {
            return Err(SpeechError::Synthesis("nothing to say".to_string()));
        }
        Ok(AudioClip::new(text.as_bytes().to_vec(), 0, "utf8"))
    }
}
