//! Engine configuration.
//!
//! Defaults live in [`defaults`], environment variable names in [`env_vars`].
//! Configuration is supplied by the host application at startup, either as a
//! TOML document or built in code, then optionally overridden from the
//! environment.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default values.
pub mod defaults {
    /// Maximum function executions in flight at once
    pub const MAX_CONCURRENT_CALLS: usize = 10;
    /// Per-call timeout
    pub const CALL_TIMEOUT_SECS: u64 = 30;
    /// Period of the stale-call sweep
    pub const SWEEP_INTERVAL_MS: u64 = 100;
    /// Upper bound for one extension's pre/postprocess step
    pub const EXTENSION_TIMEOUT_SECS: u64 = 10;
    /// Upper bound for the model call of one message
    pub const MODEL_TIMEOUT_SECS: u64 = 120;
    /// Upper bound for speech synthesis of one response
    pub const SPEECH_TIMEOUT_SECS: u64 = 30;
    /// Model round-trips allowed for function calling within one message
    pub const MAX_FUNCTION_ROUNDS: usize = 5;
    /// Separator between merged context fragments
    pub const CONTEXT_SEPARATOR: &str = "\n\n";
}

/// Environment variable names.
pub mod env_vars {
    pub const MAX_CONCURRENT_CALLS: &str = "AGENTFLOW_MAX_CONCURRENT_CALLS";
    pub const CALL_TIMEOUT_SECS: &str = "AGENTFLOW_CALL_TIMEOUT_SECS";
    pub const VALIDATE_CALLS: &str = "AGENTFLOW_VALIDATE_CALLS";
    pub const EXTENSION_TIMEOUT_SECS: &str = "AGENTFLOW_EXTENSION_TIMEOUT_SECS";
    /// Emit logs as JSON (read by the binary)
    pub const LOG_JSON: &str = "AGENTFLOW_LOG_JSON";
}

/// Function-calling engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionConfig {
    pub max_concurrent_calls: usize,
    pub call_timeout_secs: u64,
    pub sweep_interval_ms: u64,
    /// Validate calls against their schema before dispatch
    pub validate_calls: bool,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: defaults::MAX_CONCURRENT_CALLS,
            call_timeout_secs: defaults::CALL_TIMEOUT_SECS,
            sweep_interval_ms: defaults::SWEEP_INTERVAL_MS,
            validate_calls: true,
        }
    }
}

impl FunctionConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn with_max_concurrent_calls(mut self, limit: usize) -> Self {
        self.max_concurrent_calls = limit;
        self
    }

    pub fn with_call_timeout_secs(mut self, secs: u64) -> Self {
        self.call_timeout_secs = secs;
        self
    }

    pub fn without_validation(mut self) -> Self {
        self.validate_calls = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_calls == 0 {
            return Err(Error::config("functions.max_concurrent_calls must be at least 1"));
        }
        if self.call_timeout_secs == 0 {
            return Err(Error::config("functions.call_timeout_secs must be at least 1"));
        }
        if self.sweep_interval_ms == 0 {
            return Err(Error::config("functions.sweep_interval_ms must be at least 1"));
        }
        Ok(())
    }
}

/// Message pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub extension_timeout_secs: u64,
    pub model_timeout_secs: u64,
    pub speech_timeout_secs: u64,
    pub max_function_rounds: usize,
    /// Play synthesized audio as soon as it is produced
    pub auto_play_audio: bool,
    pub context_separator: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extension_timeout_secs: defaults::EXTENSION_TIMEOUT_SECS,
            model_timeout_secs: defaults::MODEL_TIMEOUT_SECS,
            speech_timeout_secs: defaults::SPEECH_TIMEOUT_SECS,
            max_function_rounds: defaults::MAX_FUNCTION_ROUNDS,
            auto_play_audio: false,
            context_separator: defaults::CONTEXT_SEPARATOR.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn extension_timeout(&self) -> Duration {
        Duration::from_secs(self.extension_timeout_secs)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn speech_timeout(&self) -> Duration {
        Duration::from_secs(self.speech_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.extension_timeout_secs == 0
            || self.model_timeout_secs == 0
            || self.speech_timeout_secs == 0
        {
            return Err(Error::config("pipeline timeouts must be at least 1 second"));
        }
        if self.max_function_rounds == 0 {
            return Err(Error::config("pipeline.max_function_rounds must be at least 1"));
        }
        Ok(())
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentFlowConfig {
    pub functions: FunctionConfig,
    pub pipeline: PipelineConfig,
}

impl AgentFlowConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by the environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override settings from environment variables that are set and parse.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse(env_vars::MAX_CONCURRENT_CALLS) {
            self.functions.max_concurrent_calls = v;
        }
        if let Some(v) = env_parse(env_vars::CALL_TIMEOUT_SECS) {
            self.functions.call_timeout_secs = v;
        }
        if let Some(v) = env_parse(env_vars::VALIDATE_CALLS) {
            self.functions.validate_calls = v;
        }
        if let Some(v) = env_parse(env_vars::EXTENSION_TIMEOUT_SECS) {
            self.pipeline.extension_timeout_secs = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.functions.validate()?;
        self.pipeline.validate()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
