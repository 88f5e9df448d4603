//! Extension capability interfaces.
//!
//! An extension is a pluggable unit that can contribute context before a model
//! call (preprocessing), transform the model's answer (postprocessing), and
//! optionally expose callable functions. The function-calling facet is a
//! separate trait, [`FunctionProvider`], attached once at registration time
//! through [`ExtensionHandle::with_functions`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::function::{Arguments, FunctionCall, FunctionDefinition};

// ============================================================================
// Errors
// ============================================================================

/// Extension registry and runtime errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtensionError {
    #[error("Extension already registered: {0}")]
    DuplicateExtension(String),

    #[error("Function '{function}' is already provided by extension '{owner}'")]
    DuplicateFunction { function: String, owner: String },

    #[error("Extension not found: {0}")]
    NotFound(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Operation timed out")]
    Timeout,
}

/// Result type for extension operations.
pub type Result<T> = std::result::Result<T, ExtensionError>;

// ============================================================================
// Metadata
// ============================================================================

/// Extension identity and scheduling attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionMetadata {
    /// Unique extension name
    pub name: String,
    /// Extension version
    pub version: semver::Version,
    #[serde(default)]
    pub description: String,
    /// Lower runs earlier in the pipeline
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ExtensionMetadata {
    pub fn new(name: impl Into<String>, version: semver::Version) -> Self {
        Self {
            name: name.into(),
            version,
            description: String::new(),
            priority: 0,
            enabled: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// ============================================================================
// Pipeline data
// ============================================================================

/// A fragment of context contributed by one extension during preprocessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionContext {
    pub extension: String,
    pub text: String,
    #[serde(default)]
    pub priority: i32,
}

impl ExtensionContext {
    pub fn new(extension: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            text: text.into(),
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A before/after text transform produced during postprocessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionResult {
    pub extension: String,
    pub original: String,
    pub modified: String,
}

impl ExtensionResult {
    pub fn unchanged(extension: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            extension: extension.into(),
            original: text.clone(),
            modified: text,
        }
    }

    pub fn modified(
        extension: impl Into<String>,
        original: impl Into<String>,
        modified: impl Into<String>,
    ) -> Self {
        Self {
            extension: extension.into(),
            original: original.into(),
            modified: modified.into(),
        }
    }

    pub fn changed(&self) -> bool {
        self.original != self.modified
    }
}

// ============================================================================
// Capability traits
// ============================================================================

/// Pre/postprocessing capability shared by every extension.
#[async_trait]
pub trait Extension: Send + Sync {
    fn metadata(&self) -> &ExtensionMetadata;

    /// Cheap synchronous check run before [`Extension::preprocess`].
    fn should_respond(&self, _message: &str) -> bool {
        true
    }

    /// Produce context for the model. `None` contributes nothing.
    async fn preprocess(&self, _message: &str) -> Result<Option<ExtensionContext>> {
        Ok(None)
    }

    /// Transform the current response text.
    async fn postprocess(&self, text: &str) -> Result<ExtensionResult> {
        Ok(ExtensionResult::unchanged(&self.metadata().name, text))
    }
}

/// Function-calling capability.
#[async_trait]
pub trait FunctionProvider: Send + Sync {
    /// Functions this extension exposes. Read once at registration.
    fn function_definitions(&self) -> Vec<FunctionDefinition>;

    /// Run a validated call and return its payload.
    async fn execute(&self, call: &FunctionCall) -> Result<String>;

    /// Extension-specific argument check run after schema validation.
    fn validate_arguments(&self, _function: &str, _args: &Arguments) -> bool {
        true
    }
}

pub type DynExtension = Arc<dyn Extension>;
pub type DynFunctionProvider = Arc<dyn FunctionProvider>;

/// An extension together with its optional function-provider facet.
#[derive(Clone)]
pub struct ExtensionHandle {
    pub extension: DynExtension,
    pub functions: Option<DynFunctionProvider>,
}

impl ExtensionHandle {
    /// An extension without callable functions.
    pub fn new<E: Extension + 'static>(extension: E) -> Self {
        Self {
            extension: Arc::new(extension),
            functions: None,
        }
    }

    /// An extension that also exposes functions.
    pub fn with_functions<E>(extension: E) -> Self
    where
        E: Extension + FunctionProvider + 'static,
    {
        Self::from_shared(Arc::new(extension))
    }

    /// Same as [`ExtensionHandle::with_functions`] for an already shared value.
    pub fn from_shared<E>(extension: Arc<E>) -> Self
    where
        E: Extension + FunctionProvider + 'static,
    {
        Self {
            extension: extension.clone(),
            functions: Some(extension),
        }
    }

    pub fn name(&self) -> &str {
        &self.extension.metadata().name
    }
}

impl std::fmt::Debug for ExtensionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionHandle")
            .field("name", &self.name())
            .field("functions", &self.functions.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain {
        meta: ExtensionMetadata,
    }

    #[async_trait]
    impl Extension for Plain {
        fn metadata(&self) -> &ExtensionMetadata {
            &self.meta
        }
    }

    #[tokio::test]
    async fn test_default_postprocess_is_identity() {
        let ext = Plain {
            meta: ExtensionMetadata::new("plain", semver::Version::new(1, 0, 0)),
        };
        let result = ext.postprocess("hello").await.unwrap();
        assert!(!result.changed());
        assert_eq!(result.modified, "hello");
        assert!(ext.preprocess("hi").await.unwrap().is_none());
    }

    #[test]
    fn test_handle_without_functions() {
        let handle = ExtensionHandle::new(Plain {
            meta: ExtensionMetadata::new("plain", semver::Version::new(0, 1, 0)),
        });
        assert_eq!(handle.name(), "plain");
        assert!(handle.functions.is_none());
    }

    #[test]
    fn test_metadata_deserialize_defaults() {
        let meta: ExtensionMetadata =
            serde_json::from_str(r#"{"name":"weather","version":"1.2.0"}"#).unwrap();
        assert!(meta.enabled);
        assert_eq!(meta.priority, 0);
        assert_eq!(meta.version, semver::Version::new(1, 2, 0));
    }
}
