//! Extension registry.
//!
//! The registry owns every registered extension and indexes the functions
//! each one reports, so a function name resolves to exactly one owner.
//! Everything handed out is a snapshot; callers never see live state.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::system::{
    DynExtension, DynFunctionProvider, ExtensionError, ExtensionHandle, ExtensionMetadata, Result,
};
use crate::function::FunctionDefinition;

/// Information about a registered extension.
#[derive(Debug, Clone)]
pub struct ExtensionInfo {
    /// Extension metadata, including the current enabled flag
    pub metadata: ExtensionMetadata,
    /// Names of the functions this extension provides
    pub functions: Vec<String>,
    /// When the extension was registered
    pub registered_at: chrono::DateTime<chrono::Utc>,
}

/// The extension responsible for a function.
#[derive(Clone)]
pub struct FunctionOwner {
    pub extension: String,
    pub provider: DynFunctionProvider,
    pub definition: FunctionDefinition,
}

impl std::fmt::Debug for FunctionOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionOwner")
            .field("extension", &self.extension)
            .field("function", &self.definition.name)
            .finish()
    }
}

struct RegisteredExtension {
    handle: ExtensionHandle,
    metadata: ExtensionMetadata,
    functions: Vec<String>,
    registered_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Default)]
struct RegistryState {
    extensions: HashMap<String, RegisteredExtension>,
    /// Extension names in registration order
    order: Vec<String>,
    /// Function name -> definition (with `extension` filled in)
    functions: HashMap<String, FunctionDefinition>,
}

impl RegistryState {
    /// Registration order, then stable-sorted by ascending priority.
    fn ordered(&self) -> Vec<&RegisteredExtension> {
        let mut entries: Vec<&RegisteredExtension> = self
            .order
            .iter()
            .filter_map(|name| self.extensions.get(name))
            .collect();
        entries.sort_by_key(|e| e.metadata.priority);
        entries
    }
}

/// Registry for managing extensions and their functions.
pub struct ExtensionRegistry {
    state: RwLock<RegistryState>,
}

impl ExtensionRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Register an extension and index its functions.
    ///
    /// Fails without side effects if the extension name is taken or any of
    /// its function names is already provided by another extension.
    pub async fn register(&self, handle: ExtensionHandle) -> Result<()> {
        let metadata = handle.extension.metadata().clone();
        let name = metadata.name.clone();

        let definitions: Vec<FunctionDefinition> = handle
            .functions
            .as_ref()
            .map(|provider| provider.function_definitions())
            .unwrap_or_default()
            .into_iter()
            .map(|mut def| {
                def.extension = name.clone();
                def
            })
            .collect();

        let mut state = self.state.write().await;

        if state.extensions.contains_key(&name) {
            return Err(ExtensionError::DuplicateExtension(name));
        }

        let mut function_names: Vec<String> = Vec::with_capacity(definitions.len());
        for def in &definitions {
            if let Some(existing) = state.functions.get(&def.name) {
                return Err(ExtensionError::DuplicateFunction {
                    function: def.name.clone(),
                    owner: existing.extension.clone(),
                });
            }
            if function_names.contains(&def.name) {
                return Err(ExtensionError::DuplicateFunction {
                    function: def.name.clone(),
                    owner: name,
                });
            }
            function_names.push(def.name.clone());
        }

        for def in definitions {
            state.functions.insert(def.name.clone(), def);
        }
        state.order.push(name.clone());
        state.extensions.insert(
            name.clone(),
            RegisteredExtension {
                handle,
                metadata,
                functions: function_names.clone(),
                registered_at: chrono::Utc::now(),
            },
        );

        info!(extension = %name, functions = function_names.len(), "Extension registered");
        Ok(())
    }

    /// Remove an extension and all of its functions.
    ///
    /// Returns `false` (and logs a warning) if no such extension exists.
    pub async fn unregister(&self, name: &str) -> bool {
        let mut state = self.state.write().await;

        let Some(removed) = state.extensions.remove(name) else {
            warn!(extension = %name, "Unregister requested for unknown extension");
            return false;
        };

        for function in &removed.functions {
            state.functions.remove(function);
        }
        state.order.retain(|n| n != name);

        info!(extension = %name, functions = removed.functions.len(), "Extension unregistered");
        true
    }

    /// Resolve the extension responsible for a function.
    ///
    /// Disabled extensions and extensions without a function facet own nothing.
    pub async fn find_owner(&self, function: &str) -> Option<FunctionOwner> {
        let state = self.state.read().await;
        let definition = state.functions.get(function)?;
        let entry = state.extensions.get(&definition.extension)?;

        if !entry.metadata.enabled {
            debug!(function = %function, extension = %definition.extension, "Owner is disabled");
            return None;
        }

        let provider = entry.handle.functions.clone()?;
        Some(FunctionOwner {
            extension: definition.extension.clone(),
            provider,
            definition: definition.clone(),
        })
    }

    /// Schema of a registered function.
    pub async fn definition(&self, function: &str) -> Option<FunctionDefinition> {
        self.state.read().await.functions.get(function).cloned()
    }

    /// Snapshot of all registered functions, grouped in pipeline order.
    pub async fn list_functions(&self) -> Vec<FunctionDefinition> {
        let state = self.state.read().await;
        state
            .ordered()
            .into_iter()
            .flat_map(|entry| entry.functions.iter())
            .filter_map(|name| state.functions.get(name).cloned())
            .collect()
    }

    /// Snapshot of the functions of one extension. Empty if unknown.
    pub async fn list_functions_for(&self, extension: &str) -> Vec<FunctionDefinition> {
        let state = self.state.read().await;
        state
            .extensions
            .get(extension)
            .map(|entry| {
                entry
                    .functions
                    .iter()
                    .filter_map(|name| state.functions.get(name).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Functions of enabled extensions only, for handing to a model.
    pub async fn available_functions(&self) -> Vec<FunctionDefinition> {
        let state = self.state.read().await;
        state
            .ordered()
            .into_iter()
            .filter(|entry| entry.metadata.enabled && entry.handle.functions.is_some())
            .flat_map(|entry| entry.functions.iter())
            .filter_map(|name| state.functions.get(name).cloned())
            .collect()
    }

    /// Get an extension by name.
    pub async fn get(&self, name: &str) -> Option<DynExtension> {
        self.state
            .read()
            .await
            .extensions
            .get(name)
            .map(|entry| entry.handle.extension.clone())
    }

    /// Get extension info by name.
    pub async fn get_info(&self, name: &str) -> Option<ExtensionInfo> {
        self.state.read().await.extensions.get(name).map(info_of)
    }

    /// Info for every extension, in pipeline order.
    pub async fn list(&self) -> Vec<ExtensionInfo> {
        self.state
            .read()
            .await
            .ordered()
            .into_iter()
            .map(info_of)
            .collect()
    }

    /// Metadata of every extension, in pipeline order.
    pub async fn descriptors(&self) -> Vec<ExtensionMetadata> {
        self.state
            .read()
            .await
            .ordered()
            .into_iter()
            .map(|entry| entry.metadata.clone())
            .collect()
    }

    /// Enabled extensions in pipeline order: ascending priority, then
    /// registration order.
    pub async fn pipeline_extensions(&self) -> Vec<DynExtension> {
        self.state
            .read()
            .await
            .ordered()
            .into_iter()
            .filter(|entry| entry.metadata.enabled)
            .map(|entry| entry.handle.extension.clone())
            .collect()
    }

    /// Enable or disable an extension.
    pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut state = self.state.write().await;
        let entry = state
            .extensions
            .get_mut(name)
            .ok_or_else(|| ExtensionError::NotFound(name.to_string()))?;
        entry.metadata.enabled = enabled;
        debug!(extension = %name, enabled, "Extension enabled flag changed");
        Ok(())
    }

    /// Number of registered functions.
    pub async fn function_count(&self) -> usize {
        self.state.read().await.functions.len()
    }

    /// Number of enabled extensions.
    pub async fn active_extension_count(&self) -> usize {
        self.state
            .read()
            .await
            .extensions
            .values()
            .filter(|entry| entry.metadata.enabled)
            .count()
    }

    /// Get the number of registered extensions.
    pub async fn count(&self) -> usize {
        self.state.read().await.extensions.len()
    }

    pub async fn len(&self) -> usize {
        self.count().await
    }

    pub async fn is_empty(&self) -> bool {
        self.count().await == 0
    }

    /// Check if an extension is registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.state.read().await.extensions.contains_key(name)
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn info_of(entry: &RegisteredExtension) -> ExtensionInfo {
    ExtensionInfo {
        metadata: entry.metadata.clone(),
        functions: entry.functions.clone(),
        registered_at: entry.registered_at,
    }
}
