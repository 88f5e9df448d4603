//! Extension system for AgentFlow.
//!
//! Extensions are pluggable units an agent can lean on. Every extension can
//! take part in the message pipeline; extensions that also implement
//! [`FunctionProvider`] expose callable functions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  ExtensionRegistry                   │
//! │  - Unique extension names                            │
//! │  - Function name -> owning extension index           │
//! │  - Pipeline ordering (priority, registration order)  │
//! └─────────────────────────────────────────────────────┘
//!                 │                        │
//!                 ▼                        ▼
//!       ┌──────────────────┐     ┌────────────────────┐
//!       │    Extension     │     │  FunctionProvider  │
//!       │ preprocess /     │     │ definitions /      │
//!       │ postprocess      │     │ execute            │
//!       └──────────────────┘     └────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use agentflow_core::extension::{ExtensionHandle, ExtensionRegistry};
//!
//! let registry = ExtensionRegistry::new();
//! registry.register(ExtensionHandle::with_functions(Calculator::new())).await?;
//!
//! let owner = registry.find_owner("add").await;
//! ```

pub mod registry;
pub mod system;

pub use registry::{ExtensionInfo, ExtensionRegistry, FunctionOwner};
pub use system::{
    DynExtension, DynFunctionProvider, Extension, ExtensionContext, ExtensionError,
    ExtensionHandle, ExtensionMetadata, ExtensionResult, FunctionProvider, Result,
};
