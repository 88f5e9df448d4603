//! Function-calling data model.
//!
//! Extensions describe their callable functions with [`FunctionDefinition`];
//! models request invocations as [`FunctionCall`]s; every invocation ends in
//! exactly one [`FunctionResult`].

pub mod error;
pub mod types;

pub use error::FunctionError;
pub use types::{
    format_number, ArgValue, Arguments, CallId, FunctionCall, FunctionDefinition, FunctionResult,
    ParameterDefinition, ParameterType,
};
