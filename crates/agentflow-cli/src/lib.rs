//! AgentFlow command-line application.
//!
//! Supplies configuration and logging at startup and wires the function
//! engine and message pipeline to offline demo providers.

pub mod app;
pub mod demo;

pub use app::{load_config, App};
