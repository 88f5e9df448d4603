//! Testing utilities for AgentFlow
//!
//! This crate provides test doubles shared by the engine's test suites:
//! - Scripted model and speech providers
//! - Sample extensions (calculator, context contributors, response rewriters)
//! - Misbehaving extensions (failing, panicking, stalling, slow)

pub mod extensions;
pub mod providers;

pub use extensions::{
    CalculatorExtension, ContextExtension, FailingExtension, SlowExtension, StallingExtension,
    SuffixExtension,
};
pub use providers::{MockModelProvider, MockSpeechProvider};

/// Install a test subscriber once; later calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
