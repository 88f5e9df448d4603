//! AgentFlow function engine.
//!
//! Validation, bounded-concurrency execution with timeouts, and statistics
//! for functions exposed by registered extensions.
//!
//! ```rust,ignore
//! use agentflow_functions::FunctionCallOrchestrator;
//!
//! let engine = FunctionCallOrchestrator::new(registry, config.functions, event_bus)?;
//! engine.spawn_sweeper();
//!
//! let result = engine.execute_one(FunctionCall::new("add", r#"{"a":5,"b":3}"#)).await;
//! assert_eq!(result.result.as_deref(), Some("8"));
//! ```

pub mod orchestrator;
pub mod stats;
pub mod tracker;
pub mod validator;

pub use orchestrator::FunctionCallOrchestrator;
pub use stats::{FunctionStatistics, StatisticsAggregator};
pub use tracker::{ExecutionSnapshot, ExecutionTracker};
pub use validator::CallValidator;
