//! Function call orchestrator.
//!
//! Entry point of the function engine: validates a call, resolves its
//! owning extension, dispatches it through the [`ExecutionTracker`] and
//! publishes lifecycle notifications. Every outcome, including rejections
//! and extension failures, comes back as a [`FunctionResult`].

use agentflow_core::config::FunctionConfig;
use agentflow_core::event::{AgentFlowEvent, EventMetadata};
use agentflow_core::eventbus::EventBus;
use agentflow_core::extension::ExtensionRegistry;
use agentflow_core::function::{
    CallId, FunctionCall, FunctionDefinition, FunctionError, FunctionResult,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::stats::{FunctionStatistics, StatisticsAggregator};
use crate::tracker::ExecutionTracker;
use crate::validator::CallValidator;

/// Function-calling engine.
pub struct FunctionCallOrchestrator {
    registry: Arc<ExtensionRegistry>,
    validator: CallValidator,
    tracker: Arc<ExecutionTracker>,
    statistics: Arc<StatisticsAggregator>,
    event_bus: EventBus,
    config: FunctionConfig,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl FunctionCallOrchestrator {
    /// Fails with a configuration error when `config` does not validate.
    pub fn new(
        registry: Arc<ExtensionRegistry>,
        config: FunctionConfig,
        event_bus: EventBus,
    ) -> agentflow_core::Result<Self> {
        config.validate()?;
        let statistics = Arc::new(StatisticsAggregator::new());
        let tracker = Arc::new(ExecutionTracker::new(
            config.max_concurrent_calls,
            config.call_timeout(),
            statistics.clone(),
        ));
        Ok(Self {
            registry,
            validator: CallValidator::new(config.validate_calls),
            tracker,
            statistics,
            event_bus,
            config,
            sweeper: Mutex::new(None),
        })
    }

    /// Start the periodic stale-call sweep. Idempotent.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_sweeper(&self) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_none() {
            *sweeper = Some(self.tracker.spawn_sweeper(self.config.sweep_interval()));
            debug!(interval_ms = self.config.sweep_interval_ms, "Sweeper started");
        }
    }

    /// Stop the sweeper and evict every in-flight call.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        let evicted = self.tracker.clear();
        info!(evicted, "Function engine shut down");
    }

    /// Execute a single call.
    pub async fn execute_one(&self, mut call: FunctionCall) -> FunctionResult {
        let owner = self.registry.find_owner(&call.name).await;

        if let Err(error) = self.validator.prepare(&mut call, owner.as_ref()) {
            debug!(function = %call.name, error = %error, "Call rejected");
            let extension = owner.map(|o| o.extension).unwrap_or_default();
            return FunctionResult::failure(&call.name, extension, error);
        }

        let Some(owner) = owner else {
            debug!(function = %call.name, "No extension provides function");
            return FunctionResult::failure(
                &call.name,
                String::new(),
                FunctionError::NoExtensionForFunction {
                    function: call.name.clone(),
                },
            );
        };

        let call_id = CallId::generate();
        let function = call.name.clone();
        let extension = owner.extension.clone();

        self.publish(
            AgentFlowEvent::FunctionInvoked {
                call_id: call_id.to_string(),
                function: function.clone(),
                extension: extension.clone(),
                arguments: call.arguments.clone(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
            &call_id,
        );

        let result = match self.tracker.dispatch(call_id.clone(), call, owner).await {
            Ok(result) => result,
            Err(refused) => FunctionResult::failure(&function, &extension, refused).with_call_id(call_id.clone()),
        };

        self.publish(
            AgentFlowEvent::FunctionCompleted {
                call_id: Some(call_id.to_string()),
                function,
                extension,
                success: result.success,
                duration_ms: result.duration_ms,
                error: result.error_message(),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
            &call_id,
        );

        result
    }

    /// Execute calls concurrently and wait for all of them.
    ///
    /// Calls beyond the concurrency ceiling fail fast with
    /// `ConcurrencyLimitExceeded`. Results are returned in input order.
    pub async fn execute_many(&self, calls: Vec<FunctionCall>) -> Vec<FunctionResult> {
        let count = calls.len();
        let results =
            futures::future::join_all(calls.into_iter().map(|call| self.execute_one(call))).await;
        debug!(
            calls = count,
            succeeded = results.iter().filter(|r| r.success).count(),
            "Batch completed"
        );
        results
    }

    /// Counters plus registry-derived totals.
    pub async fn statistics(&self) -> FunctionStatistics {
        let mut stats = self.statistics.snapshot();
        stats.total_registered_functions = self.registry.function_count().await;
        stats.active_extensions = self.registry.active_extension_count().await;
        stats
    }

    pub fn reset_statistics(&self) {
        self.statistics.reset();
    }

    /// Definitions to hand to a model provider.
    pub async fn available_functions(&self) -> Vec<FunctionDefinition> {
        self.registry.available_functions().await
    }

    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &ExecutionTracker {
        &self.tracker
    }

    pub fn config(&self) -> &FunctionConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn publish(&self, event: AgentFlowEvent, call_id: &CallId) {
        let source = match &event {
            AgentFlowEvent::FunctionInvoked { function, .. }
            | AgentFlowEvent::FunctionCompleted { function, .. } => format!("function:{}", function),
            _ => "functions".to_string(),
        };
        let metadata = EventMetadata::new(source).with_correlation_id(call_id.as_str());
        self.event_bus.send(event, metadata);
    }
}

impl Drop for FunctionCallOrchestrator {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}
