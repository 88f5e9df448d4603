//! In-flight execution tracking.
//!
//! The tracker admits calls up to a fixed ceiling, runs each one against a
//! per-call timeout and evicts contexts that outlive that timeout. Admission
//! is refused rather than queued: callers see `ConcurrencyLimitExceeded` and
//! may retry.
//!
//! Whoever removes a context from the in-flight map reports its completion
//! to the statistics, so every admitted call is counted exactly once:
//! - the dispatch itself when the extension finishes or times out
//! - a sweep when the context expired first (the dispatch then reports a
//!   timeout and its late outcome is ignored)
//! - [`ExecutionTracker::clear`] on shutdown (the dispatch then reports
//!   that the engine shut down)

use agentflow_core::extension::FunctionOwner;
use agentflow_core::function::{CallId, FunctionCall, FunctionError, FunctionResult};
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::stats::StatisticsAggregator;

/// Bookkeeping for one admitted call.
#[derive(Debug, Clone)]
struct ExecutionContext {
    function: String,
    extension: String,
    started_at: Instant,
}

/// Read-only view of an in-flight call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionSnapshot {
    pub call_id: CallId,
    pub function: String,
    pub extension: String,
    pub elapsed: Duration,
}

/// Bounded-concurrency executor for validated calls.
pub struct ExecutionTracker {
    in_flight: Mutex<HashMap<CallId, ExecutionContext>>,
    /// Calls evicted by `clear` whose dispatch has not returned yet.
    shut_down: Mutex<HashSet<CallId>>,
    max_concurrent: usize,
    timeout: Duration,
    statistics: Arc<StatisticsAggregator>,
}

impl ExecutionTracker {
    pub fn new(
        max_concurrent: usize,
        timeout: Duration,
        statistics: Arc<StatisticsAggregator>,
    ) -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            shut_down: Mutex::new(HashSet::new()),
            max_concurrent,
            timeout,
            statistics,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Snapshot of every in-flight call.
    pub fn in_flight(&self) -> Vec<ExecutionSnapshot> {
        self.in_flight
            .lock()
            .iter()
            .map(|(call_id, ctx)| ExecutionSnapshot {
                call_id: call_id.clone(),
                function: ctx.function.clone(),
                extension: ctx.extension.clone(),
                elapsed: ctx.started_at.elapsed(),
            })
            .collect()
    }

    /// Run a validated call on its owner.
    ///
    /// Expired contexts are swept before the ceiling is checked, so a slot
    /// held by a timed-out call is free for this dispatch.
    pub async fn dispatch(
        &self,
        call_id: CallId,
        call: FunctionCall,
        owner: FunctionOwner,
    ) -> Result<FunctionResult, FunctionError> {
        let started_at = self.admit(&call_id, &call, &owner.extension)?;
        debug!(call_id = %call_id, function = %call.name, extension = %owner.extension, "Call admitted");

        let outcome = tokio::time::timeout(
            self.timeout,
            AssertUnwindSafe(owner.provider.execute(&call)).catch_unwind(),
        )
        .await;
        let elapsed = started_at.elapsed();

        let tracked = self.in_flight.lock().remove(&call_id).is_some();
        let result = if tracked {
            let result = match outcome {
                Ok(Ok(Ok(payload))) => FunctionResult::success(&call.name, &owner.extension, payload),
                Ok(Ok(Err(e))) => {
                    warn!(call_id = %call_id, function = %call.name, error = %e, "Extension returned an error");
                    self.execution_error(&call, &owner.extension, e.to_string())
                }
                Ok(Err(panic)) => {
                    let message = panic_message(panic.as_ref());
                    warn!(call_id = %call_id, function = %call.name, panic = %message, "Extension panicked");
                    self.execution_error(&call, &owner.extension, format!("panicked: {}", message))
                }
                Err(_) => {
                    warn!(call_id = %call_id, function = %call.name, "Call timed out");
                    self.timeout_result(&call.name, &owner.extension)
                }
            };
            self.statistics.record_completion(result.success, elapsed);
            result
        } else if self.shut_down.lock().remove(&call_id) {
            debug!(call_id = %call_id, function = %call.name, "Late completion ignored, engine shut down");
            self.execution_error(&call, &owner.extension, "engine shut down".to_string())
        } else {
            debug!(call_id = %call_id, function = %call.name, "Late completion ignored, call was evicted");
            self.timeout_result(&call.name, &owner.extension)
        };

        Ok(result.with_call_id(call_id).with_duration(elapsed))
    }

    fn admit(
        &self,
        call_id: &CallId,
        call: &FunctionCall,
        extension: &str,
    ) -> Result<Instant, FunctionError> {
        self.sweep_expired();

        let mut in_flight = self.in_flight.lock();
        if in_flight.len() >= self.max_concurrent {
            debug!(function = %call.name, limit = self.max_concurrent, "Concurrency ceiling reached");
            return Err(FunctionError::ConcurrencyLimitExceeded {
                limit: self.max_concurrent,
            });
        }

        let started_at = Instant::now();
        in_flight.insert(
            call_id.clone(),
            ExecutionContext {
                function: call.name.clone(),
                extension: extension.to_string(),
                started_at,
            },
        );
        Ok(started_at)
    }

    /// Evict every context at or past the timeout.
    ///
    /// Returns a synthesized timeout result per evicted call.
    pub fn sweep_expired(&self) -> Vec<FunctionResult> {
        let expired: Vec<(CallId, ExecutionContext)> = {
            let mut in_flight = self.in_flight.lock();
            let ids: Vec<CallId> = in_flight
                .iter()
                .filter(|(_, ctx)| ctx.started_at.elapsed() >= self.timeout)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| in_flight.remove(&id).map(|ctx| (id, ctx)))
                .collect()
        };

        expired
            .into_iter()
            .map(|(call_id, ctx)| {
                let elapsed = ctx.started_at.elapsed();
                warn!(call_id = %call_id, function = %ctx.function, extension = %ctx.extension, "Evicting expired call");
                self.statistics.record_completion(false, elapsed);
                self.timeout_result(&ctx.function, &ctx.extension)
                    .with_call_id(call_id)
                    .with_duration(elapsed)
            })
            .collect()
    }

    /// Evict every in-flight call. Returns how many were evicted.
    ///
    /// Dispatches still awaiting their extension report an execution error
    /// once it returns.
    pub fn clear(&self) -> usize {
        let drained: Vec<(CallId, ExecutionContext)> = self.in_flight.lock().drain().collect();
        let mut shut_down = self.shut_down.lock();
        for (call_id, ctx) in &drained {
            self.statistics.record_completion(false, ctx.started_at.elapsed());
            shut_down.insert(call_id.clone());
        }
        drained.len()
    }

    /// Sweep on a fixed period until the tracker is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let tracker: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(tracker) = tracker.upgrade() else {
                    break;
                };
                let evicted = tracker.sweep_expired();
                if !evicted.is_empty() {
                    debug!(count = evicted.len(), "Sweeper evicted expired calls");
                }
            }
        })
    }

    fn timeout_result(&self, function: &str, extension: &str) -> FunctionResult {
        FunctionResult::failure(
            function,
            extension,
            FunctionError::Timeout {
                function: function.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            },
        )
    }

    fn execution_error(&self, call: &FunctionCall, extension: &str, message: String) -> FunctionResult {
        FunctionResult::failure(
            &call.name,
            extension,
            FunctionError::ExtensionExecutionError {
                extension: extension.to_string(),
                function: call.name.clone(),
                message,
            },
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_core::extension::ExtensionHandle;
    use agentflow_core::ExtensionRegistry;
    use agentflow_testing::{SlowExtension, StallingExtension};

    async fn owner_of(handle: ExtensionHandle, function: &str) -> FunctionOwner {
        let registry = ExtensionRegistry::new();
        registry.register(handle).await.unwrap();
        registry.find_owner(function).await.unwrap()
    }

    fn tracker(max: usize, timeout: Duration) -> (Arc<ExecutionTracker>, Arc<StatisticsAggregator>) {
        let stats = Arc::new(StatisticsAggregator::new());
        (Arc::new(ExecutionTracker::new(max, timeout, stats.clone())), stats)
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_success_releases_slot() {
        let (tracker, stats) = tracker(1, Duration::from_secs(5));
        let owner = owner_of(
            ExtensionHandle::with_functions(SlowExtension::new("slow", Duration::from_millis(200))),
            "slow",
        )
        .await;

        let result = tracker
            .dispatch(CallId::generate(), FunctionCall::new("slow", ""), owner)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.duration_ms, 200);
        assert_eq!(tracker.in_flight_count(), 0);
        assert_eq!(stats.snapshot().successful_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_refuses_without_context() {
        let (tracker, stats) = tracker(1, Duration::from_secs(5));
        let owner = owner_of(
            ExtensionHandle::with_functions(SlowExtension::new("slow", Duration::from_secs(1))),
            "slow",
        )
        .await;

        let first = tracker.dispatch(CallId::generate(), FunctionCall::new("slow", ""), owner.clone());
        let second = async {
            tokio::task::yield_now().await;
            assert_eq!(tracker.in_flight_count(), 1);
            tracker
                .dispatch(CallId::generate(), FunctionCall::new("slow", ""), owner.clone())
                .await
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.unwrap().success);
        assert_eq!(
            second.unwrap_err(),
            FunctionError::ConcurrencyLimitExceeded { limit: 1 }
        );
        assert_eq!(stats.snapshot().total_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_call_times_out_exactly() {
        let (tracker, stats) = tracker(2, Duration::from_secs(3));
        let owner = owner_of(ExtensionHandle::with_functions(StallingExtension::new("stuck")), "stall").await;

        let start = Instant::now();
        let result = tracker
            .dispatch(CallId::generate(), FunctionCall::new("stall", ""), owner)
            .await
            .unwrap();

        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(3));
        assert!(waited < Duration::from_secs(3) + Duration::from_millis(5));
        assert!(!result.success);
        assert_eq!(result.error.as_ref().map(FunctionError::kind), Some("timeout"));
        assert_eq!(tracker.in_flight_count(), 0);
        assert_eq!(stats.snapshot().failed_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_call_is_swept_once() {
        let (tracker, stats) = tracker(1, Duration::from_secs(2));
        let owner = owner_of(ExtensionHandle::with_functions(StallingExtension::new("stuck")), "stall").await;

        // Start a dispatch, then drop it while the extension is pending.
        let abandoned = tracker.dispatch(CallId::generate(), FunctionCall::new("stall", ""), owner);
        let _ = tokio::time::timeout(Duration::from_millis(10), abandoned).await;
        assert_eq!(tracker.in_flight_count(), 1);
        assert!(tracker.sweep_expired().is_empty());

        tokio::time::advance(Duration::from_secs(2)).await;
        let evicted = tracker.sweep_expired();
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].function_name, "stall");
        assert_eq!(tracker.in_flight_count(), 0);
        assert_eq!(stats.snapshot().failed_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_slot_released_before_admission() {
        let (tracker, _) = tracker(1, Duration::from_secs(2));
        let stuck = owner_of(ExtensionHandle::with_functions(StallingExtension::new("stuck")), "stall").await;
        let slow = owner_of(
            ExtensionHandle::with_functions(SlowExtension::new("slow", Duration::from_millis(1))),
            "slow",
        )
        .await;

        let abandoned = tracker.dispatch(CallId::generate(), FunctionCall::new("stall", ""), stuck);
        let _ = tokio::time::timeout(Duration::from_millis(10), abandoned).await;
        tokio::time::advance(Duration::from_secs(2)).await;

        // No sweeper is running; admission itself reclaims the slot.
        let result = tracker
            .dispatch(CallId::generate(), FunctionCall::new("slow", ""), slow)
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_evicts() {
        let (tracker, _) = tracker(1, Duration::from_secs(1));
        let owner = owner_of(ExtensionHandle::with_functions(StallingExtension::new("stuck")), "stall").await;
        let sweeper = tracker.spawn_sweeper(Duration::from_millis(100));

        let abandoned = tracker.dispatch(CallId::generate(), FunctionCall::new("stall", ""), owner);
        let _ = tokio::time::timeout(Duration::from_millis(10), abandoned).await;
        assert_eq!(tracker.in_flight().len(), 1);

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(tracker.in_flight_count(), 0);
        sweeper.abort();
    }

    #[tokio::test]
    async fn test_clear() {
        let (tracker, stats) = tracker(4, Duration::from_secs(30));
        assert_eq!(tracker.clear(), 0);
        assert_eq!(stats.snapshot().total_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_call_reports_shutdown_once() {
        let (tracker, stats) = tracker(2, Duration::from_secs(30));
        let owner = owner_of(
            ExtensionHandle::with_functions(SlowExtension::new("slow", Duration::from_millis(100))),
            "slow",
        )
        .await;

        let running = tracker.dispatch(CallId::generate(), FunctionCall::new("slow", ""), owner);
        let clearing = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(tracker.clear(), 1);
        };
        let (result, ()) = tokio::join!(running, clearing);

        let result = result.unwrap();
        assert_eq!(result.error.as_ref().map(FunctionError::kind), Some("extension_execution_error"));
        assert!(result.error_message().unwrap().contains("engine shut down"));
        assert_eq!(stats.snapshot().total_calls, 1);
        assert_eq!(stats.snapshot().failed_calls, 1);
        assert!(tracker.shut_down.lock().is_empty());
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
