//! End-to-end tests for the function engine.
//!
//! Covers:
//! - The add(5, 3) scenario and its rejection variants
//! - Concurrency ceiling under a batch
//! - Timeout determinism
//! - Failure isolation inside a batch
//! - Statistics correctness

use agentflow_core::config::FunctionConfig;
use agentflow_core::event::AgentFlowEvent;
use agentflow_core::eventbus::EventBus;
use agentflow_core::extension::{ExtensionHandle, ExtensionRegistry};
use agentflow_core::function::{FunctionCall, FunctionError};
use agentflow_functions::FunctionCallOrchestrator;
use agentflow_testing::{CalculatorExtension, FailingExtension, SlowExtension, StallingExtension};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

async fn engine_with(
    handles: Vec<ExtensionHandle>,
    config: FunctionConfig,
) -> FunctionCallOrchestrator {
    let registry = Arc::new(ExtensionRegistry::new());
    for handle in handles {
        registry.register(handle).await.unwrap();
    }
    FunctionCallOrchestrator::new(registry, config, EventBus::new()).unwrap()
}

async fn calculator() -> FunctionCallOrchestrator {
    engine_with(
        vec![ExtensionHandle::with_functions(CalculatorExtension::new())],
        FunctionConfig::default(),
    )
    .await
}

// ========================================================================
// Scenario
// ========================================================================

#[tokio::test]
async fn test_add_returns_eight() {
    let engine = calculator().await;

    let result = engine
        .execute_one(FunctionCall::new("add", r#"{"a":5,"b":3}"#))
        .await;

    assert!(result.success);
    assert_eq!(result.result.as_deref(), Some("8"));
    assert_eq!(result.function_name, "add");
    assert_eq!(result.extension_name, "calculator");
    assert!(result.call_id.is_some());
}

#[tokio::test]
async fn test_missing_operand_is_rejected() {
    let engine = calculator().await;

    let result = engine.execute_one(FunctionCall::new("add", r#"{"a":5}"#)).await;

    assert!(!result.success);
    assert_eq!(
        result.error,
        Some(FunctionError::MissingRequiredParameter {
            function: "add".to_string(),
            parameter: "b".to_string(),
        })
    );
    // Rejections never reach the tracker.
    assert_eq!(engine.statistics().await.total_calls, 0);
}

#[tokio::test]
async fn test_unknown_function_is_rejected() {
    let engine = calculator().await;

    let result = engine.execute_one(FunctionCall::new("ghost", "{}")).await;

    assert!(!result.success);
    assert_eq!(
        result.error,
        Some(FunctionError::NoExtensionForFunction {
            function: "ghost".to_string(),
        })
    );
}

#[tokio::test]
async fn test_disabled_extension_functions_are_unavailable() {
    let engine = calculator().await;
    engine.registry().set_enabled("calculator", false).await.unwrap();

    let result = engine
        .execute_one(FunctionCall::new("add", r#"{"a":5,"b":3}"#))
        .await;
    assert_eq!(result.error.unwrap().kind(), "no_extension_for_function");
    assert!(engine.available_functions().await.is_empty());
}

#[tokio::test]
async fn test_extension_argument_hook() {
    let engine = calculator().await;

    let result = engine
        .execute_one(FunctionCall::new("divide", r#"{"a":1,"b":0}"#))
        .await;
    assert_eq!(result.error.unwrap().kind(), "invalid_argument");
}

// ========================================================================
// Concurrency
// ========================================================================

#[tokio::test(start_paused = true)]
async fn test_batch_respects_ceiling() {
    let slow = Arc::new(SlowExtension::new("slow", Duration::from_secs(1)));
    let engine = engine_with(
        vec![ExtensionHandle::from_shared(slow.clone())],
        FunctionConfig::default().with_max_concurrent_calls(2),
    )
    .await;

    let calls = (0..5)
        .map(|i| FunctionCall::new("slow", format!(r#"{{"tag":"t{}"}}"#, i)))
        .collect();
    let results = engine.execute_many(calls).await;

    assert_eq!(results.len(), 5);
    let succeeded = results.iter().filter(|r| r.success).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r.error, Some(FunctionError::ConcurrencyLimitExceeded { limit: 2 })))
        .count();
    assert_eq!(succeeded, 2);
    assert_eq!(refused, 3);
    assert!(slow.peak_concurrency() <= 2);
    assert_eq!(slow.completed(), 2);
    assert_eq!(engine.tracker().in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slot_is_reusable_after_batch() {
    let slow = Arc::new(SlowExtension::new("slow", Duration::from_millis(50)));
    let engine = engine_with(
        vec![ExtensionHandle::from_shared(slow.clone())],
        FunctionConfig::default().with_max_concurrent_calls(1),
    )
    .await;

    for _ in 0..3 {
        let result = engine.execute_one(FunctionCall::new("slow", "")).await;
        assert!(result.success);
    }
    assert_eq!(slow.completed(), 3);
    assert_eq!(slow.peak_concurrency(), 1);
}

// ========================================================================
// Timeouts
// ========================================================================

#[tokio::test(start_paused = true)]
async fn test_stalled_function_times_out_at_configured_duration() {
    let engine = engine_with(
        vec![ExtensionHandle::with_functions(StallingExtension::new("stuck"))],
        FunctionConfig::default().with_call_timeout_secs(5),
    )
    .await;
    engine.spawn_sweeper();

    let start = Instant::now();
    let result = engine.execute_one(FunctionCall::new("stall", "")).await;
    let waited = start.elapsed();

    assert!(waited >= Duration::from_secs(5), "evicted early: {:?}", waited);
    assert!(
        waited <= Duration::from_secs(5) + engine.config().sweep_interval(),
        "evicted late: {:?}",
        waited
    );
    assert_eq!(
        result.error,
        Some(FunctionError::Timeout {
            function: "stall".to_string(),
            timeout_ms: 5000,
        })
    );

    let stats = engine.statistics().await;
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.failed_calls, 1);
    engine.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_call_running_at_shutdown_reports_shutdown_not_timeout() {
    let engine = engine_with(
        vec![ExtensionHandle::with_functions(SlowExtension::new(
            "slow",
            Duration::from_millis(100),
        ))],
        FunctionConfig::default(),
    )
    .await;

    let (result, ()) = tokio::join!(engine.execute_one(FunctionCall::new("slow", "")), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.shutdown();
    });

    assert!(!result.success);
    match result.error {
        Some(FunctionError::ExtensionExecutionError { ref message, .. }) => {
            assert!(message.contains("shut down"), "unexpected message: {}", message)
        }
        ref other => panic!("expected shutdown error, got {:?}", other),
    }

    let stats = engine.statistics().await;
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.failed_calls, 1);
}

// ========================================================================
// Failure isolation
// ========================================================================

#[tokio::test]
async fn test_failures_do_not_abort_siblings() {
    let engine = engine_with(
        vec![
            ExtensionHandle::with_functions(CalculatorExtension::new()),
            ExtensionHandle::with_functions(FailingExtension::new("fragile")),
        ],
        FunctionConfig::default(),
    )
    .await;

    let results = engine
        .execute_many(vec![
            FunctionCall::new("explode", ""),
            FunctionCall::new("multiply", r#"{"a":6,"b":7}"#),
        ])
        .await;

    let exploded = results.iter().find(|r| r.function_name == "explode").unwrap();
    assert!(matches!(
        exploded.error,
        Some(FunctionError::ExtensionExecutionError { ref extension, .. }) if extension == "fragile"
    ));
    let product = results.iter().find(|r| r.function_name == "multiply").unwrap();
    assert_eq!(product.result.as_deref(), Some("42"));
}

#[tokio::test]
async fn test_panicking_extension_becomes_failed_result() {
    let engine = engine_with(
        vec![ExtensionHandle::with_functions(FailingExtension::panicking("volatile"))],
        FunctionConfig::default(),
    )
    .await;

    let result = engine.execute_one(FunctionCall::new("explode", "")).await;

    assert!(!result.success);
    let message = result.error_message().unwrap();
    assert!(message.contains("panicked"), "{}", message);
    assert_eq!(engine.tracker().in_flight_count(), 0);
}

// ========================================================================
// Statistics
// ========================================================================

#[tokio::test(start_paused = true)]
async fn test_statistics_track_success_rate_and_mean() {
    let engine = engine_with(
        vec![
            ExtensionHandle::with_functions(SlowExtension::new("slow", Duration::from_millis(100))),
            ExtensionHandle::with_functions(FailingExtension::new("fragile")),
        ],
        FunctionConfig::default(),
    )
    .await;

    for _ in 0..3 {
        engine.execute_one(FunctionCall::new("slow", "")).await;
    }
    engine.execute_one(FunctionCall::new("explode", "")).await;

    let stats = engine.statistics().await;
    assert_eq!(stats.total_calls, 4);
    assert_eq!(stats.successful_calls, 3);
    assert_eq!(stats.failed_calls, 1);
    assert!((stats.success_rate - 75.0).abs() < 1e-9);
    // Three 100ms calls and one instant failure.
    assert!((stats.average_execution_time_ms - 75.0).abs() < 1.0);
    assert_eq!(stats.total_registered_functions, 2);
    assert_eq!(stats.active_extensions, 2);
}

#[tokio::test]
async fn test_unregistering_missing_extension_changes_nothing() {
    let engine = calculator().await;
    engine
        .execute_one(FunctionCall::new("add", r#"{"a":1,"b":1}"#))
        .await;
    let before = engine.statistics().await;

    assert!(!engine.registry().unregister("does-not-exist").await);

    assert_eq!(engine.statistics().await, before);
    assert_eq!(engine.registry().list_functions().await.len(), 4);
}

// ========================================================================
// Notifications
// ========================================================================

#[tokio::test]
async fn test_notification_order() {
    let engine = calculator().await;
    let mut rx = engine.event_bus().subscribe();

    engine
        .execute_one(FunctionCall::new("subtract", r#"{"a":5,"b":3}"#))
        .await;

    let events = rx.drain();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], AgentFlowEvent::FunctionInvoked { ref function, .. } if function == "subtract"));
    assert!(matches!(events[1], AgentFlowEvent::FunctionCompleted { success: true, .. }));
}
