//! Tests for the wired demo application.

use agentflow_cli::{load_config, App};
use agentflow_core::config::AgentFlowConfig;
use agentflow_core::function::FunctionError;
use std::io::Write;

#[tokio::test]
async fn test_functions_are_listed() {
    let app = App::new(AgentFlowConfig::default()).await.unwrap();

    let mut names: Vec<String> = app.functions().await.into_iter().map(|f| f.name).collect();
    names.sort();
    assert_eq!(names, ["calculate", "current_time"]);
    app.shutdown();
}

#[tokio::test]
async fn test_call_validates_enum() {
    let app = App::new(AgentFlowConfig::default()).await.unwrap();

    let ok = app.call("calculate", r#"{"op":"multiply","a":6,"b":7}"#).await;
    assert_eq!(ok.result.as_deref(), Some("42"));

    let bad = app.call("calculate", r#"{"op":"power","a":2,"b":3}"#).await;
    assert!(matches!(bad.error, Some(FunctionError::InvalidArgument { .. })));

    let zero = app.call("calculate", r#"{"op":"divide","a":1,"b":0}"#).await;
    assert!(!zero.success);

    let stats = app.statistics().await;
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.total_registered_functions, 2);
    app.shutdown();
}

#[tokio::test]
async fn test_chat_runs_function_loop() {
    let app = App::new(AgentFlowConfig::default()).await.unwrap();

    let response = app.chat("What is 5 + 3?", false).await.unwrap();
    assert_eq!(response.text, "Result: 8");
    assert_eq!(response.function_results.len(), 1);
    assert!(response.audio.is_none());

    let echoed = app.chat("hello", true).await.unwrap();
    assert_eq!(echoed.text, "Echo: hello");
    assert_eq!(echoed.audio.unwrap().data, b"Echo: hello".to_vec());
    app.shutdown();
}

#[tokio::test]
async fn test_time_question_gets_clock_context() {
    let app = App::new(AgentFlowConfig::default()).await.unwrap();

    let response = app.chat("what time is it", false).await.unwrap();
    assert_eq!(response.contexts.len(), 1);
    assert_eq!(response.contexts[0].extension, "clock");
    assert!(response.text.starts_with("Result: "));
    app.shutdown();
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[functions]\nmax_concurrent_calls = 3").unwrap();

    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.functions.max_concurrent_calls, 3);
}
