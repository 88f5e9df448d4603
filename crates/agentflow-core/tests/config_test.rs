//! Configuration loading tests.

use agentflow_core::config::{AgentFlowConfig, defaults};
use std::io::Write;

#[test]
fn test_load_from_file() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(
        file,
        r#"
[functions]
max_concurrent_calls = 4
call_timeout_secs = 5

[pipeline]
max_function_rounds = 2
context_separator = "\n---\n"
"#
    )?;

    let config = AgentFlowConfig::from_file(file.path())?;
    assert_eq!(config.functions.max_concurrent_calls, 4);
    assert_eq!(config.functions.call_timeout_secs, 5);
    assert_eq!(config.functions.sweep_interval_ms, defaults::SWEEP_INTERVAL_MS);
    assert_eq!(config.pipeline.max_function_rounds, 2);
    assert_eq!(config.pipeline.context_separator, "\n---\n");
    Ok(())
}

#[test]
fn test_missing_file_is_config_error() {
    let err = AgentFlowConfig::from_file("/nonexistent/agentflow.toml").unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_empty_document_gives_defaults() -> anyhow::Result<()> {
    let config = AgentFlowConfig::from_toml_str("")?;
    assert_eq!(config, AgentFlowConfig::default());
    Ok(())
}

#[test]
fn test_round_trip_through_toml() -> anyhow::Result<()> {
    let config = AgentFlowConfig::default();
    let text = toml::to_string(&config)?;
    assert_eq!(AgentFlowConfig::from_toml_str(&text)?, config);
    Ok(())
}
