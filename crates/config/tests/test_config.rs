//! Tests for Config serialization, defaults and file round-trips

use dbbot_config::{AgentConfig, Config, DatabaseConfig, ProviderConfig, SandboxConfig};
use std::path::PathBuf;
use tempfile::TempDir;

fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_config_defaults() {
    let config = Config::default();

    assert_eq!(config.provider.model, "gpt-4o");
    assert_eq!(config.provider.max_tokens, 2048);
    assert_eq!(config.provider.temperature, 0.0);
    assert!(config.provider.api_key.is_empty());
    assert!(config.provider.api_base.is_none());

    assert_eq!(config.agent.max_iterations, 15);
    assert_eq!(config.agent.top_k, 10);
    assert_eq!(config.agent.parse_retry_backoff_ms, 0);
    assert_eq!(config.agent.max_history_messages, 20);

    assert!(config.database.dialect.is_empty());
    assert!(config.database.uri.is_empty());
    assert!(config.database.read_only);
    assert_eq!(config.database.sample_rows, 3);

    assert_eq!(config.sandbox.python, "python3");
    assert!(config.sandbox.timeout_secs.is_none());
}

#[test]
fn test_section_defaults_match_root() {
    let config = Config::default();
    assert_eq!(
        AgentConfig::default().max_iterations,
        config.agent.max_iterations
    );
    assert_eq!(ProviderConfig::default().model, config.provider.model);
    assert_eq!(DatabaseConfig::default().read_only, config.database.read_only);
    assert_eq!(SandboxConfig::default().python, config.sandbox.python);
}

#[test]
fn test_partial_json_fills_defaults() {
    let json = r#"{ "database": { "dialect": "sqlite", "uri": "demo.db" } }"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.database.dialect, "sqlite");
    assert_eq!(config.database.uri, "demo.db");
    assert!(config.database.read_only);
    assert_eq!(config.agent.top_k, 10);
    assert_eq!(config.provider.model, "gpt-4o");
}

#[test]
fn test_empty_json_is_default() {
    let config: Config = serde_json::from_str("{}").unwrap();
    assert_eq!(config.agent.max_iterations, 15);
    assert!(!config.has_database());
}

#[test]
fn test_api_base_omitted_when_none() {
    let json = serde_json::to_string(&Config::default()).unwrap();
    assert!(!json.contains("api_base"));
    assert!(!json.contains("timeout_secs"));
}

#[tokio::test]
async fn test_save_and_load_roundtrip() {
    let dir = temp_dir();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.provider.model = "custom/model".to_string();
    config.database.dialect = "postgresql".to_string();
    config.database.uri = "postgres:postgres@localhost:5432/pagila".to_string();
    config.agent.top_k = 25;
    config.sandbox.timeout_secs = Some(30);

    config.save_to(&path).await.expect("save");
    assert!(path.exists());

    let loaded = Config::load_from(&path).await.expect("load");
    assert_eq!(loaded.provider.model, "custom/model");
    assert_eq!(loaded.database.dialect, "postgresql");
    assert_eq!(
        loaded.database.uri,
        "postgres:postgres@localhost:5432/pagila"
    );
    assert_eq!(loaded.agent.top_k, 25);
    assert_eq!(loaded.sandbox.timeout_secs, Some(30));
}

#[tokio::test]
async fn test_load_missing_file_gives_defaults() {
    let dir = temp_dir();
    let config = Config::load_from(&dir.path().join("absent.json"))
        .await
        .expect("defaults");
    assert_eq!(config.agent.top_k, 10);
}

#[tokio::test]
async fn test_load_malformed_file_errors() {
    let dir = temp_dir();
    let path = dir.path().join("config.json");
    tokio::fs::write(&path, "{ not json").await.unwrap();

    let result = Config::load_from(&path).await;
    assert!(result.is_err());
}

#[test]
fn test_has_database_requires_both() {
    let mut config = Config::default();
    config.database.dialect = "mysql".to_string();
    assert!(!config.has_database());
    config.database.uri = "root@localhost/shop".to_string();
    assert!(config.has_database());
    config.database.dialect = "  ".to_string();
    assert!(!config.has_database());
}

#[test]
fn test_sandbox_root_absolute() {
    let mut config = Config::default();
    config.sandbox.root = "/srv/dbbot".to_string();
    assert_eq!(config.sandbox_root(), PathBuf::from("/srv/dbbot"));
}

#[test]
fn test_sandbox_root_defaults_to_cwd() {
    let config = Config::default();
    assert_eq!(config.sandbox_root(), std::env::current_dir().unwrap());
}

#[test]
fn test_validate_rejects_zero_values() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.agent.max_iterations = 0;
    assert!(config.validate().is_err());

    config.agent.max_iterations = 5;
    config.agent.top_k = 0;
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("agent.top_k"));
}

#[test]
fn test_validate_requires_python() {
    let mut config = Config::default();
    config.sandbox.python = " ".to_string();
    assert_eq!(
        config.validate().unwrap_err().to_string(),
        "missing setting: sandbox.python"
    );
}

#[test]
fn test_api_key_trimmed() {
    let mut config = Config::default();
    config.provider.api_key = "   ".to_string();
    assert!(!config.has_api_key());
    config.provider.api_key = " sk-123 ".to_string();
    assert_eq!(config.api_key(), Some("sk-123".to_string()));
}
