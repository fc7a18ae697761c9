//! Tests for the tool registry

mod common;

use async_trait::async_trait;
use common::Shop;
use dbbot_agent::{AgentError, Tool, ToolError, ToolId, ToolRegistry};

/// Tool that echoes its input, or fails on "fail"
struct EchoTool(ToolId);

#[async_trait]
impl Tool for EchoTool {
    fn id(&self) -> ToolId {
        self.0
    }

    fn description(&self) -> &str {
        "echo"
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        if input == "fail" {
            return Err(ToolError::Execution("asked to fail".to_string()));
        }
        Ok(format!("{}:{}", self.0, input))
    }
}

fn echo_tools(ids: &[ToolId]) -> Vec<Box<dyn Tool>> {
    ids.iter()
        .map(|id| Box::new(EchoTool(*id)) as Box<dyn Tool>)
        .collect()
}

#[test]
fn test_tool_names_round_trip() {
    for id in ToolId::ALL {
        assert_eq!(ToolId::from_name(id.name()), Some(id));
    }
    assert_eq!(ToolId::from_name(" sql_db_query "), Some(ToolId::SqlQuery));
    assert_eq!(ToolId::from_name("shell"), None);
}

#[tokio::test]
async fn test_build_registers_every_tool_in_order() {
    let shop = Shop::open().await;
    let registry = shop.registry();

    assert_eq!(
        registry.names(),
        vec![
            "read_file",
            "write_file",
            "list_directory",
            "python_repl",
            "sql_db_query",
            "sql_db_schema",
            "sql_db_list_tables",
            "sql_db_query_checker",
        ]
    );
    assert!(registry
        .tool_names()
        .starts_with("read_file, write_file, list_directory"));

    let descriptions = registry.descriptions();
    assert_eq!(descriptions.lines().count(), 8);
    assert!(descriptions.contains("sql_db_list_tables: Input is an empty string"));
    assert!(descriptions.contains("sql_db_query_checker: Use this tool to double check"));
}

#[test]
fn test_from_tools_sorts_by_identity() {
    let mut ids = ToolId::ALL.to_vec();
    ids.reverse();
    let registry = ToolRegistry::from_tools(echo_tools(&ids)).unwrap();
    assert_eq!(registry.names()[0], "read_file");
    assert_eq!(registry.names()[7], "sql_db_query_checker");
}

#[test]
fn test_from_tools_rejects_duplicates() {
    let mut ids = ToolId::ALL.to_vec();
    ids.push(ToolId::SqlQuery);
    let err = ToolRegistry::from_tools(echo_tools(&ids)).err().unwrap();
    assert!(matches!(err, AgentError::Registry(_)));
    assert_eq!(
        err.to_string(),
        "invalid tool registry: tool sql_db_query registered twice"
    );
}

#[test]
fn test_from_tools_rejects_missing() {
    let ids: Vec<ToolId> = ToolId::ALL
        .into_iter()
        .filter(|id| *id != ToolId::PythonRepl)
        .collect();
    let err = ToolRegistry::from_tools(echo_tools(&ids)).err().unwrap();
    assert_eq!(
        err.to_string(),
        "invalid tool registry: tool python_repl is missing"
    );
}

#[tokio::test]
async fn test_invoke_returns_output_or_error_text() {
    let registry = ToolRegistry::from_tools(echo_tools(&ToolId::ALL)).unwrap();

    assert_eq!(
        registry.invoke(ToolId::SqlSchema, "customer").await,
        "sql_db_schema:customer"
    );
    assert_eq!(
        registry.invoke(ToolId::SqlSchema, "fail").await,
        "Error: asked to fail"
    );
}

#[tokio::test]
async fn test_invoke_by_name() {
    let registry = ToolRegistry::from_tools(echo_tools(&ToolId::ALL)).unwrap();

    assert_eq!(
        registry.invoke_by_name("sql_db_query", "SELECT 1").await,
        "sql_db_query:SELECT 1"
    );

    let observation = registry.invoke_by_name("run_shell", "ls").await;
    assert!(observation.starts_with("run_shell is not a valid tool, try one of [read_file, "));
    assert!(observation.ends_with("sql_db_query_checker]."));
}

#[test]
fn test_get() {
    let registry = ToolRegistry::from_tools(echo_tools(&ToolId::ALL)).unwrap();
    let tool = registry.get(ToolId::ListDirectory).unwrap();
    assert_eq!(tool.id(), ToolId::ListDirectory);
    assert_eq!(tool.description(), "echo");
}
