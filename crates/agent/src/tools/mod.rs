//! Agent toolkit
//!
//! Every tool takes the raw `Action Input` text and answers with an
//! observation. The set of tools is closed: each [`ToolId`] is registered
//! exactly once when the registry is built.

pub mod filesystem;
pub mod path_utils;
pub mod python;
pub mod sql;

pub use filesystem::{ListDirectoryTool, ReadFileTool, WriteFileTool};
pub use python::PythonReplTool;
pub use sql::{SqlListTablesTool, SqlQueryCheckerTool, SqlQueryTool, SqlSchemaTool};

use async_trait::async_trait;
use dbbot_db::{Database, DbError};
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{AgentError, Result};

/// Identity of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    ReadFile,
    WriteFile,
    ListDirectory,
    PythonRepl,
    SqlQuery,
    SqlSchema,
    SqlListTables,
    SqlQueryChecker,
}

impl ToolId {
    pub const ALL: [ToolId; 8] = [
        ToolId::ReadFile,
        ToolId::WriteFile,
        ToolId::ListDirectory,
        ToolId::PythonRepl,
        ToolId::SqlQuery,
        ToolId::SqlSchema,
        ToolId::SqlListTables,
        ToolId::SqlQueryChecker,
    ];

    /// Name the model uses in `Action:`
    pub fn name(&self) -> &'static str {
        match self {
            ToolId::ReadFile => "read_file",
            ToolId::WriteFile => "write_file",
            ToolId::ListDirectory => "list_directory",
            ToolId::PythonRepl => "python_repl",
            ToolId::SqlQuery => "sql_db_query",
            ToolId::SqlSchema => "sql_db_schema",
            ToolId::SqlListTables => "sql_db_list_tables",
            ToolId::SqlQueryChecker => "sql_db_query_checker",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|id| id.name() == name)
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tool failures; always rendered into an observation
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Database(#[from] DbError),

    #[error("{0}")]
    Execution(String),
}

/// A tool the agent can call
#[async_trait]
pub trait Tool: Send + Sync {
    fn id(&self) -> ToolId;
    fn description(&self) -> &str;
    async fn execute(&self, input: &str) -> std::result::Result<String, ToolError>;
}

/// Where and how `python_repl` runs code
#[derive(Debug, Clone)]
pub struct CodeSandbox {
    pub python: String,
    pub working_dir: PathBuf,
    /// No limit when unset
    pub timeout: Option<Duration>,
}

impl CodeSandbox {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            python: "python3".to_string(),
            working_dir: working_dir.into(),
            timeout: None,
        }
    }
}

/// Knobs of the SQL tools
#[derive(Debug, Clone, Copy)]
pub struct SqlToolSettings {
    pub top_k: usize,
    pub read_only: bool,
    pub sample_rows: usize,
}

impl Default for SqlToolSettings {
    fn default() -> Self {
        Self {
            top_k: 10,
            read_only: true,
            sample_rows: 3,
        }
    }
}

/// The fixed, validated tool set
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Build the full tool set over one database handle
    pub fn build(
        db: Arc<dyn Database>,
        filesystem_root: impl Into<PathBuf>,
        sandbox: CodeSandbox,
        sql: SqlToolSettings,
    ) -> Result<Self> {
        let root = filesystem_root.into();
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(ReadFileTool::new(root.clone())),
            Box::new(WriteFileTool::new(root.clone())),
            Box::new(ListDirectoryTool::new(root)),
            Box::new(PythonReplTool::new(sandbox)),
            Box::new(SqlQueryTool::new(db.clone(), sql.top_k, sql.read_only)),
            Box::new(SqlSchemaTool::new(db.clone(), sql.sample_rows)),
            Box::new(SqlListTablesTool::new(db.clone())),
            Box::new(SqlQueryCheckerTool::new(db, sql.read_only)),
        ];
        Self::from_tools(tools)
    }

    /// Assemble a registry, requiring every tool exactly once
    pub fn from_tools(tools: Vec<Box<dyn Tool>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.id()) {
                return Err(AgentError::Registry(format!(
                    "tool {} registered twice",
                    tool.id()
                )));
            }
        }
        if let Some(missing) = ToolId::ALL.iter().find(|id| !seen.contains(*id)) {
            return Err(AgentError::Registry(format!("tool {} is missing", missing)));
        }

        let mut tools = tools;
        tools.sort_by_key(|t| ToolId::ALL.iter().position(|id| *id == t.id()));
        Ok(Self { tools })
    }

    pub fn get(&self, id: ToolId) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.id() == id).map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.id().name()).collect()
    }

    /// Names joined for the prompt
    pub fn tool_names(&self) -> String {
        self.names().join(", ")
    }

    /// One `name: description` line per tool
    pub fn descriptions(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("{}: {}", t.id().name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Run a tool and turn any failure into an observation
    pub async fn invoke(&self, id: ToolId, input: &str) -> String {
        let Some(tool) = self.get(id) else {
            return self.invalid_tool_observation(id.name());
        };
        debug!("invoking {} with {:?}", id, input);
        match tool.execute(input).await {
            Ok(observation) => observation,
            Err(e) => {
                warn!("tool {} failed: {}", id, e);
                format!("Error: {}", e)
            }
        }
    }

    /// Resolve a tool by the name the model gave and run it
    pub async fn invoke_by_name(&self, name: &str, input: &str) -> String {
        match ToolId::from_name(name) {
            Some(id) => self.invoke(id, input).await,
            None => self.invalid_tool_observation(name),
        }
    }

    pub fn invalid_tool_observation(&self, name: &str) -> String {
        format!(
            "{} is not a valid tool, try one of [{}].",
            name.trim(),
            self.tool_names()
        )
    }
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z0-9_+-]*[ \t]*\n(.*?)\n?\s*```\s*$").expect("valid regex")
    })
}

/// Drop a surrounding markdown code fence, if any
pub(crate) fn strip_code_fence(input: &str) -> &str {
    match fence_re().captures(input).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => input.trim().trim_matches('`').trim(),
    }
}

/// Truncate on a char boundary, noting how much was dropped
pub(crate) fn truncate_output(text: String, max_len: usize) -> String {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n(output truncated: {} more bytes)",
        &text[..end],
        text.len() - end
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_id_names_round_trip() {
        for id in ToolId::ALL {
            assert_eq!(ToolId::from_name(id.name()), Some(id));
        }
        assert_eq!(ToolId::from_name(" sql_db_query "), Some(ToolId::SqlQuery));
        assert_eq!(ToolId::from_name("web_search"), None);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```python\nprint(1)\n```"), "print(1)");
        assert_eq!(strip_code_fence("```sql\nSELECT 1;\n```\n"), "SELECT 1;");
        assert_eq!(strip_code_fence("```\nx = 1\ny = 2\n```"), "x = 1\ny = 2");
        assert_eq!(strip_code_fence("  SELECT 1  "), "SELECT 1");
        assert_eq!(strip_code_fence("`SELECT 1`"), "SELECT 1");
    }

    #[test]
    fn test_truncate_output() {
        assert_eq!(truncate_output("short".to_string(), 10), "short");
        let out = truncate_output("ééééé".to_string(), 3);
        assert!(out.starts_with("é\n"));
        assert!(out.contains("8 more bytes"));
    }
}
