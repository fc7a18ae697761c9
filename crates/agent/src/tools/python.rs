//! Python code execution

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{strip_code_fence, truncate_output, CodeSandbox, Tool, ToolError, ToolId};

const MAX_OUTPUT_LEN: usize = 10_000;

/// Runs a snippet with the configured interpreter inside the sandbox directory
pub struct PythonReplTool {
    sandbox: CodeSandbox,
}

impl PythonReplTool {
    pub fn new(sandbox: CodeSandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for PythonReplTool {
    fn id(&self) -> ToolId {
        ToolId::PythonRepl
    }

    fn description(&self) -> &str {
        "A Python shell. Use this to execute python commands. Input should be valid python \
         code. To see the value of something, print it out with `print(...)`."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let code = strip_code_fence(input);
        let code = code.strip_prefix("python\n").unwrap_or(code);
        if code.trim().is_empty() {
            return Err(ToolError::InvalidInput("no code to run".to_string()));
        }

        debug!("running python ({} bytes)", code.len());
        let mut cmd = Command::new(&self.sandbox.python);
        cmd.arg("-c")
            .arg(code)
            .current_dir(&self.sandbox.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.sandbox.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(ToolError::Execution(format!(
                        "execution timed out after {} seconds",
                        limit.as_secs()
                    )))
                }
            },
            None => cmd.output().await,
        }
        .map_err(|e| {
            ToolError::Execution(format!(
                "could not start {}: {}",
                self.sandbox.python, e
            ))
        })?;

        let mut parts = Vec::new();
        if !output.stdout.is_empty() {
            parts.push(String::from_utf8_lossy(&output.stdout).to_string());
        }
        if !output.stderr.is_empty() {
            parts.push(String::from_utf8_lossy(&output.stderr).to_string());
        }
        if !output.status.success() && parts.is_empty() {
            parts.push(format!(
                "exit code {}",
                output.status.code().unwrap_or(-1)
            ));
        }

        let text = if parts.is_empty() {
            "(no output)".to_string()
        } else {
            parts.join("\n")
        };
        Ok(truncate_output(text, MAX_OUTPUT_LEN))
    }
}
