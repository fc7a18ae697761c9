//! File tools confined to a root directory

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::path_utils::validate_root_path;
use super::{Tool, ToolError, ToolId};

/// Input is either a bare path or `{"file_path": ...}`
fn path_argument(input: &str, key: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with('{') {
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(trimmed) {
            if let Some(serde_json::Value::String(path)) = map.get(key) {
                return path.clone();
            }
        }
    }
    trimmed.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn id(&self) -> ToolId {
        ToolId::ReadFile
    }

    fn description(&self) -> &str {
        "Read a file from disk. Input is the file path, relative to the working directory."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let file_path = path_argument(input, "file_path");
        if file_path.is_empty() {
            return Err(ToolError::InvalidInput("a file path is required".to_string()));
        }
        let path = validate_root_path(&file_path, &self.root).await?;

        debug!("reading {:?}", path);
        if !path.is_file() {
            return Err(ToolError::Execution(format!(
                "no such file: {}",
                file_path
            )));
        }
        Ok(tokio::fs::read_to_string(&path).await?)
    }
}

pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
struct WriteFileArgs {
    file_path: String,
    text: String,
    #[serde(default)]
    append: bool,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn id(&self) -> ToolId {
        ToolId::WriteFile
    }

    fn description(&self) -> &str {
        "Write text to a file on disk. Input is a JSON object with \"file_path\", \"text\" \
         and optionally \"append\": true to add to the end of an existing file."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let args: WriteFileArgs = serde_json::from_str(input.trim()).map_err(|e| {
            ToolError::InvalidInput(format!(
                "expected {{\"file_path\": ..., \"text\": ...}}: {}",
                e
            ))
        })?;
        let path = validate_root_path(&args.file_path, &self.root).await?;

        debug!("writing {} bytes to {:?}", args.text.len(), path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if args.append {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(args.text.as_bytes()).await?;
            file.flush().await?;
        } else {
            tokio::fs::write(&path, &args.text).await?;
        }
        Ok(format!("File written successfully to {}.", args.file_path))
    }
}

pub struct ListDirectoryTool {
    root: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn id(&self) -> ToolId {
        ToolId::ListDirectory
    }

    fn description(&self) -> &str {
        "List the files and directories in a folder. Input is the directory path; \
         leave it empty for the working directory."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let mut dir_path = path_argument(input, "dir_path");
        if dir_path.is_empty() {
            dir_path = ".".to_string();
        }
        let path = validate_root_path(&dir_path, &self.root).await?;

        debug!("listing {:?}", path);
        if !path.is_dir() {
            return Err(ToolError::Execution(format!(
                "no such directory: {}",
                dir_path
            )));
        }
        let mut entries = tokio::fs::read_dir(&path).await?;
        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await?.is_dir() {
                name.push('/');
            }
            items.push(name);
        }
        items.sort();
        if items.is_empty() {
            Ok(format!("No files found in directory {}", dir_path))
        } else {
            Ok(items.join("\n"))
        }
    }
}
