//! File tools inside and outside their root

use dbbot_agent::tools::{ListDirectoryTool, ReadFileTool, WriteFileTool};
use dbbot_agent::{Tool, ToolError};
use tempfile::TempDir;

#[tokio::test]
async fn test_write_then_read() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    let write = WriteFileTool::new(root.clone());
    let read = ReadFileTool::new(root);

    let result = write
        .execute(r#"{"file_path": "report.csv", "text": "country,sales\nUSA,40.5\n"}"#)
        .await
        .unwrap();
    assert_eq!(result, "File written successfully to report.csv.");

    let content = read.execute("report.csv").await.unwrap();
    assert_eq!(content, "country,sales\nUSA,40.5\n");
}

#[tokio::test]
async fn test_write_append() {
    let dir = TempDir::new().unwrap();
    let write = WriteFileTool::new(dir.path().to_path_buf());

    write
        .execute(r#"{"file_path": "log.txt", "text": "one\n"}"#)
        .await
        .unwrap();
    write
        .execute(r#"{"file_path": "log.txt", "text": "two\n", "append": true}"#)
        .await
        .unwrap();

    let content = std::fs::read_to_string(dir.path().join("log.txt")).unwrap();
    assert_eq!(content, "one\ntwo\n");
}

#[tokio::test]
async fn test_write_overwrites_by_default() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "old").unwrap();
    let write = WriteFileTool::new(dir.path().to_path_buf());

    write
        .execute(r#"{"file_path": "a.txt", "text": "new"}"#)
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "new");
}

#[tokio::test]
async fn test_write_requires_json() {
    let dir = TempDir::new().unwrap();
    let write = WriteFileTool::new(dir.path().to_path_buf());

    let err = write.execute("a.txt hello").await.unwrap_err();
    assert!(matches!(err, ToolError::InvalidInput(_)));
}

#[tokio::test]
async fn test_read_accepts_json_argument() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
    let read = ReadFileTool::new(dir.path().to_path_buf());

    assert_eq!(
        read.execute(r#"{"file_path": "notes.txt"}"#).await.unwrap(),
        "hi"
    );
}

#[tokio::test]
async fn test_read_missing_file() {
    let dir = TempDir::new().unwrap();
    let read = ReadFileTool::new(dir.path().to_path_buf());

    let err = read.execute("nope.txt").await.unwrap_err();
    assert_eq!(err.to_string(), "no such file: nope.txt");
}

#[tokio::test]
async fn test_read_outside_root_is_denied() {
    let dir = TempDir::new().unwrap();
    let inner = dir.path().join("inner");
    std::fs::create_dir(&inner).unwrap();
    std::fs::write(dir.path().join("secret.txt"), "s3cret").unwrap();
    let read = ReadFileTool::new(inner);

    let err = read.execute("../secret.txt").await.unwrap_err();
    assert!(matches!(err, ToolError::AccessDenied(_)));
    assert!(err.to_string().starts_with("Access denied: ../secret.txt is outside"));

    let err = read.execute("/etc/passwd").await.unwrap_err();
    assert!(matches!(err, ToolError::AccessDenied(_)));
}

#[tokio::test]
async fn test_write_outside_root_is_denied() {
    let dir = TempDir::new().unwrap();
    let inner = dir.path().join("inner");
    std::fs::create_dir(&inner).unwrap();
    let write = WriteFileTool::new(inner);

    let err = write
        .execute(r#"{"file_path": "../escape.txt", "text": "x"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::AccessDenied(_)));
    assert!(!dir.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_list_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("b.csv"), "").unwrap();
    std::fs::write(dir.path().join("a.txt"), "").unwrap();
    std::fs::create_dir(dir.path().join("charts")).unwrap();
    let list = ListDirectoryTool::new(dir.path().to_path_buf());

    assert_eq!(list.execute("").await.unwrap(), "a.txt\nb.csv\ncharts/");
    assert_eq!(list.execute(".").await.unwrap(), "a.txt\nb.csv\ncharts/");
}

#[tokio::test]
async fn test_list_empty_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("empty")).unwrap();
    let list = ListDirectoryTool::new(dir.path().to_path_buf());

    assert_eq!(
        list.execute("empty").await.unwrap(),
        "No files found in directory empty"
    );
}

#[tokio::test]
async fn test_list_missing_directory() {
    let dir = TempDir::new().unwrap();
    let list = ListDirectoryTool::new(dir.path().to_path_buf());

    let err = list.execute("missing").await.unwrap_err();
    assert!(matches!(err, ToolError::Execution(_)));
}
