//! Keeps file tools inside their root directory

use std::path::{Component, Path, PathBuf};

use super::ToolError;

/// Resolve `path` against `root` and make sure it stays inside it.
///
/// Relative paths are taken relative to `root`, `~/` expands to the home
/// directory. Existing paths are canonicalized so symlinks cannot lead
/// out; for a path that does not exist yet its parent is resolved instead.
pub async fn validate_root_path(path: &str, root: &Path) -> Result<PathBuf, ToolError> {
    let path = path.trim();
    let expanded = if path.starts_with('/') || path.starts_with('~') {
        expand_tilde(path)
    } else {
        root.join(path)
    };

    let absolute = if expanded.exists() {
        match tokio::fs::canonicalize(&expanded).await {
            Ok(p) => p,
            Err(_) => normalize(&std::env::current_dir()?.join(&expanded)),
        }
    } else {
        let parent = expanded.parent().filter(|p| !p.as_os_str().is_empty());
        match (parent, expanded.file_name()) {
            (Some(parent), Some(file_name)) => {
                let parent = if parent.exists() {
                    match tokio::fs::canonicalize(parent).await {
                        Ok(p) => p,
                        Err(_) => normalize(&std::env::current_dir()?.join(parent)),
                    }
                } else {
                    normalize(&std::env::current_dir()?.join(parent))
                };
                parent.join(file_name)
            }
            _ => normalize(&std::env::current_dir()?.join(&expanded)),
        }
    };

    let canonical_root = if root.exists() {
        tokio::fs::canonicalize(root)
            .await
            .unwrap_or_else(|_| root.to_path_buf())
    } else {
        root.to_path_buf()
    };

    if !is_within(&absolute, &canonical_root) {
        return Err(ToolError::AccessDenied(format!(
            "{} is outside {}",
            path,
            canonical_root.display()
        )));
    }

    Ok(absolute)
}

/// Component-wise prefix check
fn is_within(path: &Path, root: &Path) -> bool {
    let mut path_components = path.components();
    root.components()
        .all(|r| path_components.next().is_some_and(|p| p == r))
}

/// Fold `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_within() {
        let root = Path::new("/srv/dbbot");
        assert!(is_within(Path::new("/srv/dbbot/report.csv"), root));
        assert!(is_within(Path::new("/srv/dbbot/out/a.txt"), root));
        assert!(is_within(root, root));
        assert!(!is_within(Path::new("/srv/dbbot-other/a.txt"), root));
        assert!(!is_within(Path::new("/srv"), root));
        assert!(!is_within(Path::new("/etc/passwd"), root));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().expect("home dir");
        assert_eq!(expand_tilde("~/notes"), home.join("notes"));
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[tokio::test]
    async fn test_relative_path_resolves_under_root() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();

        let resolved = validate_root_path("a.txt", dir.path()).await.unwrap();
        assert_eq!(resolved, dir.path().join("a.txt").canonicalize().unwrap());
    }

    #[tokio::test]
    async fn test_new_file_under_root_is_allowed() {
        let dir = TempDir::new().unwrap();
        let resolved = validate_root_path("new.csv", dir.path()).await.unwrap();
        assert_eq!(resolved.file_name().unwrap(), "new.csv");
    }

    #[tokio::test]
    async fn test_traversal_is_denied() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(dir.path().join("secret.txt"), "s").unwrap();

        let err = validate_root_path("../secret.txt", &root).await.unwrap_err();
        assert!(matches!(err, ToolError::AccessDenied(_)));

        let err = validate_root_path("missing/../../x.txt", &root)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Access denied"));
    }

    #[tokio::test]
    async fn test_absolute_path_outside_is_denied() {
        let dir = TempDir::new().unwrap();
        let err = validate_root_path("/etc/hostname", dir.path()).await.unwrap_err();
        assert!(matches!(err, ToolError::AccessDenied(_)));
    }
}
