//! Common test utilities for DbBot CLI tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Variables that would leak the developer's setup into a test
const ENV_OVERRIDES: &[&str] = &[
    "DBBOT_API_KEY",
    "OPENAI_API_KEY",
    "OPENROUTER_API_KEY",
    "DBBOT_API_BASE",
    "DBBOT_MODEL",
    "DBBOT_DIALECT",
    "DBBOT_DATABASE_URI",
    "DBBOT_TOP_K",
    "RUST_LOG",
];

/// Isolated home directory for one test
pub struct TestEnv {
    pub temp_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            temp_dir: tempdir()?,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.temp_dir.path().join(".dbbot").join("config.json")
    }

    /// Command whose HOME and working directory are the temp dir
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_dbbot"));
        cmd.env("HOME", self.temp_dir.path());
        cmd.current_dir(self.temp_dir.path());
        for key in ENV_OVERRIDES {
            cmd.env_remove(key);
        }
        cmd
    }

    pub fn write_config(&self, json: &str) -> anyhow::Result<()> {
        let path = self.config_file();
        std::fs::create_dir_all(path.parent().expect("config dir"))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Small SQLite database with two tables
    pub fn create_sqlite(&self, name: &str) -> anyhow::Result<PathBuf> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

        let path = self.temp_dir.path().join(name);
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let options = SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await?;
            for stmt in [
                "CREATE TABLE artist (artist_id INTEGER PRIMARY KEY, name TEXT)",
                "CREATE TABLE album (album_id INTEGER PRIMARY KEY, artist_id INTEGER, title TEXT)",
                "INSERT INTO artist VALUES (1, 'AC/DC')",
            ] {
                sqlx::query(stmt).execute(&pool).await?;
            }
            pool.close().await;
            Ok::<_, sqlx::Error>(())
        })?;
        Ok(path)
    }
}
