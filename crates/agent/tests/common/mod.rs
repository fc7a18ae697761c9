//! Shared fixtures: a small shop database and a scripted language model

#![allow(dead_code)]

use async_trait::async_trait;
use dbbot_agent::{CodeSandbox, SqlToolSettings, ToolRegistry};
use dbbot_db::{ConnectionDescriptor, Database, Dialect};
use dbbot_provider::{ChatParams, ChatResponse, Provider};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const TOP_5_SQL: &str = "SELECT c.country AS Country, SUM(i.total) AS Sales \
FROM customer c JOIN invoice i ON c.customer_id = i.customer_id \
GROUP BY Country ORDER BY Sales DESC LIMIT 5;";

const SHOP: &[&str] = &[
    "CREATE TABLE customer (
        customer_id INTEGER PRIMARY KEY,
        first_name TEXT NOT NULL,
        country TEXT NOT NULL
    )",
    "CREATE TABLE invoice (
        invoice_id INTEGER PRIMARY KEY,
        customer_id INTEGER NOT NULL REFERENCES customer (customer_id),
        total REAL NOT NULL
    )",
    "INSERT INTO customer VALUES
        (1, 'Frank', 'USA'),
        (2, 'Jack', 'USA'),
        (3, 'François', 'Canada'),
        (4, 'Camille', 'France'),
        (5, 'Luís', 'Brazil'),
        (6, 'Leonie', 'Germany'),
        (7, 'Bjørn', 'Norway'),
        (8, 'Manoj', 'India')",
    "INSERT INTO invoice VALUES
        (1, 1, 20.25),
        (2, 2, 20.25),
        (3, 3, 30.0),
        (4, 4, 25.5),
        (5, 5, 12.75),
        (6, 6, 10.0),
        (7, 7, 5.25),
        (8, 8, 2.5)",
];

async fn create_shop(path: &Path) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("create shop db");
    for stmt in SHOP {
        sqlx::query(stmt).execute(&pool).await.expect("shop fixture");
    }
    pool.close().await;
}

/// Temp dir holding `shop.db` and a connected handle
pub struct Shop {
    pub dir: TempDir,
    pub db: Arc<dyn Database>,
}

impl Shop {
    pub async fn open() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("shop.db");
        create_shop(&path).await;

        let descriptor =
            ConnectionDescriptor::new(Dialect::Sqlite, path.to_string_lossy().to_string())
                .expect("descriptor");
        let db = dbbot_db::connect(&descriptor).await.expect("connect");
        Self { dir, db }
    }

    pub fn registry(&self) -> ToolRegistry {
        self.registry_with(SqlToolSettings::default())
    }

    pub fn registry_with(&self, sql: SqlToolSettings) -> ToolRegistry {
        ToolRegistry::build(
            self.db.clone(),
            self.dir.path(),
            CodeSandbox::new(self.dir.path()),
            sql,
        )
        .expect("registry")
    }
}

/// Replays canned completions and records every request
pub struct ScriptedProvider {
    script: Mutex<VecDeque<String>>,
    fallback: String,
    requests: Arc<Mutex<Vec<ChatParams>>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(script: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(script.into_iter().map(Into::into).collect()),
            fallback: "I am not sure what to do.".to_string(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answers every request with the same completion
    pub fn repeating(text: impl Into<String>) -> Self {
        let mut provider = Self::new(Vec::<String>::new());
        provider.fallback = text.into();
        provider
    }

    pub fn requests(&self) -> Arc<Mutex<Vec<ChatParams>>> {
        self.requests.clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(&self, params: ChatParams) -> dbbot_provider::Result<ChatResponse> {
        self.requests.lock().unwrap().push(params);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Ok(ChatResponse::text(next))
    }

    fn default_model(&self) -> String {
        "scripted".to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Content of the last message of a request
pub fn last_message(params: &ChatParams) -> &str {
    params
        .messages
        .last()
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}

pub fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
