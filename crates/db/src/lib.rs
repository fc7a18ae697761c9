//! Database connector
//!
//! Wraps a dialect and connection string into a live handle used by the SQL
//! tools: table listing, schema introspection, sample rows, bounded queries
//! and query planning.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub mod statement;

pub use mysql::MySqlDatabase;
pub use postgres::PostgresDatabase;
pub use sqlite::SqliteDatabase;

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("{0}")]
    Query(#[from] sqlx::Error),

    #[error("table_names {{{0}}} not found in database")]
    UnknownTable(String),

    #[error("statement rejected: {0}")]
    Rejected(String),

    #[error("invalid connection settings: {0}")]
    Descriptor(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "postgres")]
    PostgreSql,
    MySql,
    Sqlite,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::PostgreSql, Dialect::MySql, Dialect::Sqlite];

    /// Name used in prompts
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::PostgreSql => "postgresql",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Human-facing label
    pub fn label(&self) -> &'static str {
        match self {
            Dialect::PostgreSql => "PostgreSQL",
            Dialect::MySql => "MySQL",
            Dialect::Sqlite => "SQLite",
        }
    }

    /// URL scheme understood by the driver
    pub fn scheme(&self) -> &'static str {
        match self {
            Dialect::PostgreSql => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Example connection string shown to users
    pub fn placeholder(&self) -> &'static str {
        match self {
            Dialect::PostgreSql => "postgres:postgres@localhost:5432/pagila",
            Dialect::MySql => "root:password@localhost:3306/classicmodels",
            Dialect::Sqlite => "./chinook.db",
        }
    }

    /// Quote an identifier for this dialect
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
            Dialect::PostgreSql | Dialect::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Statement prefix that plans a query without running it
    pub fn explain_prefix(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "EXPLAIN QUERY PLAN",
            Dialect::PostgreSql | Dialect::MySql => "EXPLAIN",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Dialect {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(Dialect::PostgreSql),
            "mysql" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(DbError::Descriptor(format!(
                "unknown dialect '{}', expected one of postgresql, mysql, sqlite",
                other
            ))),
        }
    }
}

/// Dialect plus connection string; immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    dialect: Dialect,
    uri: String,
    read_only: bool,
}

impl ConnectionDescriptor {
    pub fn new(dialect: Dialect, uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into().trim().to_string();
        if uri.is_empty() {
            return Err(DbError::Descriptor("connection uri is empty".to_string()));
        }
        Ok(Self {
            dialect,
            uri,
            read_only: false,
        })
    }

    /// Ask the server to refuse writes on every pooled connection
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Parse both parts from user input
    pub fn parse(dialect: &str, uri: &str) -> Result<Self> {
        Self::new(dialect.parse()?, uri)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Full driver URL; a uri that already names a scheme is used as-is
    pub fn url(&self) -> String {
        let has_scheme = self.uri.contains("://")
            || (self.dialect == Dialect::Sqlite && self.uri.starts_with("sqlite:"));
        if has_scheme {
            self.uri.clone()
        } else {
            format!("{}://{}", self.dialect.scheme(), self.uri)
        }
    }

    /// URL with any password replaced, for logs and status output
    pub fn redacted_url(&self) -> String {
        let url = self.url();
        let Some(scheme_end) = url.find("://") else {
            return url;
        };
        let rest = &url[scheme_end + 3..];
        let Some(at) = rest.rfind('@') else {
            return url;
        };
        let creds = &rest[..at];
        match creds.find(':') {
            Some(colon) => format!(
                "{}://{}:****{}",
                &url[..scheme_end],
                &creds[..colon],
                &rest[at..]
            ),
            None => url,
        }
    }
}

/// One column of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Foreign key from a column of this table to another table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Shape of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    /// `CREATE TABLE` sketch of the table
    pub fn to_ddl(&self) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let null = if c.nullable { "" } else { " NOT NULL" };
                format!("\t{} {}{}", c.name, c.data_type.to_uppercase(), null)
            })
            .collect();
        for fk in &self.foreign_keys {
            lines.push(format!(
                "\tFOREIGN KEY({}) REFERENCES {} ({})",
                fk.column, fk.referenced_table, fk.referenced_column
            ));
        }
        format!("CREATE TABLE {} (\n{}\n)", self.name, lines.join(", \n"))
    }
}

/// Rows returned by a query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// More rows were available than the fetch limit allowed
    #[serde(default)]
    pub truncated: bool,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Tab-separated rendering with a header line
    pub fn to_text(&self) -> String {
        if self.rows.is_empty() {
            return "(no rows)".to_string();
        }
        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        if !self.columns.is_empty() {
            lines.push(self.columns.join("\t"));
        }
        for row in &self.rows {
            lines.push(
                row.iter()
                    .map(render_cell)
                    .collect::<Vec<_>>()
                    .join("\t"),
            );
        }
        if self.truncated {
            lines.push(format!(
                "(showing the first {} rows; more rows matched)",
                self.rows.len()
            ));
        }
        lines.join("\n")
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A live database handle
#[async_trait]
pub trait Database: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// User tables, sorted by name
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns and foreign keys of one table
    async fn describe_table(&self, table: &str) -> Result<TableSchema>;

    /// Run a query, keeping at most `max_rows` rows
    async fn fetch(&self, sql: &str, max_rows: usize) -> Result<QueryResult>;

    /// First rows of a table
    async fn sample_rows(&self, table: &str, limit: usize) -> Result<QueryResult> {
        let sql = format!(
            "SELECT * FROM {} LIMIT {}",
            self.dialect().quote_ident(table),
            limit
        );
        self.fetch(&sql, limit).await
    }

    /// Ask the database to plan the statement without running it
    async fn explain(&self, sql: &str) -> Result<()> {
        let sql = format!("{} {}", self.dialect().explain_prefix(), sql);
        self.fetch(&sql, 0).await.map(|_| ())
    }
}

/// Open and verify a connection for the descriptor
pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Arc<dyn Database>> {
    let url = descriptor.url();
    let read_only = descriptor.read_only();
    info!(
        "connecting to {} database at {}{}",
        descriptor.dialect(),
        descriptor.redacted_url(),
        if read_only { " (read-only)" } else { "" }
    );

    let db: Arc<dyn Database> = match descriptor.dialect() {
        Dialect::PostgreSql => Arc::new(PostgresDatabase::connect(&url, read_only).await?),
        Dialect::MySql => Arc::new(MySqlDatabase::connect(&url, read_only).await?),
        Dialect::Sqlite => Arc::new(SqliteDatabase::connect(&url, read_only).await?),
    };
    Ok(db)
}

/// Map a driver error raised while connecting
pub(crate) fn connection_error(err: sqlx::Error) -> DbError {
    DbError::Connection(err.to_string())
}

/// Decimal as a JSON number when it fits, text otherwise
pub(crate) fn decimal_value(d: rust_decimal::Decimal) -> Value {
    d.to_string()
        .parse::<serde_json::Number>()
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(d.to_string()))
}

/// Placeholder for binary cells
pub(crate) fn bytes_value(bytes: &[u8]) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(s) => Value::String(s.to_string()),
        Err(_) => Value::String(format!("<{} bytes>", bytes.len())),
    }
}
