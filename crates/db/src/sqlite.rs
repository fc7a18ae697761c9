use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::str::FromStr;
use tracing::debug;

use crate::{
    bytes_value, connection_error, ColumnInfo, Database, DbError, Dialect, ForeignKey,
    QueryResult, Result, TableSchema,
};

pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// `read_only` opens the file with `SQLITE_OPEN_READONLY`
    pub async fn connect(url: &str, read_only: bool) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(url)
            .map_err(connection_error)?
            .read_only(read_only);

        // An in-memory database lives only as long as its single connection.
        let options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = options
            .connect_with(connect_options)
            .await
            .map_err(connection_error)?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(connection_error)?;
        Ok(Self { pool })
    }
}

fn decode_cell(row: &SqliteRow, idx: usize) -> Value {
    let Ok(raw) = row.try_get_raw(idx) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    // Storage class of the value itself, not the declared column type
    let type_name = raw.type_info().name().to_string();

    let decoded = match type_name.as_str() {
        "INTEGER" => row.try_get::<i64, _>(idx).map(Value::from),
        "REAL" => row.try_get::<f64, _>(idx).map(Value::from),
        "BOOLEAN" => row.try_get::<bool, _>(idx).map(Value::from),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|v| bytes_value(&v)),
        _ => row.try_get::<String, _>(idx).map(Value::String),
    };

    decoded.unwrap_or_else(|_| Value::String(format!("<{}>", type_name.to_lowercase())))
}

#[async_trait]
impl Database for SqliteDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| r.try_get::<String, _>(0).map_err(DbError::from))
            .collect()
    }

    async fn describe_table(&self, table: &str) -> Result<TableSchema> {
        let rows = sqlx::query(r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?1)"#)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Err(DbError::UnknownTable(table.to_string()));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for r in &rows {
            let not_null: i64 = r.try_get(2)?;
            let pk: i64 = r.try_get(3)?;
            let data_type: String = r.try_get(1)?;
            columns.push(ColumnInfo {
                name: r.try_get(0)?,
                data_type: if data_type.is_empty() {
                    "ANY".to_string()
                } else {
                    data_type
                },
                nullable: not_null == 0 && pk == 0,
            });
        }

        let fk_rows =
            sqlx::query(r#"SELECT "from", "table", "to" FROM pragma_foreign_key_list(?1)"#)
                .bind(table)
                .fetch_all(&self.pool)
                .await?;

        let mut foreign_keys = Vec::with_capacity(fk_rows.len());
        for r in &fk_rows {
            let referenced_column: Option<String> = r.try_get(2)?;
            foreign_keys.push(ForeignKey {
                column: r.try_get(0)?,
                referenced_table: r.try_get(1)?,
                referenced_column: referenced_column.unwrap_or_default(),
            });
        }

        Ok(TableSchema {
            name: table.to_string(),
            columns,
            foreign_keys,
        })
    }

    async fn fetch(&self, sql: &str, max_rows: usize) -> Result<QueryResult> {
        debug!("sqlite fetch (max {} rows): {}", max_rows, sql);
        let mut stream = sqlx::query(sql).fetch(&self.pool);
        let mut result = QueryResult::default();

        while let Some(row) = stream.try_next().await? {
            if result.columns.is_empty() {
                result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
            }
            if result.rows.len() >= max_rows {
                result.truncated = true;
                break;
            }
            result
                .rows
                .push((0..row.len()).map(|i| decode_cell(&row, i)).collect());
        }

        Ok(result)
    }
}
