use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{json, Value};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Executor, Row, TypeInfo, ValueRef};
use tracing::debug;

use crate::{
    bytes_value, connection_error, decimal_value, ColumnInfo, Database, DbError, Dialect,
    ForeignKey, QueryResult, Result, TableSchema,
};

pub struct MySqlDatabase {
    pool: MySqlPool,
}

impl MySqlDatabase {
    /// `read_only` marks every pooled session `TRANSACTION READ ONLY`
    pub async fn connect(url: &str, read_only: bool) -> Result<Self> {
        let mut options = MySqlPoolOptions::new().max_connections(4);
        if read_only {
            options = options.after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET SESSION TRANSACTION READ ONLY").await?;
                    Ok(())
                })
            });
        }
        let pool = options
            .connect(url)
            .await
            .map_err(connection_error)?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(connection_error)?;
        Ok(Self { pool })
    }
}

fn decode_cell(row: &MySqlRow, idx: usize) -> Value {
    let Ok(raw) = row.try_get_raw(idx) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    let type_name = raw.type_info().name().to_string();

    let decoded = match type_name.as_str() {
        "BOOLEAN" => row.try_get::<bool, _>(idx).map(Value::from),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<i64, _>(idx).map(Value::from)
        }
        t if t.ends_with(" UNSIGNED") => row.try_get::<u64, _>(idx).map(Value::from),
        "FLOAT" => row.try_get::<f32, _>(idx).map(Value::from),
        "DOUBLE" => row.try_get::<f64, _>(idx).map(Value::from),
        "DECIMAL" => row
            .try_get::<rust_decimal::Decimal, _>(idx)
            .map(decimal_value),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(idx)
            .map(|v| json!(v.format("%Y-%m-%d").to_string())),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(idx)
            .map(|v| json!(v.to_string())),
        "DATETIME" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .map(|v| json!(v.format("%Y-%m-%dT%H:%M:%S").to_string())),
        "TIMESTAMP" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
            .map(|v| json!(v.to_rfc3339())),
        "JSON" => row.try_get::<Value, _>(idx),
        _ => row.try_get::<String, _>(idx).map(Value::String),
    };

    decoded
        .or_else(|_| row.try_get::<Vec<u8>, _>(idx).map(|v| bytes_value(&v)))
        .unwrap_or_else(|_| Value::String(format!("<{}>", type_name.to_lowercase())))
}

#[async_trait]
impl Database for MySqlDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"SELECT CAST(table_name AS CHAR)
            FROM information_schema.tables
            WHERE table_schema = DATABASE()
              AND table_type = 'BASE TABLE'
            ORDER BY table_name"#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| r.try_get::<String, _>(0).map_err(DbError::from))
            .collect()
    }

    async fn describe_table(&self, table: &str) -> Result<TableSchema> {
        let rows = sqlx::query(
            r#"SELECT CAST(column_name AS CHAR), CAST(column_type AS CHAR), CAST(is_nullable AS CHAR)
            FROM information_schema.columns
            WHERE table_schema = DATABASE()
              AND table_name = ?
            ORDER BY ordinal_position"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(DbError::UnknownTable(table.to_string()));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for r in &rows {
            let nullable: String = r.try_get(2)?;
            columns.push(ColumnInfo {
                name: r.try_get(0)?,
                data_type: r.try_get(1)?,
                nullable: nullable.eq_ignore_ascii_case("YES"),
            });
        }

        let fk_rows = sqlx::query(
            r#"SELECT CAST(column_name AS CHAR),
                      CAST(referenced_table_name AS CHAR),
                      CAST(referenced_column_name AS CHAR)
            FROM information_schema.key_column_usage
            WHERE table_schema = DATABASE()
              AND table_name = ?
              AND referenced_table_name IS NOT NULL
            ORDER BY ordinal_position"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        let foreign_keys = fk_rows
            .iter()
            .map(|r| {
                Ok(ForeignKey {
                    column: r.try_get(0)?,
                    referenced_table: r.try_get(1)?,
                    referenced_column: r.try_get(2)?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        Ok(TableSchema {
            name: table.to_string(),
            columns,
            foreign_keys,
        })
    }

    async fn fetch(&self, sql: &str, max_rows: usize) -> Result<QueryResult> {
        debug!("mysql fetch (max {} rows): {}", max_rows, sql);
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
