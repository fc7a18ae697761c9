use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{json, Value};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::str::FromStr;
use tracing::debug;

use crate::{
    bytes_value, connection_error, decimal_value, ColumnInfo, Database, DbError, Dialect,
    ForeignKey, QueryResult, Result, TableSchema,
};

pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    /// `read_only` starts every session with `default_transaction_read_only`
    pub async fn connect(url: &str, read_only: bool) -> Result<Self> {
        let mut connect_options = PgConnectOptions::from_str(url).map_err(connection_error)?;
        if read_only {
            connect_options = connect_options.options([("default_transaction_read_only", "on")]);
        }
        let pool = PgPoolOptions::new()
            .max_connections(4)
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

fn decode_cell(row: &PgRow, idx: usize) -> Value {
    let Ok(raw) = row.try_get_raw(idx) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    let type_name = raw.type_info().name().to_string();

    let decoded = match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(idx).map(Value::from),
        "INT2" => row.try_get::<i16, _>(idx).map(Value::from),
        "INT4" => row.try_get::<i32, _>(idx).map(Value::from),
        "INT8" => row.try_get::<i64, _>(idx).map(Value::from),
        "FLOAT4" => row.try_get::<f32, _>(idx).map(Value::from),
        "FLOAT8" => row.try_get::<f64, _>(idx).map(Value::from),
        "NUMERIC" => row
            .try_get::<rust_decimal::Decimal, _>(idx)
            .map(decimal_value),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(idx)
            .map(|v| json!(v.to_string())),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(idx)
            .map(|v| json!(v.format("%Y-%m-%d").to_string())),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(idx)
            .map(|v| json!(v.to_string())),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .map(|v| json!(v.format("%Y-%m-%dT%H:%M:%S").to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
            .map(|v| json!(v.to_rfc3339())),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx),
        "BYTEA" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|v| bytes_value(&v)),
        _ => row.try_get::<String, _>(idx).map(Value::String),
    };

    decoded.unwrap_or_else(|_| Value::String(format!("<{}>", type_name.to_lowercase())))
}

#[async_trait]
impl Database for PostgresDatabase {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSql
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = current_schema()
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
        let columns = sqlx::query(
            r#"SELECT column_name::text, data_type::text, (is_nullable = 'YES') AS nullable
            FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name = $1
            ORDER BY ordinal_position"#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        if columns.is_empty() {
            return Err(DbError::UnknownTable(table.to_string()));
        }

        let columns = columns
            .iter()
            .map(|r| {
                Ok(ColumnInfo {
                    name: r.try_get(0)?,
                    data_type: r.try_get(1)?,
                    nullable: r.try_get(2)?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        let fk_rows = sqlx::query(
            r#"SELECT kcu.column_name::text, ccu.table_name::text, ccu.column_name::text
            FROM information_schema.table_constraints AS tc
            JOIN information_schema.key_column_usage AS kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage AS ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
              AND tc.table_schema = current_schema()
              AND tc.table_name = $1"#,
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
        debug!("postgres fetch (max {} rows): {}", max_rows, sql);
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
