//! SQL tools bound to one database handle

use async_trait::async_trait;
use dbbot_db::statement::{ensure_read_only, row_cap, split_table_names};
use dbbot_db::{Database, DbError};
use std::sync::Arc;
use tracing::{debug, info};

use super::{strip_code_fence, Tool, ToolError, ToolId};

fn sql_argument(input: &str) -> Result<&str, ToolError> {
    let sql = strip_code_fence(input).trim_matches('"').trim();
    if sql.is_empty() {
        return Err(ToolError::InvalidInput("a SQL query is required".to_string()));
    }
    Ok(sql)
}

/// Runs a query and renders at most `top_k` rows
pub struct SqlQueryTool {
    db: Arc<dyn Database>,
    top_k: usize,
    read_only: bool,
}

impl SqlQueryTool {
    pub fn new(db: Arc<dyn Database>, top_k: usize, read_only: bool) -> Self {
        Self {
            db,
            top_k,
            read_only,
        }
    }
}

#[async_trait]
impl Tool for SqlQueryTool {
    fn id(&self) -> ToolId {
        ToolId::SqlQuery
    }

    fn description(&self) -> &str {
        "Input to this tool is a detailed and correct SQL query, output is a result from the \
         database. If the query is not correct, an error message will be returned; rewrite the \
         query, check it and try again. If you get an unknown column error, use sql_db_schema \
         to look up the correct table fields."
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let sql = sql_argument(input)?;
        if self.read_only {
            ensure_read_only(sql, self.db.dialect())?;
        }

        let max_rows = row_cap(sql, self.top_k);
        info!("running query (up to {} rows)", max_rows);
        debug!("{}", sql);
        let result = self.db.fetch(sql, max_rows).await?;
        Ok(result.to_text())
    }
}

/// Describes tables: `CREATE TABLE` sketch plus a few sample rows
pub struct SqlSchemaTool {
    db: Arc<dyn Database>,
    sample_rows: usize,
}

impl SqlSchemaTool {
    pub fn new(db: Arc<dyn Database>, sample_rows: usize) -> Self {
        Self { db, sample_rows }
    }
}

#[async_trait]
impl Tool for SqlSchemaTool {
    fn id(&self) -> ToolId {
        ToolId::SqlSchema
    }

    fn description(&self) -> &str {
        "Input to this tool is a comma-separated list of tables, output is the schema and \
         sample rows for those tables. Make sure the tables exist by calling \
         sql_db_list_tables first. Example input: table1, table2, table3"
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let requested = split_table_names(input);
        if requested.is_empty() {
            return Err(ToolError::InvalidInput(
                "a comma-separated list of table names is required".to_string(),
            ));
        }

        let known = self.db.list_tables().await?;
        let missing: Vec<&str> = requested
            .iter()
            .filter(|t| !known.contains(*t))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(DbError::UnknownTable(missing.join(", ")).into());
        }

        let mut sections = Vec::with_capacity(requested.len());
        for table in &requested {
            let schema = self.db.describe_table(table).await?;
            let mut section = schema.to_ddl();
            if self.sample_rows > 0 {
                let sample = self.db.sample_rows(table, self.sample_rows).await?;
                section.push_str(&format!(
                    "\n\n/*\n{} rows from {} table:\n{}\n*/",
                    self.sample_rows,
                    table,
                    sample.to_text()
                ));
            }
            sections.push(section);
        }
        Ok(sections.join("\n\n"))
    }
}

/// Names every user table
pub struct SqlListTablesTool {
    db: Arc<dyn Database>,
}

impl SqlListTablesTool {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for SqlListTablesTool {
    fn id(&self) -> ToolId {
        ToolId::SqlListTables
    }

    fn description(&self) -> &str {
        "Input is an empty string, output is a comma-separated list of tables in the database."
    }

    async fn execute(&self, _input: &str) -> Result<String, ToolError> {
        let tables = self.db.list_tables().await?;
        if tables.is_empty() {
            return Ok("(no tables)".to_string());
        }
        Ok(tables.join(", "))
    }
}

/// Checks a query without running it: read-only guard, then the planner
pub struct SqlQueryCheckerTool {
    db: Arc<dyn Database>,
    read_only: bool,
}

impl SqlQueryCheckerTool {
    pub fn new(db: Arc<dyn Database>, read_only: bool) -> Self {
        Self { db, read_only }
    }
}

#[async_trait]
impl Tool for SqlQueryCheckerTool {
    fn id(&self) -> ToolId {
        ToolId::SqlQueryChecker
    }

    fn description(&self) -> &str {
        "Use this tool to double check if your query is correct before executing it. \
         Always use this tool before executing a query with sql_db_query!"
    }

    async fn execute(&self, input: &str) -> Result<String, ToolError> {
        let sql = sql_argument(input)?;
        if self.read_only {
            ensure_read_only(sql, self.db.dialect())?;
        }
        self.db.explain(sql).await?;
        Ok(sql.to_string())
    }
}
