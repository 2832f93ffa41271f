//! Query execution tool.
//!
//! This module implements the `execute_snowflake_sql_query` MCP tool. Any
//! statement is accepted; sensitive ones are only flagged in the log.

use crate::db::QueryExecutor;
use crate::models::QueryRequest;
use crate::tools::format::format_outcome;
use crate::tools::guard::flag_sensitive;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

/// Characters of the statement included in log lines.
const LOGGED_QUERY_CHARS: usize = 50;

pub const EMPTY_QUERY_MESSAGE: &str = "Error: Query cannot be empty";

/// Input for the query tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ExecuteQueryInput {
    /// The SQL query to execute (required)
    pub query: String,
    /// Override the default database (optional)
    #[serde(default)]
    pub database: Option<String>,
    /// Override the default schema (optional)
    #[serde(default)]
    pub schema: Option<String>,
    /// Override the default warehouse (optional)
    #[serde(default)]
    pub warehouse: Option<String>,
}

/// Shorten a statement for logging, marking the cut with `...`.
pub fn log_preview(sql: &str) -> String {
    let mut chars = sql.chars();
    let head: String = chars.by_ref().take(LOGGED_QUERY_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Handler for query execution.
pub struct QueryToolHandler {
    executor: QueryExecutor,
}

impl QueryToolHandler {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    /// Handle the tool call, always producing a text report.
    pub async fn execute_query(&self, input: ExecuteQueryInput) -> String {
        let sql = input.query.trim();
        if sql.is_empty() {
            return EMPTY_QUERY_MESSAGE.to_string();
        }

        flag_sensitive(sql);
        info!(query = %log_preview(&input.query), "Executing query");

        let request = QueryRequest {
            sql: sql.to_string(),
            database: input.database,
            schema: input.schema,
            warehouse: input.warehouse,
        };

        let outcome = self.executor.execute(&request).await;
        format_outcome(&outcome)
    }
}
