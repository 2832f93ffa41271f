//! Query-related data models.
//!
//! This module defines the request handed to the executor and the tagged
//! outcome it produces for the formatter.

use crate::db::Row;
use crate::error::ErrorKind;
use serde_json::Value as JsonValue;
use std::fmt;

/// Placeholder rendered for context values the session did not report.
pub const NOT_AVAILABLE: &str = "N/A";

/// A single statement plus optional per-call session overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    pub sql: String,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub warehouse: Option<String>,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }
}

/// Database, schema and warehouse a statement ran against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    pub database: String,
    pub schema: String,
    pub warehouse: String,
}

impl QueryContext {
    /// Build a context from optional values, substituting `N/A` for gaps.
    pub fn from_options(
        database: Option<&str>,
        schema: Option<&str>,
        warehouse: Option<&str>,
    ) -> Self {
        let or_na = |v: Option<&str>| v.unwrap_or(NOT_AVAILABLE).to_string();
        Self {
            database: or_na(database),
            schema: or_na(schema),
            warehouse: or_na(warehouse),
        }
    }

    /// Build a context from a `CURRENT_DATABASE(), CURRENT_SCHEMA(),
    /// CURRENT_WAREHOUSE()` row. Nulls and missing cells become `N/A`.
    pub fn from_row(row: &[JsonValue]) -> Self {
        let cell = |i: usize| row.get(i).and_then(context_value);
        Self::from_options(cell(0).as_deref(), cell(1).as_deref(), cell(2).as_deref())
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::from_options(None, None, None)
    }
}

fn context_value(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) if s.is_empty() => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// A statement that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySuccess {
    pub sql: String,
    pub columns: Vec<String>,
    /// Per column: right-align when rendering
    pub numeric_columns: Vec<bool>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub column_count: usize,
    /// Exact count, or `"<n>+"` when more rows existed than were fetched
    pub total_rows: String,
    pub truncated: bool,
    pub context: QueryContext,
    /// Set only for statements without a result set
    pub affected_rows: Option<u64>,
}

impl QuerySuccess {
    /// Result of a statement that produced rows.
    pub fn tabular(
        sql: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Row>,
        truncated: bool,
        context: QueryContext,
    ) -> Self {
        let row_count = rows.len();
        let total_rows = if truncated {
            format!("{row_count}+")
        } else {
            row_count.to_string()
        };
        Self {
            sql: sql.into(),
            column_count: columns.len(),
            numeric_columns: vec![false; columns.len()],
            columns,
            rows,
            row_count,
            total_rows,
            truncated,
            context,
            affected_rows: None,
        }
    }

    pub fn with_numeric_columns(mut self, numeric_columns: Vec<bool>) -> Self {
        self.numeric_columns = numeric_columns;
        self
    }

    /// Synthetic single-cell result for DML/DDL.
    pub fn statement(sql: impl Into<String>, affected_rows: u64, context: QueryContext) -> Self {
        let status = format!("Statement executed successfully. Rows affected: {affected_rows}");
        Self {
            sql: sql.into(),
            columns: vec!["status".to_string()],
            numeric_columns: vec![false],
            rows: vec![vec![JsonValue::String(status)]],
            row_count: 1,
            column_count: 1,
            total_rows: "1".to_string(),
            truncated: false,
            context,
            affected_rows: Some(affected_rows),
        }
    }
}

/// A statement that could not be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFailure {
    pub sql: String,
    pub kind: ErrorKind,
    /// Labelled message, e.g. `SQL Error: ...`
    pub message: String,
}

impl QueryFailure {
    pub fn new(sql: impl Into<String>, kind: ErrorKind, detail: impl fmt::Display) -> Self {
        Self {
            sql: sql.into(),
            kind,
            message: format!("{}: {}", kind.label(), detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success(QuerySuccess),
    Failure(QueryFailure),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn sql(&self) -> &str {
        match self {
            Self::Success(s) => &s.sql,
            Self::Failure(f) => &f.sql,
        }
    }
}
