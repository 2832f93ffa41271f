//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Driver traits (`Connector` / `Connection` / `Cursor`) mirroring the
//!   classic connect → cursor → execute → fetch lifecycle
//! - Credential resolution for password, key-pair and delegated logins
//! - The Snowflake driver speaking the session REST protocol
//! - Query execution with row capping and outcome classification

pub mod credentials;
pub mod executor;
pub mod snowflake;

pub use credentials::{ConnectionParams, Credential, CredentialLoader};
pub use executor::QueryExecutor;
pub use snowflake::SnowflakeConnector;

use crate::error::DbResult;
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// One result row, positionally aligned with the cursor description.
pub type Row = Vec<JsonValue>;

/// Type names right-aligned when rendered.
const NUMERIC_TYPES: &[&str] = &[
    "fixed", "real", "number", "decimal", "numeric", "int", "integer", "bigint", "smallint",
    "float", "double",
];

/// Column metadata from a described result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    /// Database-specific type (e.g. "fixed", "text", "timestamp_ntz")
    pub type_name: String,
    pub nullable: bool,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }

    /// Whether the column holds numbers, whatever the JSON encoding of its cells.
    pub fn is_numeric(&self) -> bool {
        NUMERIC_TYPES
            .iter()
            .any(|t| self.type_name.eq_ignore_ascii_case(t))
    }
}

/// Opens connections from fully resolved parameters.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &ConnectionParams) -> DbResult<Box<dyn Connection>>;
}

/// An open database session, owned by a single tool call.
#[async_trait]
pub trait Connection: Send {
    async fn cursor(&mut self) -> DbResult<Box<dyn Cursor>>;

    async fn close(&mut self) -> DbResult<()>;
}

/// Statement handle scoped to one connection.
#[async_trait]
pub trait Cursor: Send {
    /// Execute a statement verbatim, replacing any previous result.
    async fn execute(&mut self, sql: &str) -> DbResult<()>;

    /// Columns of the current result, or `None` when the statement produced
    /// no result set (DML/DDL).
    fn description(&self) -> Option<&[ColumnDescription]>;

    /// Affected or produced row count; negative when unknown.
    fn rowcount(&self) -> i64;

    /// Fetch up to `size` rows.
    async fn fetch_many(&mut self, size: usize) -> DbResult<Vec<Row>>;

    async fn fetch_one(&mut self) -> DbResult<Option<Row>>;

    async fn close(&mut self) -> DbResult<()>;
}
