//! MCP tool implementations.
//!
//! - `query`: the `execute_snowflake_sql_query` tool handler
//! - `guard`: advisory detection of sensitive statements
//! - `format`: text rendering of execution outcomes

pub mod format;
pub mod guard;
pub mod query;

pub use format::format_outcome;
pub use query::{ExecuteQueryInput, QueryToolHandler};
