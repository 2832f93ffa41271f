//! Snowflake MCP Server Library
//!
//! This library provides an MCP (Model Context Protocol) tool that lets AI
//! assistants run SQL against a Snowflake account and read back a formatted
//! text report.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::{Config, SnowflakeConfig};
pub use error::{ConfigError, DbError};
pub use mcp::SnowflakeService;
