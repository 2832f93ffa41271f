//! Data models for the Snowflake MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod query;

pub use query::{
    ExecutionOutcome, NOT_AVAILABLE, QueryContext, QueryFailure, QueryRequest, QuerySuccess,
};
