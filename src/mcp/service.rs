//! MCP service implementation using rmcp.
//!
//! This module defines the SnowflakeService struct exposing the query tool
//! via the MCP protocol using the rmcp framework's macros.

use crate::tools::query::{ExecuteQueryInput, QueryToolHandler};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

pub const TOOL_NAME: &str = "execute_snowflake_sql_query";

#[derive(Clone)]
pub struct SnowflakeService {
    /// Shared handler; holds the executor and immutable configuration
    handler: Arc<QueryToolHandler>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl SnowflakeService {
    pub fn new(handler: Arc<QueryToolHandler>) -> Self {
        Self {
            handler,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl SnowflakeService {
    #[tool(
        name = "execute_snowflake_sql_query",
        description = "Execute any SQL query on Snowflake.\n\
        SECURITY WARNING: This tool executes raw SQL queries on your Snowflake instance. \
        Ensure proper user permissions and network security. Consider query restrictions for production environments.\n\
        Optional database, schema and warehouse override the configured defaults for this call.\n\
        Returns a formatted text report with the query results or the error."
    )]
    async fn execute_query(
        &self,
        Parameters(input): Parameters<ExecuteQueryInput>,
    ) -> Result<CallToolResult, McpError> {
        let text = self.handler.execute_query(input).await;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[tool_handler]
impl ServerHandler for SnowflakeService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "snowflake-mcp-server".to_owned(),
                title: Some("Snowflake MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Run SQL against a Snowflake account.\n\
                \n\
                ## Tool\n\
                `execute_snowflake_sql_query(query, database?, schema?, warehouse?)` runs one statement \
                and returns a text report: context, row counts and an ASCII table of the results.\n\
                \n\
                ## Notes\n\
                - Results are capped at the server's row limit; add LIMIT or filters for large tables.\n\
                - Statements without a result set (INSERT, UPDATE, DDL) report rows affected.\n\
                - Failures are returned as text with a category (SQL_ERROR, DATABASE_ERROR, SYSTEM_ERROR).\n\
                \n\
                ## Security\n\
                Raw SQL is executed with the configured Snowflake role. DROP, DELETE, TRUNCATE, ALTER, \
                CREATE USER, GRANT and REVOKE are logged as sensitive but are not blocked. \
                Restrict the role's privileges for production use."
                    .to_string(),
            ),
        }
    }
}
