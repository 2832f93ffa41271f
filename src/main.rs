//! Snowflake MCP Server - Main entry point.
//!
//! Resolves configuration once, then serves the `execute_snowflake_sql_query`
//! tool over stdio or HTTP.

use snowflake_mcp_server::auth::AuthConfig;
use snowflake_mcp_server::config::{Config, SnowflakeConfig, TransportMode};
use snowflake_mcp_server::db::{QueryExecutor, SnowflakeConnector};
use snowflake_mcp_server::tools::QueryToolHandler;
use snowflake_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Everything goes to stderr: stdout carries the stdio protocol stream.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse_args();
    init_tracing(&config);

    let snowflake = match config.resolve() {
        Ok(snowflake) => Arc::new(snowflake),
        Err(e) => {
            error!(error = %e, "Configuration error");
            return ExitCode::FAILURE;
        }
    };

    info!(
        transport = %config.transport,
        "Starting Snowflake MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!(
        account = %snowflake.account,
        user = %snowflake.username,
        auth = ?snowflake.auth_method(),
        max_rows = snowflake.max_rows,
        "Configuration loaded"
    );

    match serve(&config, snowflake).await {
        Ok(()) => {
            info!("Server shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

async fn serve(
    config: &Config,
    snowflake: Arc<SnowflakeConfig>,
) -> Result<(), Box<dyn std::error::Error>> {
    let connector = Arc::new(SnowflakeConnector::from_config(&snowflake)?);
    let executor = QueryExecutor::new(connector, snowflake);
    let handler = Arc::new(QueryToolHandler::new(executor));

    match config.transport {
        TransportMode::Stdio => {
            let transport = StdioTransport::new(handler);
            transport.run().await?;
        }
        TransportMode::Http => {
            let auth = AuthConfig::from_tokens(config.auth_tokens.clone())?;
            info!(
                bind = %config.http_bind_addr(),
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(
                handler,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .with_auth(auth);
            transport.run().await?;
        }
    }
    Ok(())
}
