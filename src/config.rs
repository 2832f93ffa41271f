//! Configuration handling for the Snowflake MCP Server.
//!
//! Settings come from CLI arguments with environment variable fallbacks
//! (`SNOWFLAKE_*` for the connection, `MCP_*` for the server itself). The raw
//! [`Config`] is resolved exactly once at startup into an immutable
//! [`SnowflakeConfig`], which is then shared read-only by every tool call.

use crate::db::credentials;
use crate::error::ConfigError;
use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_MAX_ROWS: usize = 1000;
pub const DEFAULT_AUTHENTICATOR: &str = "snowflake";

pub const ENV_ACCOUNT: &str = "SNOWFLAKE_ACCOUNT";
pub const ENV_USERNAME: &str = "SNOWFLAKE_USERNAME";
pub const ENV_MAX_ROWS: &str = "SNOWFLAKE_MAX_ROWS";
pub const ENV_QUERY_TIMEOUT: &str = "SNOWFLAKE_QUERY_TIMEOUT";
pub const ENV_TOKEN: &str = "SNOWFLAKE_TOKEN";

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP (for web clients)
    Http,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Raw command line / environment configuration.
#[derive(Clone, Parser)]
#[command(
    name = "snowflake-mcp-server",
    about = "MCP server for Snowflake - lets AI assistants run SQL against a Snowflake account",
    version,
    author
)]
pub struct Config {
    /// Snowflake account identifier (e.g. xy12345.us-east-1)
    #[arg(long, env = ENV_ACCOUNT)]
    pub account: Option<String>,

    /// Snowflake login name
    #[arg(long, env = ENV_USERNAME)]
    pub username: Option<String>,

    /// Password for password authentication
    #[arg(long, env = "SNOWFLAKE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Path to a PEM encoded RSA private key for key-pair authentication
    #[arg(long, env = "SNOWFLAKE_PRIVATE_KEY_PATH")]
    pub private_key_path: Option<PathBuf>,

    /// Passphrase of an encrypted private key
    #[arg(long, env = "SNOWFLAKE_PRIVATE_KEY_PASSPHRASE", hide_env_values = true)]
    pub private_key_passphrase: Option<String>,

    /// Authenticator ("snowflake" for password/key-pair, "oauth", ...)
    #[arg(long, env = "SNOWFLAKE_AUTHENTICATOR", default_value = DEFAULT_AUTHENTICATOR)]
    pub authenticator: String,

    /// OAuth access token, used when the authenticator is "oauth"
    #[arg(long, env = ENV_TOKEN, hide_env_values = true)]
    pub token: Option<String>,

    /// Default warehouse
    #[arg(long, env = "SNOWFLAKE_WAREHOUSE")]
    pub warehouse: Option<String>,

    /// Default database
    #[arg(long, env = "SNOWFLAKE_DATABASE")]
    pub database: Option<String>,

    /// Default schema
    #[arg(long, env = "SNOWFLAKE_SCHEMA")]
    pub schema: Option<String>,

    /// Role to assume
    #[arg(long, env = "SNOWFLAKE_ROLE")]
    pub role: Option<String>,

    /// Maximum rows returned per query
    #[arg(long, env = ENV_MAX_ROWS, default_value = "1000")]
    pub max_rows: String,

    /// Override the Snowflake host (default: <account>.snowflakecomputing.com)
    #[arg(long, env = "SNOWFLAKE_HOST")]
    pub host: Option<String>,

    /// Upper bound in seconds for connect + execute + fetch. Unset means no limit.
    #[arg(long, env = ENV_QUERY_TIMEOUT)]
    pub query_timeout: Option<String>,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "MCP_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,

    /// Authentication tokens for HTTP transport.
    /// Can be specified multiple times or as comma-separated values.
    /// When set, all HTTP requests must include a valid Bearer token.
    #[arg(
        long = "auth-token",
        value_name = "TOKEN",
        env = "MCP_AUTH_TOKENS",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub auth_tokens: Vec<String>,
}

/// Authentication method selected from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Password,
    KeyPair,
    /// Non-default authenticator such as `oauth`.
    Delegated,
}

/// Validated, immutable Snowflake connection settings.
#[derive(Clone)]
pub struct SnowflakeConfig {
    pub account: String,
    pub username: String,
    pub password: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub private_key_passphrase: Option<String>,
    pub authenticator: String,
    pub token: Option<String>,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub role: Option<String>,
    pub max_rows: usize,
    pub host: Option<String>,
    pub query_timeout: Option<Duration>,
}

impl SnowflakeConfig {
    /// Minimal password-authenticated configuration.
    pub fn with_password(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            username: username.into(),
            password: Some(password.into()),
            private_key_path: None,
            private_key_passphrase: None,
            authenticator: DEFAULT_AUTHENTICATOR.to_string(),
            token: None,
            warehouse: None,
            database: None,
            schema: None,
            role: None,
            max_rows: DEFAULT_MAX_ROWS,
            host: None,
            query_timeout: None,
        }
    }

    pub fn uses_default_authenticator(&self) -> bool {
        self.authenticator.eq_ignore_ascii_case(DEFAULT_AUTHENTICATOR)
    }

    pub fn uses_oauth(&self) -> bool {
        self.authenticator.eq_ignore_ascii_case("oauth")
    }

    /// The method `connection_params` will use. Password wins over key pair.
    pub fn auth_method(&self) -> Option<AuthMethod> {
        if self.password.is_some() {
            Some(AuthMethod::Password)
        } else if self.private_key_path.is_some() {
            Some(AuthMethod::KeyPair)
        } else if !self.uses_default_authenticator() {
            Some(AuthMethod::Delegated)
        } else {
            None
        }
    }

    /// Check the single-authentication-method invariant and the key file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let method = self.auth_method().ok_or(ConfigError::NoAuthMethod)?;

        if method == AuthMethod::Delegated && self.uses_oauth() && self.token.is_none() {
            return Err(ConfigError::missing(ENV_TOKEN));
        }

        if let Some(path) = &self.private_key_path {
            if !path.exists() {
                return Err(ConfigError::KeyFileNotFound { path: path.clone() });
            }
            // Decode once so a bad key or passphrase stops startup; the key is
            // read again for every query.
            if method == AuthMethod::KeyPair {
                credentials::load_private_key(path, self.private_key_passphrase.as_deref())?;
            }
        }

        Ok(())
    }
}

impl fmt::Debug for SnowflakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeConfig")
            .field("account", &self.account)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("private_key_path", &self.private_key_path)
            .field(
                "private_key_passphrase",
                &self.private_key_passphrase.as_ref().map(|_| "***"),
            )
            .field("authenticator", &self.authenticator)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("max_rows", &self.max_rows)
            .field("host", &self.host)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

/// Treat empty and whitespace-only values as unset.
fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Secrets pass through untouched; only an empty value counts as unset.
fn secret(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

fn parse_max_rows(raw: &str) -> Result<usize, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_MAX_ROWS);
    }
    match raw.parse::<usize>() {
        Ok(0) => Err(ConfigError::invalid(ENV_MAX_ROWS, "must be greater than 0")),
        Ok(n) => Ok(n),
        Err(_) => Err(ConfigError::invalid(
            ENV_MAX_ROWS,
            format!("'{raw}' is not a positive integer"),
        )),
    }
}

fn parse_timeout(raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::invalid(
            ENV_QUERY_TIMEOUT,
            "must be greater than 0 (unset it to disable the timeout)",
        )),
        Ok(secs) => Ok(Some(Duration::from_secs(secs))),
        Err(_) => Err(ConfigError::invalid(
            ENV_QUERY_TIMEOUT,
            format!("'{raw}' is not a number of seconds"),
        )),
    }
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Resolve and validate the Snowflake settings.
    pub fn resolve(&self) -> Result<SnowflakeConfig, ConfigError> {
        let account = non_empty(&self.account).ok_or(ConfigError::missing(ENV_ACCOUNT))?;
        let username = non_empty(&self.username).ok_or(ConfigError::missing(ENV_USERNAME))?;
        let authenticator = match self.authenticator.trim() {
            "" => DEFAULT_AUTHENTICATOR,
            other => other,
        };

        let config = SnowflakeConfig {
            account,
            username,
            password: secret(&self.password),
            private_key_path: self
                .private_key_path
                .clone()
                .filter(|p| !p.as_os_str().is_empty()),
            private_key_passphrase: secret(&self.private_key_passphrase),
            authenticator: authenticator.to_string(),
            token: secret(&self.token),
            warehouse: non_empty(&self.warehouse),
            database: non_empty(&self.database),
            schema: non_empty(&self.schema),
            role: non_empty(&self.role),
            max_rows: parse_max_rows(&self.max_rows)?,
            host: non_empty(&self.host),
            query_timeout: parse_timeout(non_empty(&self.query_timeout))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
