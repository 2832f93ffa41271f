//! Error types for the Snowflake MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! `ConfigError` covers everything that must stop the process before it starts
//! serving; `DbError` covers failures during a single tool call and carries the
//! category reported back to the calling assistant.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Startup-fatal configuration problems.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required environment variable {key} is not set")]
    MissingSetting { key: &'static str },

    #[error("Invalid value for {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error(
        "At least one authentication method must be configured:\n\
        - Set SNOWFLAKE_PASSWORD for password authentication\n\
        - Set SNOWFLAKE_PRIVATE_KEY_PATH for key-pair authentication\n\
        - Set SNOWFLAKE_AUTHENTICATOR for SSO authentication"
    )]
    NoAuthMethod,

    #[error("Private key file not found: {}", .path.display())]
    KeyFileNotFound { path: PathBuf },

    #[error("Failed to load private key from {}: {reason}", .path.display())]
    PrivateKey { path: PathBuf, reason: String },
}

impl ConfigError {
    pub fn missing(key: &'static str) -> Self {
        Self::MissingSetting { key }
    }

    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key,
            reason: reason.into(),
        }
    }

    pub fn private_key(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::PrivateKey {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Category of a failure, as reported in tool output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Sql,
    Database,
    System,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "CONFIG_ERROR",
            Self::Sql => "SQL_ERROR",
            Self::Database => "DATABASE_ERROR",
            Self::System => "SYSTEM_ERROR",
        }
    }

    /// Short label prefixed to the driver message in tool output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config => "Configuration error",
            Self::Sql => "SQL Error",
            Self::Database => "Database Error",
            Self::System => "Unexpected error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The database rejected the statement (syntax, unknown object, privileges).
    #[error("{}", programming_message(.code, .sql_state.as_deref(), .message))]
    Programming {
        code: String,
        sql_state: Option<String>,
        message: String,
    },

    /// Connectivity, login or session-level failure.
    #[error("{}", database_message(.code.as_deref(), .message))]
    Database {
        message: String,
        code: Option<String>,
    },

    /// The driver received something it does not understand.
    #[error("Interface error: {message}")]
    Interface { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn programming_message(code: &str, sql_state: Option<&str>, message: &str) -> String {
    match sql_state {
        Some(state) => format!("{code} ({state}): {message}"),
        None => format!("{code}: {message}"),
    }
}

fn database_message(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) => format!("{code}: {message}"),
        None => message.to_string(),
    }
}

impl DbError {
    pub fn programming(
        code: impl Into<String>,
        sql_state: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Programming {
            code: code.into(),
            sql_state,
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            code,
        }
    }

    pub fn interface(message: impl Into<String>) -> Self {
        Self::Interface {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Programming { .. } => ErrorKind::Sql,
            Self::Database { .. } => ErrorKind::Database,
            Self::Interface { .. } | Self::Internal { .. } => ErrorKind::System,
        }
    }
}

/// Convert transport-level HTTP failures to DbError.
impl From<reqwest::Error> for DbError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DbError::interface(format!("Malformed response from Snowflake: {err}"))
        } else if err.is_timeout() {
            DbError::database(format!("Request to Snowflake timed out: {err}"), None)
        } else {
            DbError::database(format!("Failed to reach Snowflake: {err}"), None)
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
