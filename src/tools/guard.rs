//! Sensitive operation detection for the query tool.
//!
//! Classification is advisory: a match is logged as a security warning and the
//! statement still runs. Access control belongs to the Snowflake role the
//! server logs in with.

use tracing::warn;

/// Statement prefixes treated as sensitive, in match order.
pub const SENSITIVE_KEYWORDS: &[SensitiveOperation] = &[
    SensitiveOperation::Drop,
    SensitiveOperation::Delete,
    SensitiveOperation::Truncate,
    SensitiveOperation::Alter,
    SensitiveOperation::CreateUser,
    SensitiveOperation::Grant,
    SensitiveOperation::Revoke,
];

/// Type of sensitive SQL operation detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensitiveOperation {
    Drop,
    Delete,
    Truncate,
    Alter,
    CreateUser,
    Grant,
    Revoke,
}

impl SensitiveOperation {
    /// Keyword the upper-cased statement must start with.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Drop => "DROP",
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Alter => "ALTER",
            Self::CreateUser => "CREATE USER",
            Self::Grant => "GRANT",
            Self::Revoke => "REVOKE",
        }
    }
}

/// Return the first sensitive keyword the statement starts with.
///
/// Matching is a plain prefix test on the trimmed, upper-cased text, so
/// `DROPPED_ROWS_VIEW` style identifiers at the start also match, and leading
/// comments hide the keyword.
///
/// # Examples
///
/// ```
/// use snowflake_mcp_server::tools::guard::{classify_statement, SensitiveOperation};
///
/// assert_eq!(classify_statement("  drop table t"), Some(SensitiveOperation::Drop));
/// assert_eq!(classify_statement("SELECT * FROM t"), None);
/// ```
pub fn classify_statement(sql: &str) -> Option<SensitiveOperation> {
    let upper = sql.trim().to_uppercase();
    SENSITIVE_KEYWORDS
        .iter()
        .copied()
        .find(|op| upper.starts_with(op.keyword()))
}

/// Classify the statement and log a security warning when it is sensitive.
/// Never blocks execution.
pub fn flag_sensitive(sql: &str) -> Option<SensitiveOperation> {
    let operation = classify_statement(sql)?;
    warn!(
        operation = operation.keyword(),
        "Executing potentially dangerous operation"
    );
    Some(operation)
}
