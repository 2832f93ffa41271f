//! Snowflake session REST protocol payloads.
//!
//! Only the fields this server reads are modelled; everything else in the
//! responses is ignored by serde.

use crate::db::{ColumnDescription, Row};
use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Response codes meaning "statement accepted, result not ready yet".
pub const QUERY_IN_PROGRESS: &str = "333333";
pub const QUERY_IN_PROGRESS_ASYNC: &str = "333334";

/// DML statement type ids occupy 0x3000..=0x3FFF.
const STATEMENT_TYPE_DML_FIRST: i64 = 0x3000;
const STATEMENT_TYPE_DML_LAST: i64 = 0x3FFF;

/// Common response wrapper for every Snowflake REST call.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    pub code: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub success: bool,
}

impl<T> Envelope<T> {
    pub fn message_or_default(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| "Snowflake returned an unsuccessful response".to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub data: LoginRequestData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LoginRequestData {
    pub client_app_id: String,
    pub client_app_version: String,
    pub account_name: String,
    pub login_name: String,
    pub authenticator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub client_environment: HashMap<String, String>,
    pub session_parameters: HashMap<String, JsonValue>,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponseData {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<'a> {
    pub sql_text: &'a str,
    pub async_exec: bool,
    pub sequence_id: u64,
    pub query_submission_time: i64,
}

#[derive(Debug, Deserialize)]
pub struct RowType {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRef {
    pub url: String,
    #[serde(default)]
    pub row_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponseData {
    #[serde(default)]
    pub rowtype: Vec<RowType>,
    #[serde(default)]
    pub rowset: Vec<Row>,
    pub total: Option<i64>,
    pub query_id: Option<String>,
    pub statement_type_id: Option<i64>,
    pub sql_state: Option<String>,
    #[serde(default)]
    pub chunks: Vec<ChunkRef>,
    pub qrmk: Option<String>,
    #[serde(default)]
    pub chunk_headers: HashMap<String, String>,
    pub query_result_format: Option<String>,
    pub get_result_url: Option<String>,
}

impl QueryResponseData {
    pub fn is_dml(&self) -> bool {
        self.statement_type_id
            .is_some_and(|id| (STATEMENT_TYPE_DML_FIRST..=STATEMENT_TYPE_DML_LAST).contains(&id))
    }

    pub fn columns(&self) -> Vec<ColumnDescription> {
        self.rowtype
            .iter()
            .map(|r| ColumnDescription::new(&r.name, &r.type_name, r.nullable))
            .collect()
    }

    /// Sum of the per-operation counts DML statements return in their first row
    /// (e.g. "number of rows inserted", "number of rows updated").
    pub fn affected_rows(&self) -> i64 {
        self.rowset
            .first()
            .map(|row| row.iter().filter_map(cell_as_i64).sum())
            .unwrap_or(-1)
    }

    /// Headers required to download result chunks from cloud storage.
    pub fn download_headers(&self) -> Vec<(String, String)> {
        if !self.chunk_headers.is_empty() {
            return self
                .chunk_headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
        }
        match &self.qrmk {
            Some(qrmk) => vec![
                (
                    "x-amz-server-side-encryption-customer-algorithm".to_string(),
                    "AES256".to_string(),
                ),
                (
                    "x-amz-server-side-encryption-customer-key".to_string(),
                    qrmk.clone(),
                ),
            ],
            None => Vec::new(),
        }
    }

    pub fn ensure_json_format(&self) -> DbResult<()> {
        match self.query_result_format.as_deref() {
            None => Ok(()),
            Some(format) if format.eq_ignore_ascii_case("json") => Ok(()),
            Some(format) => Err(DbError::interface(format!(
                "Unsupported query result format '{format}'"
            ))),
        }
    }
}

fn cell_as_i64(cell: &JsonValue) -> Option<i64> {
    match cell {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Result chunks are served as a comma separated list of JSON arrays
/// without the enclosing brackets.
pub fn parse_chunk(body: &str) -> DbResult<Vec<Row>> {
    let wrapped = format!("[{}]", body.trim());
    serde_json::from_str(&wrapped)
        .map_err(|e| DbError::interface(format!("Malformed result chunk: {e}")))
}

/// Login failures are session-level problems regardless of the code.
pub fn login_error<T>(envelope: &Envelope<T>) -> DbError {
    DbError::database(envelope.message_or_default(), envelope.code.clone())
}

/// Classify an unsuccessful query-request response.
///
/// Session errors (390xxx) are connectivity problems; anything else carrying an
/// error code is the database rejecting the statement.
pub fn query_error(envelope: &Envelope<QueryResponseData>) -> DbError {
    let message = envelope.message_or_default();
    match envelope.code.as_deref() {
        Some(code) if code.starts_with("390") => {
            DbError::database(message, Some(code.to_string()))
        }
        Some(code) => DbError::programming(
            code,
            envelope.data.as_ref().and_then(|d| d.sql_state.clone()),
            message,
        ),
        None => DbError::database(message, None),
    }
}
