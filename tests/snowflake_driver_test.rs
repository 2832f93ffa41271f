//! End-to-end tests of the Snowflake REST driver against an in-process server.
//!
//! The server speaks just enough of the session protocol: login, query
//! submission (with one asynchronous statement that has to be polled), a lazily
//! downloaded result chunk, and session delete.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value as JsonValue, json};
use snowflake_mcp_server::SnowflakeConfig;
use snowflake_mcp_server::db::executor::CONTEXT_SQL;
use snowflake_mcp_server::db::{QueryExecutor, SnowflakeConnector};
use snowflake_mcp_server::error::ErrorKind;
use snowflake_mcp_server::models::{ExecutionOutcome, QueryFailure, QueryRequest, QuerySuccess};
use snowflake_mcp_server::tools::format_outcome;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

const SESSION_TOKEN: &str = "session-token";
const CHUNK_KEY: &str = "test-qrmk";
const SLOW_RESULT_PATH: &str = "/queries/01b2-slow/result";

const NUMBERS_SQL: &str = "SELECT n FROM numbers";
const SLOW_SQL: &str = "CALL slow_procedure()";
const DELETE_SQL: &str = "DELETE FROM events WHERE id < 4";
const SYNTAX_ERROR_SQL: &str = "SELEC 1";
const UNAVAILABLE_SQL: &str = "SELECT * FROM maintenance";

/// What the fake Snowflake endpoint saw.
struct MockSnowflake {
    base: String,
    login_queries: Mutex<Vec<HashMap<String, String>>>,
    login_bodies: Mutex<Vec<JsonValue>>,
    statements: Mutex<Vec<String>>,
    chunk_keys: Mutex<Vec<Option<String>>>,
    polls: AtomicUsize,
    session_deletes: AtomicUsize,
}

impl MockSnowflake {
    fn new(base: String) -> Self {
        Self {
            base,
            login_queries: Mutex::new(Vec::new()),
            login_bodies: Mutex::new(Vec::new()),
            statements: Mutex::new(Vec::new()),
            chunk_keys: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
            session_deletes: AtomicUsize::new(0),
        }
    }

    fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    fn chunk_downloads(&self) -> usize {
        self.chunk_keys.lock().unwrap().len()
    }

    fn session_deletes(&self) -> usize {
        self.session_deletes.load(Ordering::SeqCst)
    }
}

fn ok(data: JsonValue) -> Json<JsonValue> {
    Json(json!({"data": data, "code": null, "message": null, "success": true}))
}

fn failed(code: &str, message: &str, data: JsonValue) -> Json<JsonValue> {
    Json(json!({"data": data, "code": code, "message": message, "success": false}))
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Snowflake Token=\"{SESSION_TOKEN}\""))
}

async fn login(
    State(mock): State<Arc<MockSnowflake>>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<JsonValue>,
) -> Json<JsonValue> {
    mock.login_queries.lock().unwrap().push(query);
    mock.login_bodies.lock().unwrap().push(body.clone());

    if body["data"]["LOGIN_NAME"] == "locked_out" {
        return failed(
            "390100",
            "Incorrect username or password was specified.",
            JsonValue::Null,
        );
    }
    ok(json!({"token": SESSION_TOKEN, "masterToken": "master"}))
}

async fn query_request(
    State(mock): State<Arc<MockSnowflake>>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Response {
    if !authorized(&headers) {
        return failed("390104", "Authentication token is invalid.", JsonValue::Null)
            .into_response();
    }
    let sql = body["sqlText"].as_str().unwrap_or_default().to_string();
    mock.statements.lock().unwrap().push(sql.clone());

    let response = match sql.as_str() {
        NUMBERS_SQL => ok(json!({
            "rowtype": [{"name": "N", "type": "fixed", "nullable": false}],
            "rowset": [["7"]],
            "total": 3,
            "queryResultFormat": "json",
            "statementTypeId": 4096,
            "qrmk": CHUNK_KEY,
            "chunks": [{"url": format!("{}/chunk0", mock.base), "rowCount": 2}],
        })),
        SLOW_SQL => Json(json!({
            "data": {"getResultUrl": SLOW_RESULT_PATH, "queryId": "01b2-slow"},
            "code": "333334",
            "message": "Asynchronous execution in progress. Use provided query id to perform query monitoring and management.",
            "success": true,
        })),
        DELETE_SQL => ok(json!({
            "rowtype": [{"name": "number of rows deleted", "type": "fixed"}],
            "rowset": [["3"]],
            "total": 1,
            "statementTypeId": 12544,
        })),
        SYNTAX_ERROR_SQL => failed(
            "001003",
            "SQL compilation error:\nsyntax error line 1 at position 0 unexpected 'SELEC'.",
            json!({"sqlState": "42000", "queryId": "01b2-bad"}),
        ),
        UNAVAILABLE_SQL => {
            return (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance").into_response();
        }
        CONTEXT_SQL => ok(json!({
            "rowtype": [
                {"name": "CURRENT_DATABASE()", "type": "text"},
                {"name": "CURRENT_SCHEMA()", "type": "text"},
                {"name": "CURRENT_WAREHOUSE()", "type": "text"},
            ],
            "rowset": [["ANALYTICS", "PUBLIC", "COMPUTE_WH"]],
            "statementTypeId": 4096,
        })),
        _ => failed(
            "002003",
            "SQL compilation error:\nObject does not exist or not authorized.",
            json!({"sqlState": "42S02"}),
        ),
    };
    response.into_response()
}

async fn poll_result(
    State(mock): State<Arc<MockSnowflake>>,
    headers: HeaderMap,
) -> Json<JsonValue> {
    if !authorized(&headers) {
        return failed("390104", "Authentication token is invalid.", JsonValue::Null);
    }
    mock.polls.fetch_add(1, Ordering::SeqCst);
    ok(json!({
        "rowtype": [{"name": "STATUS", "type": "text"}],
        "rowset": [["done"]],
        "statementTypeId": 4096,
    }))
}

async fn chunk(State(mock): State<Arc<MockSnowflake>>, headers: HeaderMap) -> String {
    let key = headers
        .get("x-amz-server-side-encryption-customer-key")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    mock.chunk_keys.lock().unwrap().push(key);
    "[\"42\"],\n[\"1250\"]".to_string()
}

async fn delete_session(
    State(mock): State<Arc<MockSnowflake>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<JsonValue> {
    if authorized(&headers) && query.get("delete").map(String::as_str) == Some("true") {
        mock.session_deletes.fetch_add(1, Ordering::SeqCst);
    }
    ok(JsonValue::Null)
}

async fn start_mock() -> Arc<MockSnowflake> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let mock = Arc::new(MockSnowflake::new(base));

    let app = Router::new()
        .route("/session/v1/login-request", post(login))
        .route("/queries/v1/query-request", post(query_request))
        .route(SLOW_RESULT_PATH, get(poll_result))
        .route("/chunk0", get(chunk))
        .route("/session", post(delete_session))
        .with_state(mock.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    mock
}

fn config_for(mock: &MockSnowflake) -> SnowflakeConfig {
    let mut config = SnowflakeConfig::with_password("xy12345.us-east-1", "analyst", "pw");
    config.host = Some(mock.base.clone());
    config.database = Some("ANALYTICS".to_string());
    config.warehouse = Some("COMPUTE_WH".to_string());
    config
}

fn executor(config: SnowflakeConfig) -> QueryExecutor {
    let connector = SnowflakeConnector::from_config(&config).unwrap();
    QueryExecutor::new(Arc::new(connector), Arc::new(config))
}

fn expect_success(outcome: ExecutionOutcome) -> QuerySuccess {
    match outcome {
        ExecutionOutcome::Success(s) => s,
        ExecutionOutcome::Failure(f) => panic!("expected success, got {}: {}", f.kind, f.message),
    }
}

fn expect_failure(outcome: ExecutionOutcome) -> QueryFailure {
    match outcome {
        ExecutionOutcome::Failure(f) => f,
        ExecutionOutcome::Success(s) => panic!("expected failure, got {} rows", s.row_count),
    }
}

#[tokio::test]
async fn test_login_request_carries_credentials_and_context() {
    let mock = start_mock().await;
    let executor = executor(config_for(&mock));

    expect_success(executor.execute(&QueryRequest::new(NUMBERS_SQL)).await);

    let bodies = mock.login_bodies.lock().unwrap().clone();
    assert_eq!(bodies.len(), 1);
    let data = &bodies[0]["data"];
    assert_eq!(data["LOGIN_NAME"], "analyst");
    assert_eq!(data["ACCOUNT_NAME"], "XY12345");
    assert_eq!(data["AUTHENTICATOR"], "SNOWFLAKE");
    assert_eq!(data["PASSWORD"], "pw");
    assert!(data.get("TOKEN").is_none());
    assert_eq!(data["SESSION_PARAMETERS"]["QUERY_RESULT_FORMAT"], "JSON");

    let query = mock.login_queries.lock().unwrap()[0].clone();
    assert_eq!(query.get("databaseName").map(String::as_str), Some("ANALYTICS"));
    assert_eq!(query.get("warehouse").map(String::as_str), Some("COMPUTE_WH"));
    assert!(query.contains_key("request_id"));
    assert!(!query.contains_key("schemaName"));
}

#[tokio::test]
async fn test_rows_span_inline_rowset_and_chunk() {
    let mock = start_mock().await;
    let executor = executor(config_for(&mock));

    let outcome = executor.execute(&QueryRequest::new(NUMBERS_SQL)).await;
    let text = format_outcome(&outcome);
    let success = expect_success(outcome);

    assert_eq!(success.row_count, 3);
    assert!(!success.truncated);
    assert_eq!(success.rows[2][0], json!("1250"));
    assert_eq!(success.context.schema, "PUBLIC");
    assert_eq!(mock.chunk_downloads(), 1);
    assert_eq!(
        mock.chunk_keys.lock().unwrap()[0].as_deref(),
        Some(CHUNK_KEY)
    );
    // Fixed-point columns arrive as strings and still right-align
    assert!(text.contains("|    7 |\n|   42 |\n| 1250 |"));
    assert_eq!(mock.statements(), vec![NUMBERS_SQL.to_string(), CONTEXT_SQL.to_string()]);
    assert_eq!(mock.session_deletes(), 1);
}

#[tokio::test]
async fn test_truncation_detected_across_chunk_boundary() {
    let mock = start_mock().await;
    let mut config = config_for(&mock);
    config.max_rows = 2;
    let executor = executor(config);

    let outcome = executor.execute(&QueryRequest::new(NUMBERS_SQL)).await;
    let text = format_outcome(&outcome);
    let success = expect_success(outcome);

    assert!(success.truncated);
    assert_eq!(success.total_rows, "2+");
    assert_eq!(success.rows, vec![vec![json!("7")], vec![json!("42")]]);
    assert!(text.contains("Results: 2+ rows (showing first 2), 1 columns"));
    assert_eq!(mock.chunk_downloads(), 1);
    assert_eq!(mock.session_deletes(), 1);
}

#[tokio::test]
async fn test_running_statement_is_polled() {
    let mock = start_mock().await;
    let executor = executor(config_for(&mock));

    let success = expect_success(executor.execute(&QueryRequest::new(SLOW_SQL)).await);
    assert_eq!(success.columns, vec!["STATUS".to_string()]);
    assert_eq!(success.rows, vec![vec![json!("done")]]);
    assert_eq!(mock.polls.load(Ordering::SeqCst), 1);
    assert_eq!(mock.session_deletes(), 1);
}

#[tokio::test]
async fn test_dml_reports_affected_rows() {
    let mock = start_mock().await;
    let executor = executor(config_for(&mock));

    let outcome = executor.execute(&QueryRequest::new(DELETE_SQL)).await;
    let text = format_outcome(&outcome);
    let success = expect_success(outcome);

    assert_eq!(success.affected_rows, Some(3));
    assert!(text.contains("Rows affected: 3"));
    // No result set, so no context introspection
    assert_eq!(mock.statements(), vec![DELETE_SQL.to_string()]);
    assert_eq!(mock.session_deletes(), 1);
}

#[tokio::test]
async fn test_compilation_error_is_sql_error() {
    let mock = start_mock().await;
    let executor = executor(config_for(&mock));

    let outcome = executor.execute(&QueryRequest::new(SYNTAX_ERROR_SQL)).await;
    let text = format_outcome(&outcome);
    let failure = expect_failure(outcome);

    assert_eq!(failure.kind, ErrorKind::Sql);
    assert!(
        failure
            .message
            .starts_with("SQL Error: 001003 (42000): SQL compilation error:")
    );
    assert!(text.contains("- Verify table and column names"));
    assert_eq!(mock.session_deletes(), 1);
}

#[tokio::test]
async fn test_http_failure_is_database_error() {
    let mock = start_mock().await;
    let executor = executor(config_for(&mock));

    let failure = expect_failure(executor.execute(&QueryRequest::new(UNAVAILABLE_SQL)).await);
    assert_eq!(failure.kind, ErrorKind::Database);
    assert!(failure.message.contains("HTTP 503"));
    assert!(failure.message.contains("down for maintenance"));
    assert_eq!(mock.session_deletes(), 1);
}

#[tokio::test]
async fn test_rejected_login_is_database_error() {
    let mock = start_mock().await;
    let mut config = config_for(&mock);
    config.username = "locked_out".to_string();
    let executor = executor(config);

    let failure = expect_failure(executor.execute(&QueryRequest::new(NUMBERS_SQL)).await);
    assert_eq!(failure.kind, ErrorKind::Database);
    assert_eq!(
        failure.message,
        "Database Error: 390100: Incorrect username or password was specified."
    );
    assert!(mock.statements().is_empty());
    assert_eq!(mock.session_deletes(), 0);
}
