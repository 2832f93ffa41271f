//! Snowflake driver.
//!
//! Implements the [`Connector`] / [`Connection`] / [`Cursor`] traits on top of
//! Snowflake's session REST protocol:
//! - `POST /session/v1/login-request` opens a session (password, key-pair JWT
//!   or OAuth token)
//! - `POST /queries/v1/query-request` runs one statement, polling the result
//!   URL while the statement is still running
//! - result chunks are downloaded lazily, only as far as the caller fetches
//! - `POST /session?delete=true` closes the session

pub mod wire;

use crate::config::SnowflakeConfig;
use crate::db::credentials::{self, Credential, key_pair_jwt};
use crate::db::{ColumnDescription, Connection, ConnectionParams, Connector, Cursor, Row};
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;
use wire::{
    ChunkRef, Envelope, LoginRequest, LoginRequestData, LoginResponseData, QUERY_IN_PROGRESS,
    QUERY_IN_PROGRESS_ASYNC, QueryResponseData,
};

const CLIENT_APP_ID: &str = "snowflake-mcp-server";
const RESULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Opens Snowflake sessions over HTTPS.
#[derive(Debug, Clone)]
pub struct SnowflakeConnector {
    client: reqwest::Client,
    /// Host (or full base URL) overriding `<account>.snowflakecomputing.com`
    host: Option<String>,
}

impl SnowflakeConnector {
    pub fn new(host: Option<String>) -> DbResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("{}/{}", CLIENT_APP_ID, env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()
            .map_err(|e| DbError::internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, host })
    }

    pub fn from_config(config: &SnowflakeConfig) -> DbResult<Self> {
        Self::new(config.host.clone())
    }

    /// Base URL for an account, honoring the host override.
    pub fn base_url(&self, account: &str) -> DbResult<Url> {
        let raw = match &self.host {
            Some(host) if host.contains("://") => host.clone(),
            Some(host) => format!("https://{host}"),
            None => format!("https://{}.snowflakecomputing.com", account.to_ascii_lowercase()),
        };
        Url::parse(&raw)
            .map_err(|e| DbError::interface(format!("Invalid Snowflake URL '{raw}': {e}")))
    }

    async fn login(&self, params: &ConnectionParams) -> DbResult<Session> {
        params.validate()?;
        let base = self.base_url(&params.account)?;
        let mut url = join(&base, "/session/v1/login-request")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("request_id", &Uuid::new_v4().to_string());
            if let Some(database) = &params.database {
                query.append_pair("databaseName", database);
            }
            if let Some(schema) = &params.schema {
                query.append_pair("schemaName", schema);
            }
            if let Some(warehouse) = &params.warehouse {
                query.append_pair("warehouse", warehouse);
            }
            if let Some(role) = &params.role {
                query.append_pair("roleName", role);
            }
        }

        let credentials = LoginCredentials::from_params(params)?;
        let body = LoginRequest {
            data: LoginRequestData {
                client_app_id: CLIENT_APP_ID.to_string(),
                client_app_version: env!("CARGO_PKG_VERSION").to_string(),
                account_name: credentials::account_locator(&params.account),
                login_name: params.user.clone(),
                authenticator: credentials.authenticator,
                password: credentials.password,
                token: credentials.token,
                client_environment: HashMap::from([
                    ("APPLICATION".to_string(), CLIENT_APP_ID.to_string()),
                    ("OS".to_string(), std::env::consts::OS.to_string()),
                ]),
                session_parameters: HashMap::from([(
                    "QUERY_RESULT_FORMAT".to_string(),
                    serde_json::Value::String("JSON".to_string()),
                )]),
            },
        };

        debug!(host = %base, user = %params.user, "Opening Snowflake session");
        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;
        let envelope: Envelope<LoginResponseData> = read_envelope(response).await?;
        if !envelope.success {
            return Err(wire::login_error(&envelope));
        }
        let token = envelope
            .data
            .and_then(|d| d.token)
            .ok_or_else(|| DbError::interface("Login response did not include a session token"))?;

        info!(host = %base, "Snowflake session opened");
        Ok(Session {
            client: self.client.clone(),
            base,
            token,
            sequence: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl Connector for SnowflakeConnector {
    async fn connect(&self, params: &ConnectionParams) -> DbResult<Box<dyn Connection>> {
        let session = self.login(params).await?;
        Ok(Box::new(SnowflakeConnection {
            session: Arc::new(session),
            closed: false,
        }))
    }
}

/// Authenticator name and secret sent in the login request.
#[derive(Debug)]
struct LoginCredentials {
    authenticator: String,
    password: Option<String>,
    token: Option<String>,
}

impl LoginCredentials {
    fn from_params(params: &ConnectionParams) -> DbResult<Self> {
        match &params.credential {
            Some(Credential::Password(password)) => Ok(Self {
                authenticator: params.authenticator.to_ascii_uppercase(),
                password: Some(password.clone()),
                token: None,
            }),
            Some(Credential::PrivateKey(key)) => {
                let now = chrono::Utc::now().timestamp();
                Ok(Self {
                    authenticator: "SNOWFLAKE_JWT".to_string(),
                    password: None,
                    token: Some(key_pair_jwt(&params.account, &params.user, key, now)?),
                })
            }
            Some(Credential::OAuthToken(token)) => Ok(Self {
                authenticator: "OAUTH".to_string(),
                password: None,
                token: Some(token.clone()),
            }),
            None if params.authenticator.eq_ignore_ascii_case("oauth") => Err(DbError::database(
                "The oauth authenticator requires SNOWFLAKE_TOKEN to be set",
                None,
            )),
            None => Err(DbError::database(
                format!(
                    "Authenticator '{}' requires an interactive login flow, \
                     which this server cannot perform",
                    params.authenticator
                ),
                None,
            )),
        }
    }
}

fn join(base: &Url, path: &str) -> DbResult<Url> {
    base.join(path)
        .map_err(|e| DbError::interface(format!("Invalid Snowflake endpoint '{path}': {e}")))
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> DbResult<Envelope<T>> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        return Err(DbError::database(
            format!("Snowflake returned HTTP {status}: {snippet}"),
            None,
        ));
    }
    Ok(response.json().await?)
}

/// An authenticated Snowflake session shared by a connection and its cursors.
struct Session {
    client: reqwest::Client,
    base: Url,
    token: String,
    sequence: AtomicU64,
}

impl Session {
    fn authorization(&self) -> String {
        format!("Snowflake Token=\"{}\"", self.token)
    }

    async fn query(&self, sql: &str) -> DbResult<QueryResponseData> {
        let mut url = join(&self.base, "/queries/v1/query-request")?;
        url.query_pairs_mut()
            .append_pair("requestId", &Uuid::new_v4().to_string());

        let body = wire::QueryRequest {
            sql_text: sql,
            async_exec: false,
            sequence_id: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            query_submission_time: chrono::Utc::now().timestamp_millis(),
        };

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, self.authorization())
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;
        let mut envelope: Envelope<QueryResponseData> = read_envelope(response).await?;

        while matches!(
            envelope.code.as_deref(),
            Some(QUERY_IN_PROGRESS) | Some(QUERY_IN_PROGRESS_ASYNC)
        ) {
            let result_url = envelope
                .data
                .as_ref()
                .and_then(|d| d.get_result_url.clone())
                .ok_or_else(|| {
                    DbError::interface("Statement is still running but no result URL was returned")
                })?;
            debug!(result_url = %result_url, "Statement still running, polling for result");
            tokio::time::sleep(RESULT_POLL_INTERVAL).await;
            envelope = self.poll(&result_url).await?;
        }

        if !envelope.success {
            return Err(wire::query_error(&envelope));
        }
        let data = envelope
            .data
            .ok_or_else(|| DbError::interface("Query response did not include data"))?;
        data.ensure_json_format()?;

        debug!(
            query_id = ?data.query_id,
            statement_type_id = ?data.statement_type_id,
            chunks = data.chunks.len(),
            "Statement finished"
        );
        Ok(data)
    }

    async fn poll(&self, result_path: &str) -> DbResult<Envelope<QueryResponseData>> {
        let url = join(&self.base, result_path)?;
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, self.authorization())
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        read_envelope(response).await
    }

    async fn download_chunk(
        &self,
        chunk: &ChunkRef,
        headers: &[(String, String)],
    ) -> DbResult<Vec<Row>> {
        debug!(rows = chunk.row_count, "Downloading result chunk");
        let mut request = self.client.get(&chunk.url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DbError::database(
                format!("Failed to download result chunk: HTTP {status}"),
                None,
            ));
        }
        let body = response.text().await?;
        wire::parse_chunk(&body)
    }

    async fn close(&self) -> DbResult<()> {
        let mut url = join(&self.base, "/session")?;
        url.query_pairs_mut().append_pair("delete", "true");
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, self.authorization())
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let envelope: Envelope<serde_json::Value> = read_envelope(response).await?;
        if envelope.success {
            Ok(())
        } else {
            Err(DbError::database(envelope.message_or_default(), envelope.code))
        }
    }
}

pub struct SnowflakeConnection {
    session: Arc<Session>,
    closed: bool,
}

#[async_trait]
impl Connection for SnowflakeConnection {
    async fn cursor(&mut self) -> DbResult<Box<dyn Cursor>> {
        if self.closed {
            return Err(DbError::interface("Connection is closed"));
        }
        Ok(Box::new(SnowflakeCursor {
            session: self.session.clone(),
            result: None,
            closed: false,
        }))
    }

    async fn close(&mut self) -> DbResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.session.close().await
    }
}

/// Rows of the current result: the inline rowset plus chunks not yet downloaded.
struct ResultState {
    columns: Option<Vec<ColumnDescription>>,
    rowcount: i64,
    buffered: VecDeque<Row>,
    chunks: VecDeque<ChunkRef>,
    download_headers: Vec<(String, String)>,
}

impl ResultState {
    fn from_response(data: QueryResponseData) -> Self {
        if data.is_dml() {
            return Self {
                columns: None,
                rowcount: data.affected_rows(),
                buffered: VecDeque::new(),
                chunks: VecDeque::new(),
                download_headers: Vec::new(),
            };
        }
        if data.rowtype.is_empty() {
            return Self {
                columns: None,
                rowcount: -1,
                buffered: VecDeque::new(),
                chunks: VecDeque::new(),
                download_headers: Vec::new(),
            };
        }

        let columns = data.columns();
        let download_headers = data.download_headers();
        let rowcount = data.total.unwrap_or(data.rowset.len() as i64);
        Self {
            columns: Some(columns),
            rowcount,
            buffered: data.rowset.into(),
            chunks: data.chunks.into(),
            download_headers,
        }
    }
}

pub struct SnowflakeCursor {
    session: Arc<Session>,
    result: Option<ResultState>,
    closed: bool,
}

impl SnowflakeCursor {
    async fn next_row(&mut self) -> DbResult<Option<Row>> {
        let Some(state) = self.result.as_mut() else {
            return Err(DbError::interface("No statement has been executed on this cursor"));
        };
        loop {
            if let Some(row) = state.buffered.pop_front() {
                return Ok(Some(row));
            }
            let Some(chunk) = state.chunks.pop_front() else {
                return Ok(None);
            };
            let rows = self
                .session
                .download_chunk(&chunk, &state.download_headers)
                .await?;
            state.buffered = rows.into();
        }
    }
}

#[async_trait]
impl Cursor for SnowflakeCursor {
    async fn execute(&mut self, sql: &str) -> DbResult<()> {
        if self.closed {
            return Err(DbError::interface("Cursor is closed"));
        }
        self.result = None;
        let data = self.session.query(sql).await?;
        self.result = Some(ResultState::from_response(data));
        Ok(())
    }

    fn description(&self) -> Option<&[ColumnDescription]> {
        self.result.as_ref()?.columns.as_deref()
    }

    fn rowcount(&self) -> i64 {
        self.result.as_ref().map_or(-1, |r| r.rowcount)
    }

    async fn fetch_many(&mut self, size: usize) -> DbResult<Vec<Row>> {
        let mut rows = Vec::with_capacity(size.min(1024));
        while rows.len() < size {
            match self.next_row().await? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    async fn fetch_one(&mut self) -> DbResult<Option<Row>> {
        self.next_row().await
    }

    async fn close(&mut self) -> DbResult<()> {
        self.closed = true;
        self.result = None;
        Ok(())
    }
}
