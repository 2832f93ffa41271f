//! Scripted in-memory driver shared by the integration tests.
//!
//! Statements are matched by exact text. Anything unscripted fails with an
//! "object does not exist" programming error, the way Snowflake rejects an
//! unknown table.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use snowflake_mcp_server::SnowflakeConfig;
use snowflake_mcp_server::db::{
    ColumnDescription, Connection, ConnectionParams, Connector, Cursor, QueryExecutor, Row,
};
use snowflake_mcp_server::error::{DbError, DbResult};
use snowflake_mcp_server::tools::QueryToolHandler;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type ErrorFactory = Arc<dyn Fn() -> DbError + Send + Sync>;

#[derive(Clone)]
pub enum Scripted {
    Rows { columns: Vec<String>, rows: Vec<Row> },
    Statement { rowcount: i64 },
    Error(ErrorFactory),
    /// Never completes; used to exercise timeouts.
    Hang,
}

impl Scripted {
    pub fn rows(columns: &[&str], rows: Vec<Row>) -> Self {
        Self::Rows {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    pub fn error(factory: impl Fn() -> DbError + Send + Sync + 'static) -> Self {
        Self::Error(Arc::new(factory))
    }
}

/// Counters observed by the tests.
#[derive(Default)]
pub struct Stats {
    pub connects: AtomicUsize,
    pub connection_closes: AtomicUsize,
    pub cursor_closes: AtomicUsize,
    pub executed: Mutex<Vec<String>>,
    pub last_params: Mutex<Option<ConnectionParams>>,
}

impl Stats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn connection_closes(&self) -> usize {
        self.connection_closes.load(Ordering::SeqCst)
    }

    pub fn cursor_closes(&self) -> usize {
        self.cursor_closes.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn last_params(&self) -> Option<ConnectionParams> {
        self.last_params.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct MockConnector {
    scripts: HashMap<String, Scripted>,
    connect_error: Option<ErrorFactory>,
    pub stats: Arc<Stats>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sql: &str, result: Scripted) -> Self {
        self.scripts.insert(sql.to_string(), result);
        self
    }

    pub fn failing_connect(
        mut self,
        factory: impl Fn() -> DbError + Send + Sync + 'static,
    ) -> Self {
        self.connect_error = Some(Arc::new(factory));
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, params: &ConnectionParams) -> DbResult<Box<dyn Connection>> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        *self.stats.last_params.lock().unwrap() = Some(params.clone());
        if let Some(factory) = &self.connect_error {
            return Err(factory());
        }
        Ok(Box::new(MockConnection {
            scripts: self.scripts.clone(),
            stats: self.stats.clone(),
        }))
    }
}

struct MockConnection {
    scripts: HashMap<String, Scripted>,
    stats: Arc<Stats>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn cursor(&mut self) -> DbResult<Box<dyn Cursor>> {
        Ok(Box::new(MockCursor {
            scripts: self.scripts.clone(),
            stats: self.stats.clone(),
            columns: None,
            rowcount: -1,
            pending: VecDeque::new(),
        }))
    }

    async fn close(&mut self) -> DbResult<()> {
        self.stats.connection_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockCursor {
    scripts: HashMap<String, Scripted>,
    stats: Arc<Stats>,
    columns: Option<Vec<ColumnDescription>>,
    rowcount: i64,
    pending: VecDeque<Row>,
}

#[async_trait]
impl Cursor for MockCursor {
    async fn execute(&mut self, sql: &str) -> DbResult<()> {
        self.stats.executed.lock().unwrap().push(sql.to_string());
        self.columns = None;
        self.rowcount = -1;
        self.pending.clear();

        match self.scripts.get(sql).cloned() {
            Some(Scripted::Rows { columns, rows }) => {
                self.columns = Some(
                    columns
                        .iter()
                        .map(|c| ColumnDescription::new(c, "text", true))
                        .collect(),
                );
                self.rowcount = rows.len() as i64;
                self.pending = rows.into();
                Ok(())
            }
            Some(Scripted::Statement { rowcount }) => {
                self.rowcount = rowcount;
                Ok(())
            }
            Some(Scripted::Error(factory)) => Err(factory()),
            Some(Scripted::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
            None => Err(DbError::programming(
                "002003",
                Some("42S02".to_string()),
                "SQL compilation error:\nObject does not exist or not authorized.",
            )),
        }
    }

    fn description(&self) -> Option<&[ColumnDescription]> {
        self.columns.as_deref()
    }

    fn rowcount(&self) -> i64 {
        self.rowcount
    }

    async fn fetch_many(&mut self, size: usize) -> DbResult<Vec<Row>> {
        let take = size.min(self.pending.len());
        Ok(self.pending.drain(..take).collect())
    }

    async fn fetch_one(&mut self) -> DbResult<Option<Row>> {
        Ok(self.pending.pop_front())
    }

    async fn close(&mut self) -> DbResult<()> {
        self.stats.cursor_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn numbered_rows(n: i64) -> Vec<Row> {
    (1..=n)
        .map(|i| vec![JsonValue::from(i), JsonValue::from(format!("row-{i}"))])
        .collect()
}

pub fn test_config() -> SnowflakeConfig {
    let mut config = SnowflakeConfig::with_password("xy12345.us-east-1", "analyst", "pw");
    config.warehouse = Some("COMPUTE_WH".to_string());
    config.database = Some("ANALYTICS".to_string());
    config
}

/// Executor plus the stats handle of its connector.
pub fn executor(connector: MockConnector, config: SnowflakeConfig) -> (QueryExecutor, Arc<Stats>) {
    let stats = connector.stats.clone();
    (QueryExecutor::new(Arc::new(connector), Arc::new(config)), stats)
}

pub fn tool_handler(
    connector: MockConnector,
    config: SnowflakeConfig,
) -> (QueryToolHandler, Arc<Stats>) {
    let (executor, stats) = executor(connector, config);
    (QueryToolHandler::new(executor), stats)
}
