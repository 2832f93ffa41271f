//! Query execution engine.
//!
//! Runs one statement per call on a fresh connection:
//! - session overrides (database/schema/warehouse) applied per call
//! - row cap enforced by fetching `max_rows` rows plus one probe row
//! - optional wall-clock timeout around the whole call
//! - cursor and connection always released, close failures only logged
//!
//! Failures never escape as `Err`: they are classified into an
//! [`ExecutionOutcome::Failure`] the formatter can render.

use crate::config::SnowflakeConfig;
use crate::db::{Connection, Connector, CredentialLoader, Cursor};
use crate::error::{DbError, DbResult, ErrorKind};
use crate::models::{ExecutionOutcome, QueryContext, QueryFailure, QueryRequest, QuerySuccess};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Introspection statement run after tabular queries.
pub const CONTEXT_SQL: &str = "SELECT CURRENT_DATABASE(), CURRENT_SCHEMA(), CURRENT_WAREHOUSE()";

/// Executes statements against the configured account.
#[derive(Clone)]
pub struct QueryExecutor {
    connector: Arc<dyn Connector>,
    config: Arc<SnowflakeConfig>,
}

impl QueryExecutor {
    pub fn new(connector: Arc<dyn Connector>, config: Arc<SnowflakeConfig>) -> Self {
        Self { connector, config }
    }

    /// Execute a statement and classify the result.
    pub async fn execute(&self, request: &QueryRequest) -> ExecutionOutcome {
        let start = Instant::now();
        let mut connection: Option<Box<dyn Connection>> = None;
        let mut cursor: Option<Box<dyn Cursor>> = None;

        let run = self.run(request, &mut connection, &mut cursor);
        let result = match self.config.query_timeout {
            Some(limit) => match timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => Err(DbError::database(
                    format!("Query timed out after {}s", limit.as_secs()),
                    None,
                )),
            },
            None => run.await,
        };

        release(cursor, connection).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(success) => {
                info!(
                    row_count = success.row_count,
                    column_count = success.column_count,
                    truncated = success.truncated,
                    elapsed_ms = elapsed_ms,
                    "Query executed"
                );
                ExecutionOutcome::Success(success)
            }
            Err(err) => {
                let failure = classify(&request.sql, &err);
                error!(
                    kind = %failure.kind,
                    elapsed_ms = elapsed_ms,
                    error = %failure.message,
                    "Query failed"
                );
                ExecutionOutcome::Failure(failure)
            }
        }
    }

    async fn run(
        &self,
        request: &QueryRequest,
        connection: &mut Option<Box<dyn Connection>>,
        cursor: &mut Option<Box<dyn Cursor>>,
    ) -> DbResult<QuerySuccess> {
        let mut params = CredentialLoader::connection_params(&self.config)?;
        params.apply_overrides(
            request.database.as_deref(),
            request.schema.as_deref(),
            request.warehouse.as_deref(),
        );
        let resolved = QueryContext::from_options(
            params.database.as_deref(),
            params.schema.as_deref(),
            params.warehouse.as_deref(),
        );

        debug!(account = %params.account, "Connecting to Snowflake");
        let conn = connection.insert(self.connector.connect(&params).await?);
        let cur = cursor.insert(conn.cursor().await?);

        cur.execute(&request.sql).await?;

        let described: Option<(Vec<String>, Vec<bool>)> = cur.description().map(|desc| {
            desc.iter()
                .map(|c| (c.name.clone(), c.is_numeric()))
                .unzip()
        });

        let Some((columns, numeric_columns)) = described else {
            let affected_rows = u64::try_from(cur.rowcount()).unwrap_or(0);
            info!(affected_rows = affected_rows, "Query executed successfully (no result set)");
            return Ok(QuerySuccess::statement(&request.sql, affected_rows, resolved));
        };

        let rows = cur.fetch_many(self.config.max_rows).await?;
        let truncated = cur.fetch_one().await?.is_some();
        if truncated {
            warn!(limit = self.config.max_rows, "Query result truncated");
        }

        let context = match current_context(cur.as_mut()).await {
            Ok(Some(context)) => context,
            Ok(None) => resolved,
            Err(e) => {
                warn!(error = %e, "Could not retrieve current context");
                resolved
            }
        };

        Ok(QuerySuccess::tabular(&request.sql, columns, rows, truncated, context)
            .with_numeric_columns(numeric_columns))
    }
}

async fn current_context(cursor: &mut dyn Cursor) -> DbResult<Option<QueryContext>> {
    cursor.execute(CONTEXT_SQL).await?;
    Ok(cursor.fetch_one().await?.map(|row| QueryContext::from_row(&row)))
}

/// Close the cursor, then the connection.
async fn release(cursor: Option<Box<dyn Cursor>>, connection: Option<Box<dyn Connection>>) {
    if let Some(mut cursor) = cursor {
        if let Err(e) = cursor.close().await {
            warn!(error = %e, "Error closing cursor");
        }
    }
    if let Some(mut connection) = connection {
        match connection.close().await {
            Ok(()) => debug!("Database connection closed"),
            Err(e) => warn!(error = %e, "Error closing connection"),
        }
    }
}

/// Map a driver error onto the reported failure category.
///
/// Configuration problems surfacing mid-call (e.g. the key file changed after
/// startup) are not the caller's fault and are reported as system errors.
pub fn classify(sql: &str, err: &DbError) -> QueryFailure {
    let kind = match err.kind() {
        ErrorKind::Config => ErrorKind::System,
        kind => kind,
    };
    QueryFailure::new(sql, kind, err)
}
