//! Statement dispatch.
//!
//! Every call to the Data API goes through [`StatementExecutor`]: an optional
//! warm-up check, SQL rewrite hooks, a slot in the connection's
//! [`ConcurrencyGate`], and a per-call timeout. Timeouts are reported as
//! `sql-statement-timeout` when the cluster is known to be running and as
//! `db-cluster-is-starting` otherwise.

use super::gate::ConcurrencyGate;
use super::params::ConnectionParams;
use super::warmup::WarmupTracker;
use crate::error::{QueryError, TransportError};
use crate::query::SqlRewriteHooks;
use crate::transport::messages::{
    BatchExecuteStatementRequest, BatchExecuteStatementResponse, BeginTransactionRequest,
    BeginTransactionResponse, EndTransactionRequest, EndTransactionResponse,
    ExecuteStatementRequest, ExecuteStatementResponse,
};
use crate::transport::protocol::{ClusterDescriber, DataApiTransport};
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cheap statement used to wake a paused cluster.
pub const PROBE_SQL: &str = "SELECT NOW() as currenttime";

const SQL_PREVIEW_CHARS: usize = 120;

/// Per-call dispatch options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Overrides the connection's default timeout
    pub query_timeout: Option<Duration>,
    /// Do not consult the warm-up tracker before dispatch
    pub skip_warmup_check: bool,
}

impl ExecuteOptions {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn skip_warmup_check(mut self) -> Self {
        self.skip_warmup_check = true;
        self
    }
}

/// Sends statements for one connection.
pub struct StatementExecutor {
    transport: Arc<dyn DataApiTransport>,
    gate: ConcurrencyGate,
    warmup: WarmupTracker,
    hooks: SqlRewriteHooks,
    resource_arn: String,
    secret_arn: String,
    database: Option<String>,
    query_timeout: Option<Duration>,
    await_startup: bool,
    startup_timeout: Duration,
    probe_timeout: Duration,
}

impl StatementExecutor {
    /// Create an executor for the connection described by `params`.
    pub fn new(
        params: &ConnectionParams,
        transport: Arc<dyn DataApiTransport>,
        hooks: SqlRewriteHooks,
        describer: Option<Arc<dyn ClusterDescriber>>,
    ) -> Self {
        Self {
            transport,
            gate: ConcurrencyGate::new(params.max_concurrency),
            warmup: WarmupTracker::new(params.cluster_id.clone(), describer),
            hooks,
            resource_arn: params.resource_arn.clone(),
            secret_arn: params.secret_arn.clone(),
            database: params.database.clone(),
            query_timeout: params.query_timeout,
            await_startup: params.await_startup,
            startup_timeout: params.startup_timeout,
            probe_timeout: params.probe_timeout,
        }
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn warmup(&self) -> &WarmupTracker {
        &self.warmup
    }

    pub fn hooks(&self) -> &SqlRewriteHooks {
        &self.hooks
    }

    /// Default timeout applied when a call does not set one.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    /// Check the cluster state, probing with the configured timeout.
    pub async fn check_cluster_state(&self) -> bool {
        self.check_cluster_state_with(self.await_startup).await
    }

    /// Check the cluster state. With `await_startup` the probe may take up to
    /// the startup timeout, giving a paused cluster time to resume.
    pub async fn check_cluster_state_with(&self, await_startup: bool) -> bool {
        let probe_timeout = if await_startup {
            self.startup_timeout
        } else {
            self.probe_timeout
        };

        self.warmup
            .check_state(probe_timeout, |timeout| self.probe(timeout))
            .await
    }

    async fn probe(&self, timeout: Duration) -> Result<(), QueryError> {
        let request = ExecuteStatementRequest::new(&self.resource_arn, &self.secret_arn, PROBE_SQL)
            .with_database(self.database.clone());
        self.dispatch(request, Some(timeout)).await.map(|_| ())
    }

    /// Execute one statement.
    pub async fn execute(
        &self,
        request: ExecuteStatementRequest,
        options: &ExecuteOptions,
    ) -> Result<ExecuteStatementResponse, QueryError> {
        if !options.skip_warmup_check {
            self.check_cluster_state().await;
        }
        self.dispatch(request, self.timeout_for(options)).await
    }

    /// Execute one statement without the warm-up check.
    pub async fn dispatch(
        &self,
        mut request: ExecuteStatementRequest,
        timeout: Option<Duration>,
    ) -> Result<ExecuteStatementResponse, QueryError> {
        request.sql = self.hooks.apply(&request.sql);
        debug!(
            "Executing statement ({} parameters): {}",
            request.parameters.len(),
            preview(&request.sql)
        );

        let transaction_id = request.transaction_id.clone();
        self.call(
            "ExecuteStatement",
            transaction_id.as_deref(),
            timeout,
            || self.transport.execute_statement(request),
        )
        .await
    }

    /// Execute one statement for each parameter set.
    pub async fn batch_execute(
        &self,
        mut request: BatchExecuteStatementRequest,
        options: &ExecuteOptions,
    ) -> Result<BatchExecuteStatementResponse, QueryError> {
        if !options.skip_warmup_check {
            self.check_cluster_state().await;
        }

        request.sql = self.hooks.apply(&request.sql);
        debug!(
            "Executing batch ({} parameter sets): {}",
            request.parameter_sets.len(),
            preview(&request.sql)
        );

        let transaction_id = request.transaction_id.clone();
        self.call(
            "BatchExecuteStatement",
            transaction_id.as_deref(),
            self.timeout_for(options),
            || self.transport.batch_execute_statement(request),
        )
        .await
    }

    pub async fn begin_transaction(
        &self,
        request: BeginTransactionRequest,
        options: &ExecuteOptions,
    ) -> Result<BeginTransactionResponse, QueryError> {
        if !options.skip_warmup_check {
            self.check_cluster_state().await;
        }
        let response = self
            .call("BeginTransaction", None, self.timeout_for(options), || {
                self.transport.begin_transaction(request)
            })
            .await?;
        debug!("Began transaction {}", response.transaction_id);
        Ok(response)
    }

    pub async fn commit_transaction(
        &self,
        request: EndTransactionRequest,
        options: &ExecuteOptions,
    ) -> Result<EndTransactionResponse, QueryError> {
        debug!("Committing transaction {}", request.transaction_id);
        self.call("CommitTransaction", None, self.timeout_for(options), || {
            self.transport.commit_transaction(request)
        })
        .await
    }

    pub async fn rollback_transaction(
        &self,
        request: EndTransactionRequest,
        options: &ExecuteOptions,
    ) -> Result<EndTransactionResponse, QueryError> {
        debug!("Rolling back transaction {}", request.transaction_id);
        self.call("RollbackTransaction", None, self.timeout_for(options), || {
            self.transport.rollback_transaction(request)
        })
        .await
    }

    fn timeout_for(&self, options: &ExecuteOptions) -> Option<Duration> {
        options
            .query_timeout
            .or(self.query_timeout)
            .filter(|t| !t.is_zero())
    }

    /// Run one remote call while holding a gate slot.
    ///
    /// The timeout starts once the slot is held. If the call fails with the
    /// aborted-transaction quirk and runs inside `transaction_id`, that
    /// transaction is rolled back before the slot is released and the
    /// original error is returned.
    async fn call<T, F, Fut>(
        &self,
        operation: &str,
        transaction_id: Option<&str>,
        timeout: Option<Duration>,
        call: F,
    ) -> Result<T, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let ticket = self.gate.acquire().await?;
        debug!(
            "{} holds slot {} ({} waiting)",
            operation,
            ticket.ordinal(),
            self.gate.waiting()
        );

        let start = Instant::now();
        let result = self.bounded(call(), timeout).await;
        debug!(
            "{} finished in {}ms",
            operation,
            start.elapsed().as_millis()
        );

        let outcome = match result {
            Ok(value) => {
                self.warmup.mark_running();
                Ok(value)
            }
            Err(err) => {
                if err.is_transaction_aborted() {
                    if let Some(id) = transaction_id {
                        self.roll_back_aborted(id, timeout).await;
                    }
                }
                Err(err)
            }
        };

        drop(ticket);
        outcome
    }

    async fn bounded<T, Fut>(&self, call: Fut, timeout: Option<Duration>) -> Result<T, QueryError>
    where
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let Some(limit) = timeout else {
            return call.await.map_err(QueryError::from);
        };

        match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(QueryError::from),
            Err(_) => Err(self.timeout_error(limit)),
        }
    }

    fn timeout_error(&self, limit: Duration) -> QueryError {
        let timeout_ms = limit.as_millis() as u64;
        if self.warmup.is_running() {
            warn!("Statement timed out after {}ms", timeout_ms);
            QueryError::StatementTimeout { timeout_ms }
        } else {
            info!(
                "Call timed out after {}ms while cluster {} is not running",
                timeout_ms,
                self.warmup.cluster_id()
            );
            QueryError::ClusterStarting { timeout_ms }
        }
    }

    async fn roll_back_aborted(&self, transaction_id: &str, timeout: Option<Duration>) {
        warn!("Transaction {} is aborted, rolling back", transaction_id);

        let request = EndTransactionRequest {
            resource_arn: self.resource_arn.clone(),
            secret_arn: self.secret_arn.clone(),
            transaction_id: transaction_id.to_string(),
        };

        match self
            .bounded(self.transport.rollback_transaction(request), timeout)
            .await
        {
            Ok(_) => info!("Rolled back aborted transaction {}", transaction_id),
            Err(e) => warn!(
                "Rollback of aborted transaction {} failed: {}",
                transaction_id, e
            ),
        }
    }
}

impl std::fmt::Debug for StatementExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementExecutor")
            .field("gate", &self.gate)
            .field("warmup", &self.warmup)
            .field("hooks", &self.hooks)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

fn preview(sql: &str) -> String {
    let mut chars = sql.chars();
    let head: String = chars.by_ref().take(SQL_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
