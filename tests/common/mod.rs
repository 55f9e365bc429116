//! Common test utilities for dataapi-rs integration tests.
//!
//! The tests drive a real [`Connection`] against stub transports that script
//! the Data API side:
//!
//! - [`ScriptedTransport`] records every request and answers from queues,
//!   falling back to empty successful responses.
//! - [`SilentTransport`] never answers.
//! - [`HeldTransport`] holds every statement and begin call until the test
//!   releases it.

#![allow(dead_code)]

use async_trait::async_trait;
use dataapi_rs::connection::PROBE_SQL;
use dataapi_rs::error::TransportError;
use dataapi_rs::transport::{
    BatchExecuteStatementRequest, BatchExecuteStatementResponse, BeginTransactionRequest,
    BeginTransactionResponse, DataApiTransport, EndTransactionRequest, EndTransactionResponse,
    ExecuteStatementRequest, ExecuteStatementResponse,
};
use dataapi_rs::{Connection, ConnectionParams};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub const RESOURCE_ARN: &str = "arn:aws:rds:eu-west-1:123456789012:cluster:my-cluster";
pub const SECRET_ARN: &str = "arn:aws:secretsmanager:eu-west-1:123456789012:secret:my-secret";

/// Connection parameters shared by the tests.
pub fn test_params() -> dataapi_rs::ConnectionBuilder {
    ConnectionParams::builder()
        .resource_arn(RESOURCE_ARN)
        .secret_arn(SECRET_ARN)
        .database("app")
}

/// Connection over `transport` whose cluster is already known to be running.
pub fn warm_connection(params: ConnectionParams, transport: Arc<dyn DataApiTransport>) -> Connection {
    let connection = Connection::new(params, transport);
    connection.executor().warmup().mark_running();
    connection
}

/// The remote error raised when a transaction was aborted by an earlier failure.
pub fn aborted_error() -> TransportError {
    TransportError::Remote {
        status: 400,
        code: "BadRequestException".to_string(),
        message: "ERROR: current transaction is aborted, commands ignored until end of transaction block".to_string(),
    }
}

/// Records requests and answers from scripted queues.
#[derive(Default)]
pub struct ScriptedTransport {
    pub executed: Mutex<Vec<ExecuteStatementRequest>>,
    pub batches: Mutex<Vec<BatchExecuteStatementRequest>>,
    pub commits: Mutex<Vec<EndTransactionRequest>>,
    pub rollbacks: Mutex<Vec<EndTransactionRequest>>,
    pub probes: AtomicUsize,
    pub begins: AtomicUsize,
    execute_responses: Mutex<VecDeque<Result<ExecuteStatementResponse, TransportError>>>,
    batch_responses: Mutex<VecDeque<Result<BatchExecuteStatementResponse, TransportError>>>,
    commit_responses: Mutex<VecDeque<Result<EndTransactionResponse, TransportError>>>,
    rollback_responses: Mutex<VecDeque<Result<EndTransactionResponse, TransportError>>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the answer to the next non-probe statement.
    pub fn respond(&self, response: Result<ExecuteStatementResponse, TransportError>) {
        self.execute_responses.lock().push_back(response);
    }

    pub fn respond_batch(&self, response: Result<BatchExecuteStatementResponse, TransportError>) {
        self.batch_responses.lock().push_back(response);
    }

    pub fn respond_commit(&self, response: Result<EndTransactionResponse, TransportError>) {
        self.commit_responses.lock().push_back(response);
    }

    pub fn respond_rollback(&self, response: Result<EndTransactionResponse, TransportError>) {
        self.rollback_responses.lock().push_back(response);
    }

    /// Last non-probe statement sent.
    pub fn last_executed(&self) -> ExecuteStatementRequest {
        self.executed
            .lock()
            .last()
            .cloned()
            .expect("no statement executed")
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks.lock().len()
    }
}

#[async_trait]
impl DataApiTransport for ScriptedTransport {
    async fn execute_statement(
        &self,
        request: ExecuteStatementRequest,
    ) -> Result<ExecuteStatementResponse, TransportError> {
        if request.sql == PROBE_SQL {
            self.probes.fetch_add(1, Ordering::SeqCst);
            return Ok(ExecuteStatementResponse::default());
        }

        self.executed.lock().push(request);
        self.execute_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ExecuteStatementResponse::default()))
    }

    async fn batch_execute_statement(
        &self,
        request: BatchExecuteStatementRequest,
    ) -> Result<BatchExecuteStatementResponse, TransportError> {
        self.batches.lock().push(request);
        self.batch_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(BatchExecuteStatementResponse::default()))
    }

    async fn begin_transaction(
        &self,
        _request: BeginTransactionRequest,
    ) -> Result<BeginTransactionResponse, TransportError> {
        let n = self.begins.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BeginTransactionResponse {
            transaction_id: format!("tx-{}", n),
        })
    }

    async fn commit_transaction(
        &self,
        request: EndTransactionRequest,
    ) -> Result<EndTransactionResponse, TransportError> {
        self.commits.lock().push(request);
        self.commit_responses.lock().pop_front().unwrap_or_else(|| {
            Ok(EndTransactionResponse {
                transaction_status: Some("Transaction Committed".to_string()),
            })
        })
    }

    async fn rollback_transaction(
        &self,
        request: EndTransactionRequest,
    ) -> Result<EndTransactionResponse, TransportError> {
        self.rollbacks.lock().push(request);
        self.rollback_responses.lock().pop_front().unwrap_or_else(|| {
            Ok(EndTransactionResponse {
                transaction_status: Some("Rollback Complete".to_string()),
            })
        })
    }
}

/// A remote that never answers.
#[derive(Default)]
pub struct SilentTransport {
    pub calls: AtomicUsize,
}

impl SilentTransport {
    async fn hang<T>(&self) -> Result<T, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

#[async_trait]
impl DataApiTransport for SilentTransport {
    async fn execute_statement(
        &self,
        _request: ExecuteStatementRequest,
    ) -> Result<ExecuteStatementResponse, TransportError> {
        self.hang().await
    }

    async fn batch_execute_statement(
        &self,
        _request: BatchExecuteStatementRequest,
    ) -> Result<BatchExecuteStatementResponse, TransportError> {
        self.hang().await
    }

    async fn begin_transaction(
        &self,
        _request: BeginTransactionRequest,
    ) -> Result<BeginTransactionResponse, TransportError> {
        self.hang().await
    }

    async fn commit_transaction(
        &self,
        _request: EndTransactionRequest,
    ) -> Result<EndTransactionResponse, TransportError> {
        self.hang().await
    }

    async fn rollback_transaction(
        &self,
        _request: EndTransactionRequest,
    ) -> Result<EndTransactionResponse, TransportError> {
        self.hang().await
    }
}

/// Holds each statement and begin call until [`release`](Self::release)
/// lets it finish.
pub struct HeldTransport {
    gate: Semaphore,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub completed: AtomicUsize,
    pub rollbacks: Mutex<Vec<String>>,
}

impl HeldTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            rollbacks: Mutex::new(Vec::new()),
        })
    }

    /// Let `n` held statements finish.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    async fn hold(&self) -> Result<(), TransportError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        permit.forget();
        Ok(())
    }
}

#[async_trait]
impl DataApiTransport for HeldTransport {
    async fn execute_statement(
        &self,
        _request: ExecuteStatementRequest,
    ) -> Result<ExecuteStatementResponse, TransportError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        self.hold().await?;

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(ExecuteStatementResponse::default())
    }

    async fn batch_execute_statement(
        &self,
        _request: BatchExecuteStatementRequest,
    ) -> Result<BatchExecuteStatementResponse, TransportError> {
        Ok(BatchExecuteStatementResponse::default())
    }

    async fn begin_transaction(
        &self,
        _request: BeginTransactionRequest,
    ) -> Result<BeginTransactionResponse, TransportError> {
        self.hold().await?;
        Ok(BeginTransactionResponse {
            transaction_id: "tx-held".to_string(),
        })
    }

    async fn commit_transaction(
        &self,
        _request: EndTransactionRequest,
    ) -> Result<EndTransactionResponse, TransportError> {
        Ok(EndTransactionResponse::default())
    }

    async fn rollback_transaction(
        &self,
        request: EndTransactionRequest,
    ) -> Result<EndTransactionResponse, TransportError> {
        self.rollbacks.lock().push(request.transaction_id);
        Ok(EndTransactionResponse::default())
    }
}

/// Give spawned tasks time to reach their next await point.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
