//! Transport protocol abstraction traits.
//!
//! This module defines the `DataApiTransport` trait that abstracts how
//! statement calls reach the Data API, and the `ClusterDescriber` trait used
//! to look up cluster availability. Both are shared between tasks, so methods
//! take `&self`.

use crate::error::TransportError;
use async_trait::async_trait;

use super::messages::{
    BatchExecuteStatementRequest, BatchExecuteStatementResponse, BeginTransactionRequest,
    BeginTransactionResponse, EndTransactionRequest, EndTransactionResponse,
    ExecuteStatementRequest, ExecuteStatementResponse,
};

/// Transport protocol trait for Data API calls.
///
/// Dropping a returned future abandons the call; implementations must not
/// rely on being polled to completion.
#[async_trait]
pub trait DataApiTransport: Send + Sync {
    /// Execute a single statement.
    ///
    /// # Arguments
    ///
    /// * `request` - Statement, parameters and target
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the call fails or the service rejects it.
    async fn execute_statement(
        &self,
        request: ExecuteStatementRequest,
    ) -> Result<ExecuteStatementResponse, TransportError>;

    /// Execute a statement once per parameter set.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the call fails or the service rejects it.
    async fn batch_execute_statement(
        &self,
        request: BatchExecuteStatementRequest,
    ) -> Result<BatchExecuteStatementResponse, TransportError>;

    /// Start a transaction.
    ///
    /// # Returns
    ///
    /// The transaction id to attach to subsequent statements.
    async fn begin_transaction(
        &self,
        request: BeginTransactionRequest,
    ) -> Result<BeginTransactionResponse, TransportError>;

    /// Commit a transaction.
    async fn commit_transaction(
        &self,
        request: EndTransactionRequest,
    ) -> Result<EndTransactionResponse, TransportError>;

    /// Roll back a transaction.
    async fn rollback_transaction(
        &self,
        request: EndTransactionRequest,
    ) -> Result<EndTransactionResponse, TransportError>;
}

/// Looks up the status of a database cluster, e.g. `"available"`.
#[async_trait]
pub trait ClusterDescriber: Send + Sync {
    /// Current status string of the cluster with the given identifier.
    async fn cluster_status(&self, cluster_id: &str) -> Result<String, TransportError>;
}

/// Cluster status that counts as running.
pub const CLUSTER_AVAILABLE: &str = "available";
