//! Session state of a connection.
//!
//! The Data API itself is stateless; the session tracks the active
//! transaction handle, whether the connection is still open, and a
//! statement counter.

use crate::error::QueryError;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for statements, no transaction
    Ready,

    /// A begin-transaction call is in flight
    Beginning,

    /// Statements are attached to a transaction
    InTransaction,

    /// Session is closed
    Closed,
}

impl SessionState {
    /// Check if the session can execute statements.
    pub fn can_execute(&self) -> bool {
        !matches!(self, SessionState::Closed)
    }
}

#[derive(Debug)]
struct TransactionSlot {
    state: SessionState,
    transaction_id: Option<String>,
}

/// Transaction handle and lifecycle of one connection.
pub struct Session {
    slot: RwLock<TransactionSlot>,

    /// Statement counter
    query_count: AtomicU64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(TransactionSlot {
                state: SessionState::Ready,
                transaction_id: None,
            }),
            query_count: AtomicU64::new(0),
        }
    }

    /// Get current session state.
    pub async fn state(&self) -> SessionState {
        self.slot.read().await.state
    }

    /// Handle of the active transaction.
    pub async fn transaction_id(&self) -> Option<String> {
        self.slot.read().await.transaction_id.clone()
    }

    pub async fn in_transaction(&self) -> bool {
        self.slot.read().await.transaction_id.is_some()
    }

    /// Validate the session is open.
    pub async fn validate_ready(&self) -> Result<(), QueryError> {
        if self.state().await.can_execute() {
            Ok(())
        } else {
            Err(QueryError::InvalidState("connection is closed".to_string()))
        }
    }

    /// Reserve the slot for a new transaction.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::TransactionError` if a transaction is active or
    /// being started, and `QueryError::InvalidState` if the session is closed.
    pub async fn start_begin(&self) -> Result<(), QueryError> {
        let mut slot = self.slot.write().await;
        match slot.state {
            SessionState::Ready => {
                slot.state = SessionState::Beginning;
                Ok(())
            }
            SessionState::Beginning | SessionState::InTransaction => Err(
                QueryError::TransactionError("transaction already active".to_string()),
            ),
            SessionState::Closed => {
                Err(QueryError::InvalidState("connection is closed".to_string()))
            }
        }
    }

    /// Finish a begin started with [`start_begin`](Self::start_begin).
    /// `None` means the begin call failed.
    ///
    /// Returns the handle back if the session was closed while the begin
    /// was in flight. The caller owns that transaction and must end it.
    #[must_use]
    pub async fn finish_begin(&self, transaction_id: Option<String>) -> Option<String> {
        let mut slot = self.slot.write().await;
        if slot.state != SessionState::Beginning {
            return transaction_id;
        }
        slot.state = match transaction_id {
            Some(_) => SessionState::InTransaction,
            None => SessionState::Ready,
        };
        slot.transaction_id = transaction_id;
        None
    }

    /// Handle of the active transaction, for commit or rollback.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::TransactionError` if there is none.
    pub async fn require_transaction(&self) -> Result<String, QueryError> {
        self.transaction_id()
            .await
            .ok_or_else(|| QueryError::TransactionError("no active transaction".to_string()))
    }

    /// Forget the transaction with the given handle, if it is still active.
    pub async fn end_transaction(&self, transaction_id: &str) -> bool {
        let mut slot = self.slot.write().await;
        if slot.transaction_id.as_deref() != Some(transaction_id) {
            return false;
        }
        slot.transaction_id = None;
        if slot.state == SessionState::InTransaction {
            slot.state = SessionState::Ready;
        }
        true
    }

    /// Record a dispatched statement.
    pub async fn record_statement(&self) -> u64 {
        self.query_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Get total statement count.
    pub fn query_count(&self) -> u64 {
        self.query_count.load(Ordering::SeqCst)
    }

    /// Close the session. Returns the handle of a transaction left open.
    pub async fn close(&self) -> Option<String> {
        let mut slot = self.slot.write().await;
        slot.state = SessionState::Closed;
        slot.transaction_id.take()
    }

    pub async fn is_closed(&self) -> bool {
        matches!(self.state().await, SessionState::Closed)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("Session");
        debug.field("query_count", &self.query_count());
        match self.slot.try_read() {
            Ok(slot) => debug
                .field("state", &slot.state)
                .field("transaction_id", &slot.transaction_id),
            Err(_) => debug.field("state", &"<locked>"),
        };
        debug.finish()
    }
}
