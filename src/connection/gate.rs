//! Concurrency gate for statement calls.
//!
//! A FIFO counting semaphore owned by one connection. Each acquired
//! [`SemaphoreTicket`] holds one slot until it is released or dropped.

use crate::error::QueryError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

struct GateState {
    free_slots: usize,
    waiters: VecDeque<oneshot::Sender<SemaphoreTicket>>,
}

struct GateInner {
    max_concurrency: usize,
    acquire_timeout: Option<Duration>,
    state: Mutex<GateState>,
}

impl GateInner {
    /// Hand a slot to the next live waiter, if a slot is free.
    fn dispatch(self: &Arc<Self>) {
        let (waiter, ordinal) = {
            let mut state = self.state.lock();
            if state.free_slots == 0 {
                return;
            }
            let Some(waiter) = state.waiters.pop_front() else {
                return;
            };
            let ordinal = state.free_slots;
            state.free_slots -= 1;
            (waiter, ordinal)
        };

        let ticket = SemaphoreTicket {
            ordinal,
            gate: Arc::clone(self),
            released: false,
        };

        // A closed receiver means the waiter gave up; dropping the returned
        // ticket frees the slot for the next one.
        if let Err(abandoned) = waiter.send(ticket) {
            log::debug!("Gate waiter abandoned, passing slot {} on", abandoned.ordinal);
        }
    }

    fn release_slot(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            state.free_slots = (state.free_slots + 1).min(self.max_concurrency);
        }
        self.dispatch();
    }
}

/// Holds one slot of a [`ConcurrencyGate`].
///
/// The slot is returned on [`release`](Self::release) or drop, whichever
/// comes first. Releasing twice is a no-op.
pub struct SemaphoreTicket {
    ordinal: usize,
    gate: Arc<GateInner>,
    released: bool,
}

impl SemaphoreTicket {
    /// Number of free slots at the moment this ticket was handed out.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Return the slot to the gate.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.gate.release_slot();
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for SemaphoreTicket {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SemaphoreTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemaphoreTicket")
            .field("ordinal", &self.ordinal)
            .field("released", &self.released)
            .finish()
    }
}

/// FIFO gate bounding how many statement calls are in flight.
#[derive(Clone)]
pub struct ConcurrencyGate {
    inner: Arc<GateInner>,
}

impl ConcurrencyGate {
    /// Create a gate. A `max_concurrency` of 0 is treated as 1.
    pub fn new(max_concurrency: usize) -> Self {
        Self::with_timeout(max_concurrency, None)
    }

    /// Create a gate whose `acquire` gives up after `acquire_timeout`.
    pub fn with_timeout(max_concurrency: usize, acquire_timeout: Option<Duration>) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            inner: Arc::new(GateInner {
                max_concurrency,
                acquire_timeout: acquire_timeout.filter(|t| !t.is_zero()),
                state: Mutex::new(GateState {
                    free_slots: max_concurrency,
                    waiters: VecDeque::new(),
                }),
            }),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency
    }

    /// Slots not currently held.
    pub fn free_slots(&self) -> usize {
        self.inner.state.lock().free_slots
    }

    /// Waiters queued for a slot, including abandoned ones not yet skipped.
    pub fn waiting(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    /// True when every slot is held.
    pub fn is_locked(&self) -> bool {
        self.free_slots() == 0
    }

    fn enqueue(&self) -> oneshot::Receiver<SemaphoreTicket> {
        let (tx, rx) = oneshot::channel();
        let locked = {
            let mut state = self.inner.state.lock();
            state.waiters.push_back(tx);
            state.free_slots == 0
        };
        if !locked {
            self.inner.dispatch();
        }
        rx
    }

    /// Wait for a slot in arrival order.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::GateTimeout` if an acquire timeout is configured
    /// and no slot was handed over in time. The slot is released as soon as
    /// it would have been handed over.
    pub async fn acquire(&self) -> Result<SemaphoreTicket, QueryError> {
        let receiver = self.enqueue();

        let closed = |_| QueryError::InvalidState("concurrency gate closed".to_string());

        match self.inner.acquire_timeout {
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(ticket) => ticket.map_err(closed),
                Err(_) => {
                    log::debug!("Gave up waiting for a statement slot after {:?}", limit);
                    Err(QueryError::GateTimeout {
                        timeout_ms: limit.as_millis() as u64,
                    })
                }
            },
            None => receiver.await.map_err(closed),
        }
    }

    /// Run `task` while holding a slot. The slot is released when the task
    /// finishes, fails or is cancelled.
    pub async fn run_exclusive<F, Fut, T>(&self, task: F) -> Result<T, QueryError>
    where
        F: FnOnce(usize) -> Fut,
        Fut: Future<Output = T>,
    {
        let ticket = self.acquire().await?;
        let output = task(ticket.ordinal()).await;
        drop(ticket);
        Ok(output)
    }

    /// Wait until all work queued before this call has passed the gate.
    /// Returns whether the gate is unlocked afterwards.
    pub async fn await_free(&self) -> Result<bool, QueryError> {
        self.run_exclusive(|_| async {}).await?;
        Ok(!self.is_locked())
    }
}

impl std::fmt::Debug for ConcurrencyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ConcurrencyGate")
            .field("max_concurrency", &self.inner.max_concurrency)
            .field("free_slots", &state.free_slots)
            .field("waiting", &state.waiters.len())
            .finish()
    }
}
