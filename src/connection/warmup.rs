//! Cluster warm-up tracking.
//!
//! Serverless clusters pause when idle and take a while to resume. The
//! tracker remembers whether the cluster was last seen running and decides
//! when that knowledge is stale enough to check again.

use crate::error::QueryError;
use crate::transport::protocol::{ClusterDescriber, CLUSTER_AVAILABLE};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// How long a "running" observation stays trusted.
pub const STATE_FRESHNESS: Duration = Duration::from_secs(5 * 60);

/// Last known cluster state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClusterState {
    pub is_running: bool,
    pub last_checked_at: Option<Instant>,
}

/// Tracks whether the cluster behind a connection is running.
pub struct WarmupTracker {
    cluster_id: String,
    describer: Option<Arc<dyn ClusterDescriber>>,
    freshness: Duration,
    state: Mutex<ClusterState>,
}

impl WarmupTracker {
    pub fn new(cluster_id: impl Into<String>, describer: Option<Arc<dyn ClusterDescriber>>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            describer,
            freshness: STATE_FRESHNESS,
            state: Mutex::new(ClusterState::default()),
        }
    }

    /// Override how long a running observation is trusted.
    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn state(&self) -> ClusterState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().is_running
    }

    /// True if the cluster was seen running within the freshness window.
    pub fn is_fresh(&self) -> bool {
        let state = self.state.lock();
        match state.last_checked_at {
            Some(at) => state.is_running && at.elapsed() < self.freshness,
            None => false,
        }
    }

    /// Record that the cluster answered a statement.
    pub fn mark_running(&self) {
        let was_running = {
            let mut state = self.state.lock();
            let was_running = state.is_running;
            state.is_running = true;
            state.last_checked_at = Some(Instant::now());
            was_running
        };
        if !was_running {
            info!("Cluster {} is running", self.cluster_id);
        }
    }

    fn mark_not_running(&self, status: &str) {
        let was_running = {
            let mut state = self.state.lock();
            let was_running = state.is_running;
            state.is_running = false;
            state.last_checked_at = Some(Instant::now());
            was_running
        };
        if was_running {
            info!("Cluster {} is no longer running ({})", self.cluster_id, status);
        } else {
            debug!("Cluster {} status is {}", self.cluster_id, status);
        }
    }

    /// Refresh the running flag if it is stale.
    ///
    /// A fresh running state returns immediately. Otherwise the describer is
    /// asked for the cluster status; if it is missing, fails or reports
    /// anything but available, `probe` is run with `probe_timeout`. Probe
    /// failures are logged and swallowed.
    ///
    /// Returns the running flag afterwards, which may be stale.
    pub async fn check_state<P, Fut>(&self, probe_timeout: Duration, probe: P) -> bool
    where
        P: FnOnce(Duration) -> Fut,
        Fut: Future<Output = Result<(), QueryError>>,
    {
        if self.is_fresh() {
            return true;
        }

        if let Some(describer) = &self.describer {
            let lookup = describer.cluster_status(&self.cluster_id);
            match tokio::time::timeout(probe_timeout, lookup).await {
                Ok(Ok(status)) if status == CLUSTER_AVAILABLE => {
                    self.mark_running();
                    return true;
                }
                Ok(Ok(status)) => self.mark_not_running(&status),
                Ok(Err(e)) => warn!("Failed to describe cluster {}: {}", self.cluster_id, e),
                Err(_) => warn!(
                    "Describing cluster {} timed out after {:?}",
                    self.cluster_id, probe_timeout
                ),
            }
        }

        debug!(
            "Probing cluster {} (timeout {:?})",
            self.cluster_id, probe_timeout
        );
        if let Err(e) = probe(probe_timeout).await {
            debug!("Cluster {} probe failed: {}", self.cluster_id, e);
        }

        self.is_running()
    }
}

impl std::fmt::Debug for WarmupTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmupTracker")
            .field("cluster_id", &self.cluster_id)
            .field("has_describer", &self.describer.is_some())
            .field("state", &*self.state.lock())
            .finish()
    }
}
