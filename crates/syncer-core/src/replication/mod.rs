//! Waiting for the database to come back and for logical replication to catch up.

pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use postgres::PgReplicationProbe;

use crate::errors::{SyncError, SyncResult};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(600);

#[async_trait]
pub trait ReplicationProbe: Send + Sync {
    /// Lightweight liveness query against the target database.
    async fn ping(&self) -> SyncResult<()>;

    /// Block until every replication subscriber confirmed all transactions
    /// committed before the call.
    async fn wait_for_confirmed_flush(&self) -> SyncResult<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub max_attempts: u32,
    pub interval: Duration,
    pub convergence_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
            convergence_timeout: DEFAULT_CONVERGENCE_TIMEOUT,
        }
    }
}

#[derive(Clone)]
pub struct ReplicationMonitor {
    probe: Arc<dyn ReplicationProbe>,
    settings: MonitorSettings,
}

impl ReplicationMonitor {
    pub fn new(probe: Arc<dyn ReplicationProbe>, settings: MonitorSettings) -> Self {
        Self { probe, settings }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Fixed-delay, bounded-attempt polling until the probe succeeds.
    ///
    /// Covers the gap between a service reporting "running" and actually
    /// accepting connections. A ping still pending after `interval` counts
    /// as one failed attempt.
    pub async fn await_reachable(&self) -> SyncResult<()> {
        let max_attempts = self.settings.max_attempts.max(1);
        let interval = self.settings.interval;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let outcome = match tokio::time::timeout(interval, self.probe.ping()).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(format!("ping did not answer within {interval:?}")),
            };
            match outcome {
                Ok(()) => {
                    tracing::debug!(attempt, "database reachable");
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(attempt, max_attempts, error = %e, "database not reachable yet");
                    last_error = e;
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.settings.interval).await;
            }
        }

        Err(SyncError::Unavailable {
            attempts: max_attempts,
            last_error,
        })
    }

    /// Block until replication converged, bounded by the convergence timeout.
    ///
    /// Only meaningful after [`await_reachable`](Self::await_reachable) succeeded.
    pub async fn await_convergence(&self) -> SyncResult<()> {
        let timeout = self.settings.convergence_timeout;
        match tokio::time::timeout(timeout, self.probe.wait_for_confirmed_flush()).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::ConvergenceTimeout { timeout }),
        }
    }
}
