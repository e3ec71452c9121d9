//! BDR-backed probe over an explicit pool handle.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::ReplicationProbe;
use crate::errors::{SyncError, SyncResult};

#[derive(Clone)]
pub struct PgReplicationProbe {
    pool: PgPool,
}

impl PgReplicationProbe {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Single-connection pool that gives up acquiring after `acquire_timeout`,
    /// so a down server fails one ping instead of stalling the poll loop.
    pub fn connect_lazy(url: &str, acquire_timeout: Duration) -> SyncResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)
            .map_err(|e| SyncError::Config(format!("invalid database url: {}", e)))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl ReplicationProbe for PgReplicationProbe {
    async fn ping(&self) -> SyncResult<()> {
        // Touches the ledger table, so "reachable" also means "ledger usable".
        sqlx::query("SELECT 1 FROM avapolos_sync LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(())
    }

    async fn wait_for_confirmed_flush(&self) -> SyncResult<()> {
        sqlx::query("SELECT bdr.wait_slot_confirm_lsn(NULL, NULL)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
