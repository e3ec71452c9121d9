//! Iteration ledger: the append-only record of export/import attempts.
//!
//! The ledger is the single source of truth for "what iteration comes
//! next" per (instance, operation). It never updates or deletes rows and
//! does not enforce uniqueness: callers must run at most one flow per
//! instance at a time, otherwise two flows may legitimately read the same
//! maximum and assign the same iteration.

pub mod postgres;
pub mod schema;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

pub use postgres::PostgresLedgerStore;
pub use sqlite::SqliteLedgerStore;

use crate::errors::SyncResult;
use crate::types::{InstanceCode, Operation, SyncRecord};

/// Durable storage behind the ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create the ledger table if missing. Safe to run from concurrent processes.
    async fn init(&self) -> SyncResult<()>;

    /// `max(iteration)` over matching rows, `None` when there are none.
    async fn max_iteration(
        &self,
        instance: &InstanceCode,
        operation: Operation,
    ) -> SyncResult<Option<u32>>;

    /// Unconditional insert.
    async fn insert(
        &self,
        instance: &InstanceCode,
        iteration: u32,
        operation: Operation,
    ) -> SyncResult<()>;

    async fn records(
        &self,
        instance: &InstanceCode,
        operation: Operation,
    ) -> SyncResult<Vec<SyncRecord>>;
}

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn init(&self) -> SyncResult<()> {
        self.store.init().await
    }

    /// `1 + max(iteration)` for the pair, or `1` when nothing was recorded yet.
    pub async fn next_iteration(
        &self,
        instance: &InstanceCode,
        operation: Operation,
    ) -> SyncResult<u32> {
        let last = self.store.max_iteration(instance, operation).await?;
        Ok(last.map_or(1, |n| n + 1))
    }

    /// Append a record. No existence or uniqueness check.
    pub async fn record_operation(
        &self,
        instance: &InstanceCode,
        iteration: u32,
        operation: Operation,
    ) -> SyncResult<()> {
        self.store.insert(instance, iteration, operation).await?;
        tracing::debug!(%instance, iteration, %operation, "ledger record appended");
        Ok(())
    }

    /// All matching records, in arbitrary order.
    pub async fn list_records(
        &self,
        instance: &InstanceCode,
        operation: Operation,
    ) -> SyncResult<Vec<SyncRecord>> {
        self.store.records(instance, operation).await
    }
}
