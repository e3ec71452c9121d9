//! PostgreSQL ledger living in the main database, next to the replicated data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::schema::{PG_LOCK_NOT_AVAILABLE, POSTGRES_LEDGER_SCHEMA};
use super::LedgerStore;
use crate::errors::{SyncError, SyncResult};
use crate::types::{InstanceCode, Operation, SyncRecord};

/// Ledger over an explicit pool handle. All queries bind their parameters.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lazily connecting pool; the first query opens the connection.
    pub fn connect_lazy(url: &str) -> SyncResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_lazy(url)
            .map_err(|e| SyncError::Config(format!("invalid database url: {}", e)))?;
        Ok(Self::new(pool))
    }

}

fn is_lock_not_available(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => is_lock_not_available_code(db.code().as_deref()),
        _ => false,
    }
}

/// Another session holds the lock `CREATE TABLE IF NOT EXISTS` needs.
fn is_lock_not_available_code(code: Option<&str>) -> bool {
    code == Some(PG_LOCK_NOT_AVAILABLE)
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn init(&self) -> SyncResult<()> {
        match sqlx::query(POSTGRES_LEDGER_SCHEMA).execute(&self.pool).await {
            Ok(_) => Ok(()),
            Err(e) if is_lock_not_available(&e) => {
                tracing::debug!("ledger table is being created by another process");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn max_iteration(
        &self,
        instance: &InstanceCode,
        operation: Operation,
    ) -> SyncResult<Option<u32>> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT max(iteration) FROM avapolos_sync WHERE instance = $1 AND operation = $2",
        )
        .bind(instance.as_str())
        .bind(operation.code_str())
        .fetch_one(&self.pool)
        .await?;

        max.map(to_iteration).transpose()
    }

    async fn insert(
        &self,
        instance: &InstanceCode,
        iteration: u32,
        operation: Operation,
    ) -> SyncResult<()> {
        let iteration = i32::try_from(iteration)
            .map_err(|_| SyncError::Ledger(format!("iteration out of range: {}", iteration)))?;

        sqlx::query("INSERT INTO avapolos_sync (instance, iteration, operation) VALUES ($1, $2, $3)")
            .bind(instance.as_str())
            .bind(iteration)
            .bind(operation.code_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn records(
        &self,
        instance: &InstanceCode,
        operation: Operation,
    ) -> SyncResult<Vec<SyncRecord>> {
        let rows: Vec<(i32, DateTime<Utc>, i32)> = sqlx::query_as(
            "SELECT id, created, iteration FROM avapolos_sync WHERE instance = $1 AND operation = $2",
        )
        .bind(instance.as_str())
        .bind(operation.code_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, created, iteration)| {
                Ok(SyncRecord {
                    id: i64::from(id),
                    created,
                    instance: instance.clone(),
                    iteration: to_iteration(iteration)?,
                    operation,
                })
            })
            .collect()
    }
}

fn to_iteration(value: i32) -> SyncResult<u32> {
    u32::try_from(value)
        .map_err(|_| SyncError::Ledger(format!("negative iteration in ledger: {}", value)))
}
