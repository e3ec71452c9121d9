//! SQLite-backed ledger for single-host setups and tests.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::schema::SQLITE_LEDGER_SCHEMA;
use super::LedgerStore;
use crate::errors::{SyncError, SyncResult};
use crate::types::{InstanceCode, Operation, SyncRecord};

#[derive(Clone)]
pub struct SqliteLedgerStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedgerStore {
    /// Open a file-backed ledger, creating the table if needed.
    pub fn open(path: &Path) -> SyncResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory ledger (for testing).
    pub fn memory() -> SyncResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> SyncResult<()> {
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.execute("PRAGMA journal_mode = WAL", []);
        let _ = conn.execute("PRAGMA busy_timeout = 5000", []);
        conn.execute_batch(SQLITE_LEDGER_SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> SyncResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SyncError::Ledger("ledger connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn init(&self) -> SyncResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(SQLITE_LEDGER_SCHEMA)?;
        Ok(())
    }

    async fn max_iteration(
        &self,
        instance: &InstanceCode,
        operation: Operation,
    ) -> SyncResult<Option<u32>> {
        let conn = self.lock()?;
        let max: Option<i64> = conn.query_row(
            "SELECT max(iteration) FROM avapolos_sync WHERE instance = ?1 AND operation = ?2",
            params![instance.as_str(), operation.code_str()],
            |row| row.get(0),
        )?;
        max.map(to_iteration).transpose()
    }

    async fn insert(
        &self,
        instance: &InstanceCode,
        iteration: u32,
        operation: Operation,
    ) -> SyncResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO avapolos_sync (created, instance, iteration, operation)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                Utc::now().to_rfc3339(),
                instance.as_str(),
                iteration as i64,
                operation.code_str(),
            ],
        )?;
        Ok(())
    }

    async fn records(
        &self,
        instance: &InstanceCode,
        operation: Operation,
    ) -> SyncResult<Vec<SyncRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, created, iteration
             FROM avapolos_sync
             WHERE instance = ?1 AND operation = ?2",
        )?;
        let rows = stmt
            .query_map(params![instance.as_str(), operation.code_str()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, created, iteration)| {
                Ok(SyncRecord {
                    id,
                    created: parse_created(&created)?,
                    instance: instance.clone(),
                    iteration: to_iteration(iteration)?,
                    operation,
                })
            })
            .collect()
    }
}

fn to_iteration(value: i64) -> SyncResult<u32> {
    u32::try_from(value)
        .map_err(|_| SyncError::Ledger(format!("iteration out of range: {}", value)))
}

fn parse_created(raw: &str) -> SyncResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SyncError::Ledger(format!("invalid created timestamp {:?}: {}", raw, e)))
}
