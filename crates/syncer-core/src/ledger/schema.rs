pub const SQLITE_LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS avapolos_sync (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    instance TEXT NOT NULL CHECK (length(instance) = 4),
    iteration INTEGER NOT NULL,
    operation TEXT NOT NULL CHECK (operation IN ('C', 'E', 'I'))
);

CREATE INDEX IF NOT EXISTS idx_avapolos_sync_instance_op
    ON avapolos_sync(instance, operation);
"#;

pub const POSTGRES_LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS avapolos_sync (
    id serial NOT NULL PRIMARY KEY,
    created timestamptz NOT NULL DEFAULT NOW(),
    instance char(4) NOT NULL,
    iteration int NOT NULL,
    operation char(1) NOT NULL
)
"#;

/// SQLSTATE `lock_not_available`, raised when another process is creating the table.
pub const PG_LOCK_NOT_AVAILABLE: &str = "55P03";
