pub mod config;
pub mod errors;
pub mod ledger;
pub mod orchestrator;
pub mod packet;
pub mod replication;
pub mod service;
pub mod store;
pub mod types;

// Convenience re-exports
pub use config::{LedgerBackend, SyncerConfig};
pub use errors::{SyncError, SyncResult};
pub use ledger::{Ledger, LedgerStore, PostgresLedgerStore, SqliteLedgerStore};
pub use orchestrator::{
    ExportReport, ExportState, FlowSettings, ImportReport, ImportState, Orchestrator,
};
pub use packet::{PacketBuilder, SnapshotSource};
pub use replication::{MonitorSettings, PgReplicationProbe, ReplicationMonitor, ReplicationProbe};
pub use service::{CommandOutput, DockerCli, ServiceController};
pub use store::{
    ObjectStorePacketStore, PacketMeta, PacketStore, StoreError, StoreScheme, StoreSpec,
};
pub use types::{InstanceCode, Operation, PacketName, SyncRecord};

// Re-export bytes for CLI convenience
pub use bytes::Bytes;
