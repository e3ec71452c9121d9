//! Export and import flows.
//!
//! Each flow is a strictly sequential state machine. The orchestrator holds
//! no per-flow state, so `export()` and `import()` can be called repeatedly;
//! running two flows for the same instance at once is not defended against.
//!
//! The ledger write timing differs between the flows on purpose: export
//! records the iteration before doing any work (a crash burns the number),
//! import records it only after the replica converged.

mod export;
mod import;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::SyncerConfig;
use crate::errors::{SyncError, SyncResult};
use crate::ledger::Ledger;
use crate::packet::PacketBuilder;
use crate::replication::ReplicationMonitor;
use crate::service::ServiceController;
use crate::store::PacketStore;
use crate::types::{InstanceCode, PacketName};

/// Export flow states, in order. `Failed` is reached only via compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    IterationAssigned,
    Logged,
    ProducerPaused,
    Snapshotted,
    Packaged,
    Uploaded,
    ProducerResumed,
    Converged,
    SyncPaused,
    Done,
    Failed,
}

/// Import flow states, in order. There is no compensation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Idle,
    IterationAssigned,
    ArchiveLocated,
    Downloaded,
    Unpacked,
    DataReplaced,
    ReplicaStarted,
    Converged,
    Logged,
    CachePurged,
    Done,
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Service names and mount points that make up one deployment.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub instance: InstanceCode,
    pub main_service: String,
    pub sync_service: String,
    pub app_service: Option<String>,
    pub database_mount: String,
    pub filedir_mount: String,
    pub filedir_subdir: String,
    pub purge_command: Vec<String>,
    pub restart_app: bool,
}

impl FlowSettings {
    pub fn from_config(cfg: &SyncerConfig) -> SyncResult<Self> {
        Ok(Self {
            instance: cfg.instance_code()?,
            main_service: cfg.services.main.clone(),
            sync_service: cfg.services.sync.clone(),
            app_service: cfg.services.app.clone(),
            database_mount: cfg.paths.database_mount.clone(),
            filedir_mount: cfg.paths.filedir_mount.clone(),
            filedir_subdir: cfg.paths.filedir_subdir.clone(),
            purge_command: cfg.app.purge_command.clone(),
            restart_app: cfg.app.restart,
        })
    }
}

/// Outcome of a completed export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub packet: PacketName,
    pub state: ExportState,
}

/// Outcome of a completed import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub packet: PacketName,
    pub state: ImportState,
}

pub struct Orchestrator {
    settings: FlowSettings,
    ledger: Ledger,
    packets: PacketBuilder,
    store: Arc<dyn PacketStore>,
    services: Arc<dyn ServiceController>,
    monitor: ReplicationMonitor,
}

impl Orchestrator {
    pub fn new(
        settings: FlowSettings,
        ledger: Ledger,
        packets: PacketBuilder,
        store: Arc<dyn PacketStore>,
        services: Arc<dyn ServiceController>,
        monitor: ReplicationMonitor,
    ) -> Self {
        Self {
            settings,
            ledger,
            packets,
            store,
            services,
            monitor,
        }
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Host directory of the bulk file store, via the application's mount.
    async fn filedir_source(&self) -> SyncResult<PathBuf> {
        let app = self.settings.app_service.as_deref().ok_or_else(|| {
            SyncError::Config("services.app is required to locate the file store".to_string())
        })?;
        let mount = self
            .services
            .volume_mountpoint(app, &self.settings.filedir_mount)
            .await?;
        Ok(mount.join(&self.settings.filedir_subdir))
    }
}

/// Run blocking filesystem work off the async runtime.
async fn blocking<T, F>(f: F) -> SyncResult<T>
where
    F: FnOnce() -> SyncResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
