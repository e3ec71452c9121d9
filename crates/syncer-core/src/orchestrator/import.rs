use std::path::PathBuf;

use tracing::Instrument;

use super::{blocking, ImportReport, ImportState, Orchestrator};
use crate::errors::{SyncError, SyncResult};
use crate::packet::{paths, replace_tree};
use crate::types::{Operation, PacketName};

impl Orchestrator {
    /// Pull the next expected packet for this instance into the sync replica
    /// and let logical replication carry it into the main database.
    ///
    /// A missing packet fails before any service or filesystem is touched.
    /// Later failures are not compensated: the sync replica and the
    /// downloaded files stay as they are for operator inspection.
    pub async fn import(&self) -> SyncResult<ImportReport> {
        let instance = self.settings.instance.clone();
        let iteration = self.ledger.next_iteration(&instance, Operation::Import).await?;
        let packet = PacketName::new(instance.clone(), iteration);

        let span = tracing::info_span!("import", %instance, iteration);
        async move {
            let key = packet.to_string();
            tracing::debug!(state = %ImportState::IterationAssigned, key = %key, "searching for packet");
            if !self.store.has(&key).await? {
                tracing::warn!(key = %key, "import packet not found in object storage");
                return Err(SyncError::NotFound { key });
            }

            let mut state = ImportState::ArchiveLocated;
            match self.import_steps(&packet, &mut state).await {
                Ok(()) => {
                    tracing::info!(key = %key, "import done");
                    Ok(ImportReport {
                        packet,
                        state: ImportState::Done,
                    })
                }
                Err(err) => {
                    tracing::error!(state = %state, error = %err, "import failed, leaving replica as is");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn import_steps(&self, packet: &PacketName, state: &mut ImportState) -> SyncResult<()> {
        let main = &self.settings.main_service;
        let sync = &self.settings.sync_service;
        let key = packet.to_string();

        let sync_data = self
            .services
            .volume_mountpoint(sync, &self.settings.database_mount)
            .await?;

        let tmp = self.packets.fresh_path("-import");
        let archive = tmp.join("import.tgz");
        self.store.get(&key, &archive).await?;
        *state = ImportState::Downloaded;
        tracing::info!(archive = %archive.display(), "packet downloaded");

        let packets = self.packets.clone();
        let downloaded = archive.clone();
        let data_root = blocking(move || packets.unpack(&downloaded)).await?;
        *state = ImportState::Unpacked;

        tracing::info!(target_dir = %sync_data.display(), "replacing sync database data");
        let unpacked_db = data_root.join(paths::DATABASE);
        let target = sync_data.clone();
        let files = blocking(move || replace_database(unpacked_db, target)).await?;
        *state = ImportState::DataReplaced;
        tracing::debug!(files, "sync database data replaced");

        tracing::info!("restarting services around the sync replica");
        self.services.stop(main).await?;
        self.services.start(sync).await?;
        self.services.start(main).await?;
        *state = ImportState::ReplicaStarted;

        tracing::info!("waiting for replication");
        self.monitor.await_reachable().await?;
        self.monitor.await_convergence().await?;
        *state = ImportState::Converged;

        tracing::info!("stopping sync service");
        self.services.stop(sync).await?;

        self.ledger
            .record_operation(&self.settings.instance, packet.iteration, Operation::Import)
            .await?;
        *state = ImportState::Logged;

        self.purge_application().await?;
        *state = ImportState::CachePurged;

        self.packets.cleanup(&tmp);
        Ok(())
    }

    async fn purge_application(&self) -> SyncResult<()> {
        let Some(app) = self.settings.app_service.as_deref() else {
            tracing::debug!("no application service configured, skipping cache purge");
            return Ok(());
        };

        if !self.settings.purge_command.is_empty() {
            tracing::info!(service = %app, "purging application cache");
            self.services
                .run_command(app, &self.settings.purge_command)
                .await?;
        }
        if self.settings.restart_app {
            tracing::info!(service = %app, "restarting application");
            self.services.restart(app).await?;
        }
        Ok(())
    }
}

/// Destructive and not resumable: an interrupted copy leaves a partial data dir.
fn replace_database(unpacked_db: PathBuf, target: PathBuf) -> SyncResult<u64> {
    if !unpacked_db.is_dir() {
        return Err(SyncError::io(
            "reading packet",
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("packet has no {}/ entry", paths::DATABASE),
            ),
        ));
    }
    replace_tree(&unpacked_db, &target).map_err(|e| {
        SyncError::io(format!("replacing {}", target.display()), e)
    })
}
