use tracing::Instrument;

use super::{blocking, ExportReport, ExportState, Orchestrator};
use crate::errors::{SyncError, SyncResult};
use crate::packet::{paths, SnapshotSource};
use crate::types::{Operation, PacketName};

impl Orchestrator {
    /// Snapshot this instance, upload the packet and let the sync replica catch up.
    ///
    /// Any failure between pausing the producer and convergence is
    /// compensated: the sync service is stopped (errors ignored) and the
    /// main service is started again before the original error is returned.
    /// The ledger record is never rolled back.
    pub async fn export(&self) -> SyncResult<ExportReport> {
        let instance = self.settings.instance.clone();
        let iteration = self.ledger.next_iteration(&instance, Operation::Export).await?;
        let packet = PacketName::new(instance.clone(), iteration);

        let span = tracing::info_span!("export", %instance, iteration);
        async move {
            tracing::debug!(state = %ExportState::IterationAssigned, "next export iteration assigned");
            if let Err(err) = self
                .ledger
                .record_operation(&instance, iteration, Operation::Export)
                .await
            {
                tracing::error!(state = %ExportState::IterationAssigned, error = %err, "could not record export");
                return Err(err);
            }
            let mut state = ExportState::Logged;

            if let Err(err) = self.export_steps(&packet, &mut state).await {
                tracing::error!(state = %state, error = %err, "export failed, restoring services");
                let err = self.compensate_export(err).await;
                tracing::debug!(state = %ExportState::Failed, "export compensation finished");
                return Err(err);
            }

            tracing::info!("stopping sync service");
            if let Err(err) = self.services.stop(&self.settings.sync_service).await {
                tracing::error!(state = %ExportState::Converged, error = %err, "could not stop sync service");
                return Err(err);
            }
            tracing::debug!(state = %ExportState::SyncPaused, "sync service stopped");

            tracing::info!(key = %packet, "export done");
            Ok(ExportReport {
                packet,
                state: ExportState::Done,
            })
        }
        .instrument(span)
        .await
    }

    /// Steps covered by compensation: pause, snapshot, package, upload, resume, converge.
    async fn export_steps(&self, packet: &PacketName, state: &mut ExportState) -> SyncResult<()> {
        let main = &self.settings.main_service;
        let sync = &self.settings.sync_service;

        let database = self
            .services
            .volume_mountpoint(main, &self.settings.database_mount)
            .await?;
        let filedir = self.filedir_source().await?;

        tracing::info!(service = %main, "stopping main service");
        self.services.stop(main).await?;
        *state = ExportState::ProducerPaused;

        tracing::info!("creating sync packet");
        let packets = self.packets.clone();
        let sources = vec![
            SnapshotSource::new(database, paths::DATABASE),
            SnapshotSource::new(filedir, paths::FILEDIR),
        ];
        let root = blocking(move || packets.snapshot(&sources)).await?;
        *state = ExportState::Snapshotted;

        let packets = self.packets.clone();
        let packaged_root = root.clone();
        let archive = blocking(move || packets.package(&packaged_root)).await?;
        // A failed packaging leaves the root behind for inspection.
        self.packets.cleanup(&root);
        *state = ExportState::Packaged;

        let key = packet.to_string();
        tracing::info!(key = %key, archive = %archive.display(), "uploading packet");
        self.store.put(&key, &archive).await?;
        *state = ExportState::Uploaded;
        self.packets.cleanup(&archive);

        tracing::info!("resuming main service and starting sync service");
        self.services.start(main).await?;
        *state = ExportState::ProducerResumed;
        self.services.start(sync).await?;

        tracing::info!("waiting for replication");
        self.monitor.await_reachable().await?;
        self.monitor.await_convergence().await?;
        *state = ExportState::Converged;

        Ok(())
    }

    async fn compensate_export(&self, original: SyncError) -> SyncError {
        let sync = &self.settings.sync_service;
        if let Err(e) = self.services.stop(sync).await {
            tracing::warn!(service = %sync, error = %e, "could not stop sync service during compensation");
        }

        let main = &self.settings.main_service;
        match self.services.start(main).await {
            Ok(()) => original,
            Err(secondary) => {
                tracing::error!(service = %main, error = %secondary, "could not restore main service");
                SyncError::Compensation {
                    original: Box::new(original),
                    secondary: Box::new(secondary),
                }
            }
        }
    }
}
