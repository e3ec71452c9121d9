//! Wiring from `syncer.yaml` to the concrete ledger, store, service and probe.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use syncer_core::{
    DockerCli, FlowSettings, Ledger, LedgerBackend, LedgerStore, ObjectStorePacketStore,
    Orchestrator, PacketBuilder, PacketStore, PgReplicationProbe, PostgresLedgerStore,
    ReplicationMonitor, SqliteLedgerStore, SyncError, SyncerConfig,
};

use crate::cli::args::Cli;

pub struct Context {
    pub config: SyncerConfig,
}

impl Context {
    /// Load the config file and apply flag/env overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = SyncerConfig::load(&cli.config)
            .with_context(|| format!("failed to load config: {}", cli.config.display()))?;

        let overrides = &cli.overrides;
        if let Some(instance) = &overrides.instance {
            config.instance = instance.clone();
        }
        if let Some(url) = &overrides.ledger_url {
            config.ledger.url = Some(url.clone());
        }
        if let Some(url) = &overrides.store_url {
            config.store.url = url.clone();
        }
        Ok(Self { config })
    }

    pub fn validate(&self) -> Result<()> {
        self.config.validate().context("invalid configuration")
    }

    fn postgres_url(&self, purpose: &str) -> Result<&str> {
        self.config
            .ledger
            .url
            .as_deref()
            .ok_or_else(|| SyncError::Config(format!("ledger.url is required for {purpose}")))
            .map_err(Into::into)
    }

    fn ledger_store(&self) -> Result<Arc<dyn LedgerStore>> {
        let store: Arc<dyn LedgerStore> = match self.config.ledger.backend {
            LedgerBackend::Postgres => {
                Arc::new(PostgresLedgerStore::connect_lazy(self.postgres_url("the ledger")?)?)
            }
            LedgerBackend::Sqlite => {
                let path = &self.config.ledger.path;
                Arc::new(
                    SqliteLedgerStore::open(path)
                        .with_context(|| format!("failed to open ledger: {}", path.display()))?,
                )
            }
        };
        Ok(store)
    }

    /// Open the ledger and make sure its table exists. Runs on every
    /// invocation; concurrent creation on Postgres is tolerated by `init`.
    pub async fn ledger(&self) -> Result<Ledger> {
        let ledger = Ledger::new(self.ledger_store()?);
        ledger.init().await.context("failed to initialize ledger")?;
        Ok(ledger)
    }

    pub fn store(&self) -> Result<Arc<dyn PacketStore>> {
        let url = &self.config.store.url;
        let store = ObjectStorePacketStore::from_url(url)
            .with_context(|| format!("failed to open store: {url}"))?;
        Ok(Arc::new(store))
    }

    fn monitor(&self) -> Result<ReplicationMonitor> {
        let settings = self.config.replication.monitor_settings();
        let probe = PgReplicationProbe::connect_lazy(
            self.postgres_url("the replication probe")?,
            settings.interval,
        )?;
        Ok(ReplicationMonitor::new(Arc::new(probe), settings))
    }

    /// Everything a flow needs. Validates the configuration first.
    pub async fn orchestrator(&self) -> Result<Orchestrator> {
        self.validate()?;
        let cfg = &self.config;
        Ok(Orchestrator::new(
            FlowSettings::from_config(cfg)?,
            self.ledger().await?,
            PacketBuilder::new(cfg.work_dir()),
            self.store()?,
            Arc::new(DockerCli::new(cfg.services.docker_bin.clone())),
            self.monitor()?,
        ))
    }
}
