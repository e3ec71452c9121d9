#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use syncer_core::store::StoreResult;
use syncer_core::{
    Bytes, CommandOutput, FlowSettings, InstanceCode, Ledger, MonitorSettings,
    ObjectStorePacketStore, Orchestrator, PacketBuilder, PacketMeta, PacketStore,
    ReplicationMonitor, ReplicationProbe, ServiceController, SqliteLedgerStore, StoreError,
    SyncError, SyncResult,
};

pub const MAIN: &str = "db_main";
pub const SYNC: &str = "db_sync";
pub const APP: &str = "moodle";
pub const DB_MOUNT: &str = "/var/lib/postgresql/data";
pub const APP_MOUNT: &str = "/app/moodledata";

/// Records every call and keeps a running/stopped map per service.
/// Mounts resolve to `<root>/<service><container_path>`.
pub struct FakeServices {
    root: PathBuf,
    running: Mutex<HashMap<String, bool>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeServices {
    pub fn new(root: &Path) -> Arc<Self> {
        Arc::new(Self {
            root: root.to_path_buf(),
            running: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        })
    }

    pub fn mount(&self, service: &str, container_path: &str) -> PathBuf {
        self.root
            .join(service)
            .join(container_path.trim_start_matches('/'))
    }

    pub fn set_running(&self, service: &str, running: bool) {
        self.running
            .lock()
            .unwrap()
            .insert(service.to_string(), running);
    }

    pub fn is_running(&self, service: &str) -> bool {
        self.running
            .lock()
            .unwrap()
            .get(service)
            .copied()
            .unwrap_or(false)
    }

    /// Make `"<action> <service>"` fail from now on.
    pub fn fail_on(&self, call: &str) {
        self.failing.lock().unwrap().insert(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, action: &str, service: &str) -> SyncResult<()> {
        let call = format!("{action} {service}");
        self.calls.lock().unwrap().push(call.clone());
        if self.failing.lock().unwrap().contains(&call) {
            return Err(SyncError::service(service, action, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceController for FakeServices {
    async fn stop(&self, service: &str) -> SyncResult<()> {
        self.record("stop", service)?;
        self.set_running(service, false);
        Ok(())
    }

    async fn start(&self, service: &str) -> SyncResult<()> {
        self.record("start", service)?;
        self.set_running(service, true);
        Ok(())
    }

    async fn restart(&self, service: &str) -> SyncResult<()> {
        self.record("restart", service)?;
        self.set_running(service, true);
        Ok(())
    }

    async fn run_command(&self, service: &str, argv: &[String]) -> SyncResult<CommandOutput> {
        self.record(&format!("exec {}", argv.join(" ")), service)?;
        Ok(CommandOutput::default())
    }

    async fn volume_mountpoint(
        &self,
        service: &str,
        container_path: &str,
    ) -> SyncResult<PathBuf> {
        Ok(self.mount(service, container_path))
    }
}

/// Fails `ping` a fixed number of times, then succeeds.
pub struct ScriptedProbe {
    ping_failures: AtomicU32,
    pub pings: AtomicU32,
    flush_delay: Duration,
}

impl ScriptedProbe {
    pub fn healthy() -> Arc<Self> {
        Self::new(0, Duration::ZERO)
    }

    pub fn unreachable() -> Arc<Self> {
        Self::new(u32::MAX, Duration::ZERO)
    }

    pub fn new(ping_failures: u32, flush_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            ping_failures: AtomicU32::new(ping_failures),
            pings: AtomicU32::new(0),
            flush_delay,
        })
    }
}

#[async_trait]
impl ReplicationProbe for ScriptedProbe {
    async fn ping(&self) -> SyncResult<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        let left = self.ping_failures.load(Ordering::SeqCst);
        if left > 0 {
            self.ping_failures.store(left - 1, Ordering::SeqCst);
            return Err(SyncError::Ledger("connection refused".to_string()));
        }
        Ok(())
    }

    async fn wait_for_confirmed_flush(&self) -> SyncResult<()> {
        tokio::time::sleep(self.flush_delay).await;
        Ok(())
    }
}

/// Delegates to an inner store but refuses every upload.
pub struct FailingUploadStore {
    pub inner: ObjectStorePacketStore,
}

#[async_trait]
impl PacketStore for FailingUploadStore {
    async fn put(&self, _key: &str, _local_path: &Path) -> StoreResult<()> {
        Err(StoreError::Io {
            message: "connection reset by peer".to_string(),
        })
    }

    async fn get(&self, key: &str, local_path: &Path) -> StoreResult<()> {
        self.inner.get(key, local_path).await
    }

    async fn has(&self, key: &str) -> StoreResult<bool> {
        self.inner.has(key).await
    }

    async fn get_stream(&self, key: &str) -> StoreResult<BoxStream<'static, StoreResult<Bytes>>> {
        self.inner.get_stream(key).await
    }

    async fn list(&self) -> StoreResult<Vec<PacketMeta>> {
        self.inner.list().await
    }
}

pub fn code(s: &str) -> InstanceCode {
    InstanceCode::new(s).unwrap()
}

pub fn fast_monitor(probe: Arc<dyn ReplicationProbe>) -> ReplicationMonitor {
    ReplicationMonitor::new(
        probe,
        MonitorSettings {
            max_attempts: 3,
            interval: Duration::from_millis(5),
            convergence_timeout: Duration::from_millis(200),
        },
    )
}

pub fn settings(instance: &str) -> FlowSettings {
    FlowSettings {
        instance: code(instance),
        main_service: MAIN.to_string(),
        sync_service: SYNC.to_string(),
        app_service: Some(APP.to_string()),
        database_mount: DB_MOUNT.to_string(),
        filedir_mount: APP_MOUNT.to_string(),
        filedir_subdir: "filedir".to_string(),
        purge_command: vec!["php".to_string(), "purge_caches.php".to_string()],
        restart_app: true,
    }
}

pub fn sqlite_ledger() -> Ledger {
    Ledger::new(Arc::new(SqliteLedgerStore::memory().unwrap()))
}

/// One deployment under test: its fakes, ledger and work dir.
pub struct Deployment {
    pub root: tempfile::TempDir,
    pub work: tempfile::TempDir,
    pub services: Arc<FakeServices>,
    pub ledger: Ledger,
}

impl Deployment {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let services = FakeServices::new(root.path());
        Self {
            root,
            work,
            services,
            ledger: sqlite_ledger(),
        }
    }

    /// Populate the main database and file store mounts with some content.
    pub fn seed_data(&self) {
        let db = self.services.mount(MAIN, DB_MOUNT);
        std::fs::create_dir_all(db.join("base/1")).unwrap();
        std::fs::write(db.join("PG_VERSION"), "12\n").unwrap();
        std::fs::write(db.join("base/1/16384"), vec![7u8; 4096]).unwrap();

        let files = self.services.mount(APP, APP_MOUNT).join("filedir");
        std::fs::create_dir_all(files.join("ab/cd")).unwrap();
        std::fs::write(files.join("ab/cd/abcdef"), "course material").unwrap();
    }

    pub fn orchestrator(
        &self,
        instance: &str,
        store: Arc<dyn PacketStore>,
        probe: Arc<dyn ReplicationProbe>,
    ) -> Orchestrator {
        Orchestrator::new(
            settings(instance),
            self.ledger.clone(),
            PacketBuilder::new(self.work.path()),
            store,
            self.services.clone(),
            fast_monitor(probe),
        )
    }

    pub fn work_dir_entries(&self) -> Vec<String> {
        std::fs::read_dir(self.work.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}
