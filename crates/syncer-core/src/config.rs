//! `syncer.yaml`: which instance we are, where the ledger and bucket live,
//! and which services and mounts make up a deployment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{SyncError, SyncResult};
use crate::packet::paths;
use crate::replication::MonitorSettings;
use crate::types::InstanceCode;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncerConfig {
    /// 4-character code of this deployment.
    pub instance: String,
    pub ledger: LedgerConfig,
    pub store: StoreConfig,
    pub services: ServicesConfig,
    pub paths: PathsConfig,
    pub replication: ReplicationConfig,
    pub app: AppConfig,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBackend {
    #[default]
    Postgres,
    Sqlite,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    /// Main database URL; also used for the replication probe.
    pub url: Option<String>,
    /// SQLite file, for the sqlite backend.
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::Postgres,
            url: None,
            path: PathBuf::from("syncer.db"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Exports bucket URL (`s3://bucket/prefix`, `file:///path`, `memory://`).
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "s3://exports".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServicesConfig {
    pub main: String,
    pub sync: String,
    /// Application service whose cache is purged after an import.
    pub app: Option<String>,
    /// Service controller binary.
    pub docker_bin: String,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            main: "db_main".to_string(),
            sync: "db_sync".to_string(),
            app: Some("moodle".to_string()),
            docker_bin: "docker".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Data directory of the database services, as seen inside the container.
    pub database_mount: String,
    /// Application data mount holding the bulk file store.
    pub filedir_mount: String,
    /// Bulk file store directory below `filedir_mount`.
    pub filedir_subdir: String,
    /// Temporary roots and archives; defaults to the OS temp dir.
    pub work_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            database_mount: "/var/lib/postgresql/data".to_string(),
            filedir_mount: "/app/moodledata".to_string(),
            filedir_subdir: paths::FILEDIR.to_string(),
            work_dir: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReplicationConfig {
    pub max_attempts: u32,
    pub interval_ms: u64,
    pub convergence_timeout_secs: u64,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval_ms: 1000,
            convergence_timeout_secs: 600,
        }
    }
}

impl ReplicationConfig {
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            max_attempts: self.max_attempts,
            interval: Duration::from_millis(self.interval_ms),
            convergence_timeout: Duration::from_secs(self.convergence_timeout_secs),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Run inside the app service after a successful import. Empty to skip.
    pub purge_command: Vec<String>,
    pub restart: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            purge_command: vec![
                "php".to_string(),
                "/app/public/admin/cli/purge_caches.php".to_string(),
            ],
            restart: true,
        }
    }
}

impl SyncerConfig {
    pub fn from_yaml(raw: &str) -> SyncResult<Self> {
        serde_yaml::from_str(raw).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> SyncResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_yaml(&raw)
                .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(SyncError::io(format!("reading {}", path.display()), e)),
        }
    }

    pub fn instance_code(&self) -> SyncResult<InstanceCode> {
        InstanceCode::new(self.instance.clone())
    }

    pub fn work_dir(&self) -> PathBuf {
        self.paths
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn validate(&self) -> SyncResult<()> {
        self.instance_code()?;
        if self.replication.max_attempts == 0 {
            return Err(SyncError::Config(
                "replication.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.ledger.backend == LedgerBackend::Postgres && self.ledger.url.is_none() {
            return Err(SyncError::Config(
                "ledger.url is required for the postgres backend".to_string(),
            ));
        }
        if self.services.main == self.services.sync {
            return Err(SyncError::Config(
                "services.main and services.sync must differ".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_yaml_parses() {
        let cfg = SyncerConfig::from_yaml(
            r#"
instance: IES1
ledger:
  backend: postgres
  url: postgres://u:p@localhost/moodle
store:
  url: s3://exports/avapolos?region=us-east-1
services:
  main: main_db
  sync: sync_db
  app: moodle
paths:
  work_dir: /var/tmp/syncer
replication:
  max_attempts: 3
  interval_ms: 250
  convergence_timeout_secs: 60
app:
  purge_command: ["php", "purge.php"]
  restart: false
"#,
        )
        .unwrap();

        cfg.validate().unwrap();
        assert_eq!(cfg.instance_code().unwrap().as_str(), "IES1");
        assert_eq!(cfg.services.main, "main_db");
        assert_eq!(cfg.work_dir(), PathBuf::from("/var/tmp/syncer"));
        assert_eq!(cfg.paths.database_mount, "/var/lib/postgresql/data");

        let monitor = cfg.replication.monitor_settings();
        assert_eq!(monitor.max_attempts, 3);
        assert_eq!(monitor.interval, Duration::from_millis(250));
        assert!(!cfg.app.restart);
    }

    #[test]
    fn minimal_sqlite_yaml_uses_defaults() {
        let cfg = SyncerConfig::from_yaml("instance: POLO\nledger:\n  backend: sqlite\n").unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.ledger.path, PathBuf::from("syncer.db"));
        assert_eq!(cfg.replication, ReplicationConfig::default());
        assert_eq!(cfg.app.purge_command.len(), 2);
    }

    #[test]
    fn invalid_instance_is_rejected() {
        let cfg = SyncerConfig::from_yaml("instance: TOOLONG\nledger:\n  backend: sqlite\n").unwrap();
        assert!(matches!(cfg.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn postgres_requires_url() {
        let cfg = SyncerConfig::from_yaml("instance: IES1\n").unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(SyncerConfig::from_yaml("instance: IES1\nbogus: 1\n").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SyncerConfig::load(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(cfg, SyncerConfig::default());
    }
}
