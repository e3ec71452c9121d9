//! Packet storage in the exports bucket.
//!
//! A thin adapter over S3-compatible object storage: upload, download,
//! existence checks and listing of `<instance>.<iteration>.tgz` packets.
//! Packets are immutable once uploaded; an import only ever reads them.

pub mod error;
pub mod naming;
pub mod object_store_backend;

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

pub use error::{StoreError, StoreResult};
pub use naming::KeyBuilder;
pub use object_store_backend::ObjectStorePacketStore;

use crate::types::PacketName;

/// Backends the exports bucket can live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScheme {
    /// S3 or an S3-compatible server (MinIO).
    S3,
    /// A local directory, mostly for single-host setups and tests.
    File,
    /// Process-local, for tests.
    Memory,
}

/// Where the exports bucket lives, as given in `store.url`.
///
/// ```text
/// s3://exports/avapolos?region=us-east-1
/// s3://exports?endpoint=http://minio:9000
/// file:///var/lib/syncer/exports
/// memory://
/// ```
#[derive(Debug, Clone)]
pub struct StoreSpec {
    pub scheme: StoreScheme,
    /// S3 bucket; `None` for `file://` and `memory://`.
    pub bucket: Option<String>,
    /// Key prefix inside the bucket, or the directory for `file://`.
    pub prefix: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

impl StoreSpec {
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let invalid = |reason: String| StoreError::InvalidSpec {
            spec: raw.to_string(),
            reason,
        };
        let url = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

        let scheme = match url.scheme() {
            "s3" => StoreScheme::S3,
            "file" => StoreScheme::File,
            "memory" => StoreScheme::Memory,
            other => return Err(invalid(format!("unsupported scheme: {other}"))),
        };
        let bucket = url
            .host_str()
            .filter(|host| !host.is_empty())
            .map(str::to_string);
        if scheme == StoreScheme::S3 && bucket.is_none() {
            return Err(invalid("S3 URL must include a bucket name".to_string()));
        }

        let param = |name: &str| {
            url.query_pairs()
                .find_map(|(k, v)| (k == name).then(|| v.into_owned()))
        };

        Ok(Self {
            scheme,
            bucket,
            prefix: url.path().trim_start_matches('/').to_string(),
            region: param("region"),
            endpoint: param("endpoint"),
        })
    }

    /// Directory backing a `file://` store.
    pub fn local_dir(&self) -> std::path::PathBuf {
        match &self.bucket {
            Some(host) => std::path::PathBuf::from(format!("/{}/{}", host, self.prefix)),
            None => std::path::PathBuf::from(format!("/{}", self.prefix)),
        }
    }
}

/// Metadata about a stored packet.
#[derive(Debug, Clone)]
pub struct PacketMeta {
    pub name: PacketName,
    pub size: Option<u64>,
    pub modified: Option<chrono::DateTime<chrono::Utc>>,
}

/// Object storage operations the flows depend on.
///
/// `key` is always a packet name (`<instance>.<iteration>.tgz`); the
/// implementation maps it into its bucket and prefix.
#[async_trait]
pub trait PacketStore: Send + Sync {
    /// Upload a local file. Fails with `AlreadyExists` rather than overwrite.
    async fn put(&self, key: &str, local_path: &Path) -> StoreResult<()>;

    /// Download to a local file, creating parent directories as needed.
    async fn get(&self, key: &str, local_path: &Path) -> StoreResult<()>;

    async fn has(&self, key: &str) -> StoreResult<bool>;

    /// Stream the packet's bytes without staging it on disk.
    async fn get_stream(&self, key: &str)
        -> StoreResult<BoxStream<'static, StoreResult<Bytes>>>;

    /// List packets in no guaranteed order.
    async fn list(&self) -> StoreResult<Vec<PacketMeta>>;
}
