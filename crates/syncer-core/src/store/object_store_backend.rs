//! Object store implementation of PacketStore.
//!
//! Supports S3 (and MinIO via `?endpoint=`), the local filesystem and an
//! in-memory backend via the `object_store` crate.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{ObjectStore, ObjectStoreExt, PutMode, PutOptions, PutPayload};
use tokio::io::AsyncWriteExt;

use super::{KeyBuilder, PacketMeta, PacketStore, StoreError, StoreResult, StoreScheme, StoreSpec};

pub struct ObjectStorePacketStore {
    inner: Arc<dyn ObjectStore>,
    keys: KeyBuilder,
}

impl ObjectStorePacketStore {
    pub fn from_spec(spec: &StoreSpec) -> StoreResult<Self> {
        match spec.scheme {
            StoreScheme::Memory => Ok(Self::with_store(Arc::new(InMemory::new()), &spec.prefix)),
            StoreScheme::File => {
                let dir = spec.local_dir();
                let io_err = |e: &dyn std::fmt::Display| StoreError::Io {
                    message: format!("cannot use {} as packet store: {}", dir.display(), e),
                };
                std::fs::create_dir_all(&dir).map_err(|e| io_err(&e))?;
                let local = LocalFileSystem::new_with_prefix(&dir).map_err(|e| io_err(&e))?;
                // Packets sit directly in the directory.
                Ok(Self::with_store(Arc::new(local), ""))
            }
            StoreScheme::S3 => {
                let bucket = spec.bucket.as_deref().unwrap_or_default();
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                if let Some(region) = &spec.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &spec.endpoint {
                    builder = builder
                        .with_endpoint(endpoint)
                        .with_allow_http(endpoint.starts_with("http://"));
                }
                let s3 = builder.build().map_err(|e| StoreError::Io {
                    message: format!("cannot configure S3 bucket {bucket}: {e}"),
                })?;
                tracing::debug!(bucket, prefix = %spec.prefix, "using S3 packet store");
                Ok(Self::with_store(Arc::new(s3), &spec.prefix))
            }
        }
    }

    pub fn from_url(url: &str) -> StoreResult<Self> {
        Self::from_spec(&StoreSpec::parse(url)?)
    }

    /// Empty process-local store.
    pub fn memory() -> Self {
        Self::with_store(Arc::new(InMemory::new()), "")
    }

    /// Wrap an already configured object store.
    pub fn with_store(inner: Arc<dyn ObjectStore>, prefix: &str) -> Self {
        Self {
            inner,
            keys: KeyBuilder::new(prefix),
        }
    }
}

#[async_trait]
impl PacketStore for ObjectStorePacketStore {
    async fn put(&self, key: &str, local_path: &Path) -> StoreResult<()> {
        let location = self.keys.packet_key(key);
        let data = tokio::fs::read(local_path).await.map_err(|e| StoreError::Io {
            message: format!("failed to read {}: {}", local_path.display(), e),
        })?;
        let size = data.len();

        let opts = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };

        match self
            .inner
            .put_opts(&location, PutPayload::from_bytes(Bytes::from(data)), opts)
            .await
        {
            Ok(_) => {
                tracing::debug!(key = %location, size, "packet uploaded");
                Ok(())
            }
            Err(e) => Err(StoreError::from_object_store(e, key)),
        }
    }

    async fn get(&self, key: &str, local_path: &Path) -> StoreResult<()> {
        let mut stream = self.get_stream(key).await?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| StoreError::Io {
                message: format!("failed to create {}: {}", local_path.display(), e),
            })?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::debug!(key, path = %local_path.display(), written, "packet downloaded");
        Ok(())
    }

    async fn has(&self, key: &str) -> StoreResult<bool> {
        let location = self.keys.packet_key(key);
        match self.inner.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StoreError::Io {
                message: format!("failed to check packet existence: {}", e),
            }),
        }
    }

    async fn get_stream(
        &self,
        key: &str,
    ) -> StoreResult<BoxStream<'static, StoreResult<Bytes>>> {
        let location = self.keys.packet_key(key);
        let result = self
            .inner
            .get(&location)
            .await
            .map_err(|e| StoreError::from_object_store(e, key))?;

        let owned_key = key.to_string();
        Ok(result
            .into_stream()
            .map_err(move |e| StoreError::from_object_store(e, &owned_key))
            .boxed())
    }

    async fn list(&self) -> StoreResult<Vec<PacketMeta>> {
        let prefix = self.keys.prefix();
        let entries: Vec<_> = self
            .inner
            .list(prefix.as_ref())
            .try_collect()
            .await
            .map_err(|e| StoreError::Io {
                message: format!("failed to list packets: {}", e),
            })?;

        Ok(entries
            .iter()
            .filter_map(|entry| {
                self.keys
                    .parse_packet_key(&entry.location)
                    .map(|name| PacketMeta {
                        name,
                        size: Some(entry.size as u64),
                        modified: Some(entry.last_modified),
                    })
            })
            .collect())
    }
}
