//! Persistence of run snapshots between runs.

use std::{
    collections::HashMap,
    fmt,
    path::{Path, PathBuf},
};

use anyhow::Context;
use async_trait::async_trait;
use nimbus_model::{STATE_BLOB_VERSION, StateBlob};
use tokio::{io::AsyncWriteExt, sync::RwLock};
use uuid::Uuid;

use crate::error::StateLoadError;

/// Keyed storage for [`StateBlob`]s. Keys are report names.
#[async_trait]
pub trait StateStore: Send + Sync + fmt::Debug {
    async fn load(&self, key: &str) -> Result<StateBlob, StateLoadError>;

    async fn persist(&self, key: &str, blob: &StateBlob) -> anyhow::Result<()>;
}

/// One pretty-printed JSON file per key under `root`.
#[derive(Clone, Debug)]
pub struct JsonFileStateStore {
    root: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for_key(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

fn parse_blob(origin: &str, raw: &[u8]) -> Result<StateBlob, StateLoadError> {
    let blob: StateBlob =
        serde_json::from_slice(raw).map_err(|source| StateLoadError::Invalid {
            origin: origin.to_string(),
            source,
        })?;
    if blob.version != STATE_BLOB_VERSION {
        return Err(StateLoadError::UnsupportedVersion {
            found: blob.version,
            expected: STATE_BLOB_VERSION,
        });
    }
    Ok(blob)
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn load(&self, key: &str) -> Result<StateBlob, StateLoadError> {
        let path = self.path_for_key(key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StateLoadError::Missing { path });
            }
            Err(source) => return Err(StateLoadError::Io { path, source }),
        };

        parse_blob(&path.display().to_string(), &raw)
    }

    /// Writes through a temp file and renames it into place, so readers
    /// never observe a partial snapshot.
    async fn persist(&self, key: &str, blob: &StateBlob) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| {
                format!("failed to create state dir {}", self.root.display())
            })?;

        let path = self.path_for_key(key);
        let tmp = self
            .root
            .join(format!("{key}.json.tmp-{}", Uuid::new_v4().simple()));
        let bytes = serde_json::to_vec_pretty(blob)
            .context("failed to serialize state snapshot")?;

        let mut file = tokio::fs::File::create(&tmp).await.with_context(|| {
            format!("failed to create temp state file {}", tmp.display())
        })?;
        file.write_all(&bytes).await.with_context(|| {
            format!("failed to write temp state file {}", tmp.display())
        })?;
        file.flush().await.with_context(|| {
            format!("failed to flush temp state file {}", tmp.display())
        })?;
        drop(file);

        if let Err(err) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err).with_context(|| {
                format!(
                    "failed to move state file {} -> {}",
                    tmp.display(),
                    path.display()
                )
            });
        }

        tracing::debug!(
            target: "nimbus::state",
            path = %path.display(),
            services = blob.services.len(),
            "state snapshot persisted"
        );
        Ok(())
    }
}

/// Serialized snapshots held in memory. Blobs round-trip through JSON so the
/// same validation applies as for files.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds raw bytes under `key`, valid or not.
    pub async fn insert_raw(&self, key: impl Into<String>, raw: impl Into<Vec<u8>>) {
        self.blobs.write().await.insert(key.into(), raw.into());
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.blobs.read().await.contains_key(key)
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, key: &str) -> Result<StateBlob, StateLoadError> {
        let blobs = self.blobs.read().await;
        let raw = blobs.get(key).ok_or_else(|| StateLoadError::MissingKey {
            key: key.to_string(),
        })?;
        parse_blob(key, raw)
    }

    async fn persist(&self, key: &str, blob: &StateBlob) -> anyhow::Result<()> {
        let raw = serde_json::to_vec(blob)
            .context("failed to serialize state snapshot")?;
        self.blobs.write().await.insert(key.to_string(), raw);
        Ok(())
    }
}
