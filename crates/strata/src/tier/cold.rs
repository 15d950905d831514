//! Cold-tier store interface and filesystem implementation
//!
//! The cold tier is a higher-latency, capacity-elastic store used for
//! overflow and archive. Two write modes exist: bulk overflow appends a
//! batch of records as one line-delimited JSON file per invocation, and the
//! per-key mode stores one addressable object per key for later lookup.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{Result, StrataError};

const OFFLOAD_SUBDIR: &str = "offloaded";

/// Client contract for the cold tier
#[async_trait]
pub trait ColdStore: Send + Sync {
    /// Create the store's directory layout if missing
    async fn ensure_root(&self) -> Result<()>;

    /// Append a batch of records as one new line-delimited JSON object file.
    /// Returns the path of the file written.
    async fn bulk_append(&self, records: &[serde_json::Value]) -> Result<PathBuf>;

    /// Store one addressable object for a key, overwriting any previous one
    async fn put_key(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Fetch the object for a key, or `None` if absent
    async fn get_key(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Filesystem-rooted cold store.
///
/// Bulk overflow files land directly under the root; per-key objects live
/// under `offloaded/`, named by a reversible percent-encoding of the key so
/// arbitrary keys map to distinct, filesystem-safe names.
pub struct FsColdStore {
    root: PathBuf,
}

impl FsColdStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn offload_dir(&self) -> PathBuf {
        self.root.join(OFFLOAD_SUBDIR)
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.offload_dir()
            .join(format!("{}.json", encode_key(key)))
    }
}

/// Reversible, collision-resistant key-to-filename encoding
fn encode_key(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

#[async_trait]
impl ColdStore for FsColdStore {
    async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.offload_dir())
            .await
            .map_err(|e| {
                StrataError::ColdTier(format!(
                    "failed to create {}: {e}",
                    self.root.display()
                ))
            })
    }

    async fn bulk_append(&self, records: &[serde_json::Value]) -> Result<PathBuf> {
        self.ensure_root().await?;

        // Millisecond prefix keeps files legible in arrival order; the uuid
        // suffix keeps concurrent fallback bursts from colliding.
        let name = format!(
            "overflow_{}_{}.jsonl",
            chrono::Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4().simple()
        );
        let path = self.root.join(name);

        let mut lines = String::new();
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| StrataError::Serialization(e.to_string()))?;
            lines.push_str(&line);
            lines.push('\n');
        }

        tokio::fs::write(&path, lines).await.map_err(|e| {
            StrataError::ColdTier(format!("bulk write to {} failed: {e}", path.display()))
        })?;
        Ok(path)
    }

    async fn put_key(&self, key: &str, value: &[u8]) -> Result<()> {
        self.ensure_root().await?;

        let path = self.key_path(key);
        tokio::fs::write(&path, value).await.map_err(|e| {
            StrataError::ColdTier(format!("write for key {key:?} failed: {e}"))
        })
    }

    async fn get_key(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.key_path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StrataError::ColdTier(format!(
                "read for key {key:?} failed: {e}"
            ))),
        }
    }
}
