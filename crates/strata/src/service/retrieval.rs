//! Retrieval read path
//!
//! Cache-aside lookup in strict tier order: local cache, then fast tier,
//! then the cold tier's per-key store. Fast-tier hits populate the local
//! value cache. Cold-tier hits never do: archival reads may be large
//! batches and must not displace hot-key entries.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::LocalCache;
use crate::error::{Result, StrataError};
use crate::service::types::{Retrieved, RetrievalSource};
use crate::tier::{self, ColdStore, FastTier};

/// The read path
pub struct RetrievalService {
    fast: Arc<dyn FastTier>,
    cold: Arc<dyn ColdStore>,
    cache: Arc<LocalCache>,
    op_timeout: Duration,
}

impl RetrievalService {
    pub fn new(
        fast: Arc<dyn FastTier>,
        cold: Arc<dyn ColdStore>,
        cache: Arc<LocalCache>,
        op_timeout: Duration,
    ) -> Self {
        Self {
            fast,
            cold,
            cache,
            op_timeout,
        }
    }

    /// Look up one key across the tiers.
    ///
    /// Returns `Err(NotFound)` only after every tier has missed.
    pub async fn retrieve(&self, key: &str) -> Result<Retrieved> {
        if key.is_empty() {
            return Err(StrataError::InvalidInput("key must not be empty".to_string()));
        }

        if let Some(value) = self.cache.value(key) {
            return Ok(Retrieved {
                source: RetrievalSource::Local,
                value,
            });
        }

        let fast_read = tier::timed("get", self.op_timeout, self.fast.get(key)).await;
        match fast_read {
            Ok(Some(bytes)) => {
                let value = parse_payload(&bytes);
                self.cache.put_value(key, value.clone());
                Ok(Retrieved {
                    source: RetrievalSource::Fast,
                    value,
                })
            }
            Ok(None) => self.cold_lookup(key).await,
            Err(e) => {
                // A failing fast tier falls through the same way a miss does
                tracing::warn!("fast-tier read for key {key:?} failed: {e}");
                self.cold_lookup(key).await
            }
        }
    }

    async fn cold_lookup(&self, key: &str) -> Result<Retrieved> {
        match self.cold.get_key(key).await {
            Ok(Some(bytes)) => Ok(Retrieved {
                source: RetrievalSource::Cold,
                value: parse_payload(&bytes),
            }),
            Ok(None) => Err(StrataError::NotFound(key.to_string())),
            Err(e) => {
                tracing::warn!("cold-tier read for key {key:?} failed: {e}");
                Err(StrataError::NotFound(key.to_string()))
            }
        }
    }
}

/// Stored payloads are JSON; anything that no longer parses is surfaced as
/// a raw string rather than dropped.
fn parse_payload(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
