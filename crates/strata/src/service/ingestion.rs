//! Ingestion write path
//!
//! Validates incoming records, decides placement against current memory
//! pressure, stamps the embedded ingestion timestamp, and writes to the
//! fast tier with the cold tier as the fallback on every failure mode.
//! Every valid request terminates in exactly one of stored=fast or
//! stored=cold. The fallback is fire-and-forget: availability over strict
//! durability, with no retry queue.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::cache::LocalCache;
use crate::error::{Result, StrataError};
use crate::pressure::PressureMonitor;
use crate::service::types::{
    CacheHint, INGESTION_TS_FIELD, IngestOutcome, IngestRequest, StoredTier,
};
use crate::tier::{self, ColdStore, FastTier};

/// Fast-tier TTL applied when a request omits one or sends a non-positive one
pub const DEFAULT_TTL_SECONDS: i64 = 3600;

/// The write path
pub struct IngestionService {
    fast: Arc<dyn FastTier>,
    cold: Arc<dyn ColdStore>,
    cache: Arc<LocalCache>,
    monitor: PressureMonitor,
    soft_ratio: f64,
    op_timeout: Duration,
}

impl IngestionService {
    pub fn new(
        fast: Arc<dyn FastTier>,
        cold: Arc<dyn ColdStore>,
        cache: Arc<LocalCache>,
        monitor: PressureMonitor,
        soft_ratio: f64,
        op_timeout: Duration,
    ) -> Self {
        Self {
            fast,
            cold,
            cache,
            monitor,
            soft_ratio,
            op_timeout,
        }
    }

    /// Ingest one record.
    ///
    /// Returns `Err(InvalidInput)` for an empty key or absent value; every
    /// other request resolves to an [`IngestOutcome`].
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome> {
        if request.key.is_empty() {
            return Err(StrataError::InvalidInput("key must not be empty".to_string()));
        }
        let Some(value) = request.value.as_ref() else {
            return Err(StrataError::InvalidInput("value is required".to_string()));
        };

        let ttl_seconds = request
            .ttl_seconds
            .filter(|ttl| *ttl > 0)
            .unwrap_or(DEFAULT_TTL_SECONDS);
        let ttl = Duration::from_secs(ttl_seconds as u64);

        // Best-effort hot flag; never observable to the caller
        if request.cache_hint == Some(CacheHint::HotRead) {
            self.cache.mark_hot(&request.key);
        }

        let pressure_ratio = self.monitor.sample().await.map(|sample| sample.ratio);

        // At or above the soft threshold the fast tier takes no new data at
        // all; the record goes straight to bulk overflow.
        if pressure_ratio.unwrap_or(0.0) >= self.soft_ratio {
            self.spill_to_cold(&request).await;
            return Ok(IngestOutcome {
                stored: StoredTier::Cold,
                pressure_ratio,
                error: None,
            });
        }

        let mut payload = value.clone();
        payload.insert(
            INGESTION_TS_FIELD.to_string(),
            json!(chrono::Utc::now().timestamp()),
        );

        let bytes = match serde_json::to_vec(&payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.spill_to_cold(&request).await;
                return Ok(IngestOutcome {
                    stored: StoredTier::Cold,
                    pressure_ratio,
                    error: Some(format!("serialization failed: {e}")),
                });
            }
        };

        let write = tier::timed(
            "set_with_ttl",
            self.op_timeout,
            self.fast.set_with_ttl(&request.key, bytes, ttl),
        )
        .await;

        match write {
            Ok(()) => Ok(IngestOutcome {
                stored: StoredTier::Fast,
                pressure_ratio,
                error: None,
            }),
            Err(e) => {
                tracing::warn!("fast-tier write for key {:?} failed: {e}", request.key);
                self.spill_to_cold(&request).await;
                Ok(IngestOutcome {
                    stored: StoredTier::Cold,
                    pressure_ratio,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// Send the submitted record to the cold tier's bulk-overflow path.
    /// Fire-and-forget: a failure here is logged and nothing else.
    async fn spill_to_cold(&self, request: &IngestRequest) {
        let record = json!({
            "key": request.key,
            "value": request.value,
            "ttl_sec": request.ttl_seconds,
            "cache_hint": request.cache_hint,
        });
        if let Err(e) = self.cold.bulk_append(&[record]).await {
            tracing::warn!("cold-tier overflow for key {:?} failed: {e}", request.key);
        }
    }
}
