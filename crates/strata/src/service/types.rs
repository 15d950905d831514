//! Request and outcome types for the ingestion and retrieval paths

use serde::{Deserialize, Serialize};

/// Payload field carrying the ingestion timestamp (unix seconds). The
/// timestamp lives inside the stored value itself, not in external
/// metadata, so the sweeper can age records from the data alone.
pub const INGESTION_TS_FIELD: &str = "_ts";

/// A single record submitted for ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub key: String,
    /// Record payload; required, rejected when absent
    pub value: Option<serde_json::Map<String, serde_json::Value>>,
    /// Time-to-live in the fast tier; absent or non-positive falls back to
    /// the default
    #[serde(default, rename = "ttl_sec")]
    pub ttl_seconds: Option<i64>,
    #[serde(default)]
    pub cache_hint: Option<CacheHint>,
}

/// Producer hint about expected access patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheHint {
    /// No expectation
    None,
    /// Key is expected to be read disproportionately often
    HotRead,
}

/// Which tier ended up holding an ingested record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredTier {
    Fast,
    Cold,
}

/// Terminal outcome of a valid ingestion request
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub stored: StoredTier,
    /// Aggregate fast-tier utilization observed for this request; `None`
    /// when no partition reported usable capacity
    pub pressure_ratio: Option<f64>,
    /// Detail of the failure that forced a cold-tier fallback, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Which lookup stage satisfied a retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalSource {
    Local,
    Fast,
    Cold,
}

/// A successfully retrieved record
#[derive(Debug, Clone, Serialize)]
pub struct Retrieved {
    pub source: RetrievalSource,
    pub value: serde_json::Value,
}
