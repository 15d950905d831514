//! Tier-client boundaries
//!
//! The fast tier and the cold tier are external collaborators. This module
//! defines the narrow client interfaces the rest of the system consumes,
//! plus the bundled implementations: an embedded partitioned in-memory
//! store standing in for the fast-tier cluster, and a filesystem-rooted
//! cold store.

pub mod cold;
pub mod fast;

pub use cold::{ColdStore, FsColdStore};
pub use fast::{FastTier, MemoryFastTier, PartitionMemory, ScanPage};

use std::future::Future;
use std::time::Duration;

use crate::error::{Result, StrataError};

/// Run a fast-tier operation under a deadline, mapping expiry to a
/// transient tier failure so callers fall back instead of blocking.
pub async fn timed<T, F>(what: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StrataError::FastTier(format!(
            "{what} timed out after {}ms",
            limit.as_millis()
        ))),
    }
}
