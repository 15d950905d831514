//! Test utilities for strata - shared fixtures and fault-injecting mocks
//!
//! These doubles let the placement, retrieval, and sweep logic be exercised
//! against misbehaving tiers without a real cluster.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, StrataError};
use crate::tier::{ColdStore, FastTier, MemoryFastTier, PartitionMemory, ScanPage};

/// Fast tier wrapper with injectable failures: per-partition enumeration
/// and sampling failures, failing key reads, or a dead ping.
pub struct FlakyFastTier {
    inner: MemoryFastTier,
    failing_partitions: HashSet<usize>,
    fail_reads: bool,
    fail_ping: bool,
}

impl FlakyFastTier {
    /// Fail `memory_info` and `scan` on the listed partitions
    pub fn new(inner: MemoryFastTier, failing: impl IntoIterator<Item = usize>) -> Self {
        Self {
            inner,
            failing_partitions: failing.into_iter().collect(),
            fail_reads: false,
            fail_ping: false,
        }
    }

    /// Fail every `get`
    pub fn failing_reads(inner: MemoryFastTier) -> Self {
        Self {
            inner,
            failing_partitions: HashSet::new(),
            fail_reads: true,
            fail_ping: false,
        }
    }

    /// Fail `ping`, for startup fail-fast tests
    pub fn failing_ping(inner: MemoryFastTier) -> Self {
        Self {
            inner,
            failing_partitions: HashSet::new(),
            fail_reads: false,
            fail_ping: true,
        }
    }

    pub fn inner(&self) -> &MemoryFastTier {
        &self.inner
    }

    fn check_partition(&self, partition: usize) -> Result<()> {
        if self.failing_partitions.contains(&partition) {
            return Err(StrataError::FastTier(format!(
                "partition {partition} unreachable"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FastTier for FlakyFastTier {
    async fn ping(&self) -> Result<()> {
        if self.fail_ping {
            return Err(StrataError::FastTier("connection refused".to_string()));
        }
        self.inner.ping().await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.fail_reads {
            return Err(StrataError::FastTier("read failed".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    fn partition_count(&self) -> usize {
        self.inner.partition_count()
    }

    async fn memory_info(&self, partition: usize) -> Result<PartitionMemory> {
        self.check_partition(partition)?;
        self.inner.memory_info(partition).await
    }

    async fn scan(
        &self,
        partition: usize,
        cursor: Option<String>,
        pattern: &str,
        page_size: usize,
    ) -> Result<ScanPage> {
        self.check_partition(partition)?;
        self.inner.scan(partition, cursor, pattern, page_size).await
    }
}

/// Cold store whose writes always fail, for fallback and
/// write-failure-counter tests. Reads behave as an empty store.
#[derive(Debug, Default)]
pub struct FailingColdStore;

impl FailingColdStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ColdStore for FailingColdStore {
    async fn ensure_root(&self) -> Result<()> {
        Ok(())
    }

    async fn bulk_append(&self, _records: &[serde_json::Value]) -> Result<std::path::PathBuf> {
        Err(StrataError::ColdTier("cold tier offline".to_string()))
    }

    async fn put_key(&self, _key: &str, _value: &[u8]) -> Result<()> {
        Err(StrataError::ColdTier("cold tier offline".to_string()))
    }

    async fn get_key(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flaky_tier_fails_only_listed_partitions() {
        let tier = FlakyFastTier::new(MemoryFastTier::new(2, 1024), [1]);

        assert!(tier.memory_info(0).await.is_ok());
        assert!(tier.memory_info(1).await.is_err());
        assert!(tier.scan(1, None, "*", 10).await.is_err());
    }

    #[tokio::test]
    async fn test_flaky_tier_key_ops_pass_through() {
        let tier = FlakyFastTier::new(MemoryFastTier::new(2, 1024), [0, 1]);
        tier.set_with_ttl("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(tier.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_failing_reads_variant() {
        let tier = FlakyFastTier::failing_reads(MemoryFastTier::new(1, 1024));
        tier.set_with_ttl("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(tier.get("k").await.is_err());
        assert!(tier.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_ping_variant() {
        let tier = FlakyFastTier::failing_ping(MemoryFastTier::new(1, 1024));
        assert!(tier.ping().await.is_err());
        assert!(tier.get("missing").await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_cold_store() {
        let store = FailingColdStore::new();
        assert!(store.put_key("k", b"v").await.is_err());
        assert!(store.bulk_append(&[]).await.is_err());
        assert_eq!(store.get_key("k").await.unwrap(), None);
    }
}
