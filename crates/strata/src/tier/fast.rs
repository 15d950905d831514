//! Fast-tier client interface and embedded implementation
//!
//! The fast tier is a low-latency, partitioned, capacity-bounded key-value
//! store with TTL expiry. `FastTier` is the narrow contract the services and
//! the sweeper consume; `MemoryFastTier` is the bundled in-process stand-in
//! for an external cluster, with one partition per configured node.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::FastTierConfig;
use crate::error::{Result, StrataError};

/// Memory usage reported by a single partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionMemory {
    pub used_bytes: u64,
    pub max_bytes: u64,
}

/// One page of a cursor scan.
///
/// `next` is an opaque resume token; `None` means the scan is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    pub keys: Vec<String>,
    pub next: Option<String>,
}

/// Client contract for the fast tier.
///
/// Implementations must be safe for concurrent use without caller-side
/// locking. The scan is non-destructive and resumable: repeated calls with
/// the returned cursor cover every key present when the scan began, while
/// keys written mid-scan may or may not be observed.
#[async_trait]
pub trait FastTier: Send + Sync {
    /// Liveness probe
    async fn ping(&self) -> Result<()>;

    /// Fetch the raw value for a key, if resident and unexpired
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value with a time-to-live, overwriting any existing entry
    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Number of partitions backing this tier
    fn partition_count(&self) -> usize;

    /// Memory usage of one partition
    async fn memory_info(&self, partition: usize) -> Result<PartitionMemory>;

    /// One page of a resumable key scan over one partition
    async fn scan(
        &self,
        partition: usize,
        cursor: Option<String>,
        pattern: &str,
        page_size: usize,
    ) -> Result<ScanPage>;
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

struct Partition {
    map: DashMap<String, Entry>,
    used_bytes: AtomicU64,
    max_bytes: u64,
}

impl Partition {
    fn new(max_bytes: u64) -> Self {
        Self {
            map: DashMap::new(),
            used_bytes: AtomicU64::new(0),
            max_bytes,
        }
    }

    /// Drop an expired entry and release its accounted bytes
    fn purge(&self, key: &str) {
        if let Some((k, entry)) = self.map.remove(key) {
            self.used_bytes
                .fetch_sub(entry_size(&k, &entry.value), Ordering::Relaxed);
        }
    }
}

fn entry_size(key: &str, value: &[u8]) -> u64 {
    (key.len() + value.len()) as u64
}

/// Embedded partitioned fast tier.
///
/// Keys hash to a fixed partition. Each partition enforces a byte capacity:
/// a write that would exceed it is rejected, which is the over-capacity
/// failure the write path falls back on. Expiry is lazy, applied on reads
/// and scans.
pub struct MemoryFastTier {
    partitions: Vec<Partition>,
}

impl MemoryFastTier {
    pub fn new(partitions: usize, partition_max_bytes: u64) -> Self {
        let count = partitions.max(1);
        Self {
            partitions: (0..count).map(|_| Partition::new(partition_max_bytes)).collect(),
        }
    }

    pub fn from_config(config: &FastTierConfig) -> Self {
        Self::new(config.partition_count(), config.partition_max_bytes)
    }

    fn partition_for(&self, key: &str) -> &Partition {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.partitions.len();
        &self.partitions[index]
    }

    fn partition(&self, index: usize) -> Result<&Partition> {
        self.partitions
            .get(index)
            .ok_or_else(|| StrataError::FastTier(format!("no such partition: {index}")))
    }
}

#[async_trait]
impl FastTier for MemoryFastTier {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let partition = self.partition_for(key);
        let now = Instant::now();

        let expired = match partition.map.get(key) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => return Ok(Some(entry.value.clone())),
            None => return Ok(None),
        };
        if expired {
            partition.purge(key);
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let partition = self.partition_for(key);
        let new_size = entry_size(key, &value);
        let old_size = partition
            .map
            .get(key)
            .map(|entry| entry_size(key, &entry.value))
            .unwrap_or(0);

        let used = partition.used_bytes.load(Ordering::Relaxed);
        if used + new_size - old_size > partition.max_bytes {
            return Err(StrataError::FastTier(format!(
                "partition over capacity ({used}/{} bytes used)",
                partition.max_bytes
            )));
        }

        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let previous = partition.map.insert(key.to_string(), entry);
        let released = previous
            .map(|old| entry_size(key, &old.value))
            .unwrap_or(0);
        partition.used_bytes.fetch_add(new_size, Ordering::Relaxed);
        partition.used_bytes.fetch_sub(released, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let partition = self.partition_for(key);
        if let Some((k, entry)) = partition.map.remove(key) {
            partition
                .used_bytes
                .fetch_sub(entry_size(&k, &entry.value), Ordering::Relaxed);
        }
        Ok(())
    }

    fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    async fn memory_info(&self, partition: usize) -> Result<PartitionMemory> {
        let partition = self.partition(partition)?;
        Ok(PartitionMemory {
            used_bytes: partition.used_bytes.load(Ordering::Relaxed),
            max_bytes: partition.max_bytes,
        })
    }

    async fn scan(
        &self,
        partition: usize,
        cursor: Option<String>,
        pattern: &str,
        page_size: usize,
    ) -> Result<ScanPage> {
        let partition = self.partition(partition)?;
        let now = Instant::now();
        let page_size = page_size.max(1);

        // Resume-after-key iteration over the sorted live key set. Keys are
        // stable names, so deletions behind the cursor cannot shift coverage
        // the way a positional index would.
        let mut keys: Vec<String> = partition
            .map
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .filter(|entry| matches_pattern(entry.key(), pattern))
            .filter(|entry| cursor.as_deref().is_none_or(|after| entry.key().as_str() > after))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys.truncate(page_size);

        let next = if keys.len() == page_size {
            keys.last().cloned()
        } else {
            None
        };

        Ok(ScanPage { keys, next })
    }
}

/// Minimal glob support: `*` matches everything, a single trailing or
/// leading `*` matches by prefix/suffix, anything else is an exact match.
fn matches_pattern(key: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return key.starts_with(prefix);
    }
    if let Some(suffix) = pattern.strip_prefix('*') {
        return key.ends_with(suffix);
    }
    key == pattern
}
