//! Fast-tier memory-pressure sampling
//!
//! Aggregates per-partition memory usage into a single utilization ratio.
//! Sampling is partial-failure-safe: a partition that cannot report
//! contributes nothing. When no partition reports a usable capacity the
//! sample is `None` rather than a ratio of zero, so "no pressure" and "no
//! data" stay distinguishable at the API boundary.

use std::sync::Arc;
use std::time::Duration;

use crate::tier::{self, FastTier};

/// Aggregate memory usage across all reporting fast-tier partitions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureSample {
    pub used_bytes: u64,
    pub max_bytes: u64,
    /// used / max, in [0, 1] for any sane partition accounting
    pub ratio: f64,
}

/// Computes the aggregate fast-tier utilization ratio.
///
/// Every call re-queries live partition state; freshness is preferred over
/// per-call latency, so there is no memoization.
pub struct PressureMonitor {
    fast: Arc<dyn FastTier>,
    op_timeout: Duration,
}

impl PressureMonitor {
    pub fn new(fast: Arc<dyn FastTier>, op_timeout: Duration) -> Self {
        Self { fast, op_timeout }
    }

    /// Sample current pressure. `None` means unavailable: no partition
    /// reported a usable capacity.
    pub async fn sample(&self) -> Option<PressureSample> {
        let mut used_total: u64 = 0;
        let mut max_total: u64 = 0;

        for partition in 0..self.fast.partition_count() {
            let info = tier::timed(
                "memory_info",
                self.op_timeout,
                self.fast.memory_info(partition),
            )
            .await;

            match info {
                Ok(info) => {
                    used_total += info.used_bytes;
                    max_total += info.max_bytes;
                }
                Err(e) => {
                    tracing::warn!("pressure sample skipping partition {partition}: {e}");
                }
            }
        }

        if max_total == 0 {
            return None;
        }

        Some(PressureSample {
            used_bytes: used_total,
            max_bytes: max_total,
            ratio: used_total as f64 / max_total as f64,
        })
    }
}
