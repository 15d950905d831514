//! Background offload sweeper
//!
//! Ages records out of the fast tier. Each run samples memory pressure,
//! enumerates the full fast-tier keyspace partition by partition, and moves
//! eligible records to the cold tier's per-key store with write-then-delete
//! ordering: the fast-tier copy is only removed after the cold write
//! succeeded. The two calls are not atomic across tiers; a crash in between
//! leaves a transient duplicate, which retrieval resolves by preferring the
//! fast tier until the key is swept again or expires.
//!
//! The sweeper is a lifecycle-managed periodic task: `run_once` is public
//! and deterministic for tests, `start` spawns the interval loop and hands
//! back a handle with `stop` and a channel publishing each run's report.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{Config, SweeperConfig};
use crate::error::{Result, StrataError};
use crate::pressure::PressureMonitor;
use crate::service::types::INGESTION_TS_FIELD;
use crate::tier::{self, ColdStore, FastTier};

/// Counters emitted by one sweep run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Keys enumerated across all partitions
    pub scanned: u64,
    /// Keys past the normal age cutoff
    pub aged: u64,
    /// Keys moved: cold write succeeded and the fast-tier copy was deleted
    pub moved: u64,
    /// Cold-tier writes that failed; the key stays resident for the next run
    pub write_failures: u64,
    /// Values with no parseable embedded timestamp
    pub parse_failures: u64,
    /// Pressure observed at the start of the run, `None` when unavailable
    pub pressure_ratio: Option<f64>,
    pub force_mode_active: bool,
}

/// Background task moving aged and pressured records from fast to cold tier
pub struct OffloadSweeper {
    fast: Arc<dyn FastTier>,
    cold: Arc<dyn ColdStore>,
    monitor: PressureMonitor,
    offload_after_secs: i64,
    force_min_age_secs: i64,
    force_ratio: f64,
    interval: Duration,
    scan_page_size: usize,
    op_timeout: Duration,
}

impl OffloadSweeper {
    pub fn new(
        fast: Arc<dyn FastTier>,
        cold: Arc<dyn ColdStore>,
        monitor: PressureMonitor,
        sweeper: &SweeperConfig,
        force_ratio: f64,
        scan_page_size: usize,
        op_timeout: Duration,
    ) -> Self {
        Self {
            fast,
            cold,
            monitor,
            offload_after_secs: sweeper.offload_after_secs,
            force_min_age_secs: sweeper.force_min_age_secs,
            force_ratio,
            interval: Duration::from_secs(sweeper.interval_secs),
            scan_page_size,
            op_timeout,
        }
    }

    /// Wire a sweeper from the full daemon configuration
    pub fn from_config(fast: Arc<dyn FastTier>, cold: Arc<dyn ColdStore>, config: &Config) -> Self {
        let op_timeout = Duration::from_secs(config.fast_tier.op_timeout_secs);
        let monitor = PressureMonitor::new(fast.clone(), op_timeout);
        Self::new(
            fast,
            cold,
            monitor,
            &config.sweeper,
            config.pressure.force_ratio,
            config.fast_tier.scan_page_size,
            op_timeout,
        )
    }

    /// Execute one full sweep over the fast-tier keyspace.
    ///
    /// Enumeration covers every key present at the start of the run; keys
    /// written mid-run may or may not be observed, which is fine because a
    /// freshly written key is too young to be age-eligible. An enumeration
    /// failure aborts only the affected partition; work already done on
    /// other partitions keeps its effects.
    pub async fn run_once(&self) -> SweepReport {
        let pressure_ratio = self.monitor.sample().await.map(|sample| sample.ratio);
        let force_mode = pressure_ratio.is_some_and(|ratio| ratio >= self.force_ratio);

        let now = chrono::Utc::now().timestamp();
        let age_cutoff = now - self.offload_after_secs;
        let force_cutoff = now - self.force_min_age_secs;

        let mut report = SweepReport {
            pressure_ratio,
            force_mode_active: force_mode,
            ..Default::default()
        };

        for partition in 0..self.fast.partition_count() {
            if let Err(e) = self
                .sweep_partition(partition, age_cutoff, force_cutoff, force_mode, &mut report)
                .await
            {
                tracing::warn!("sweep enumeration failed on partition {partition}: {e}");
            }
        }

        tracing::info!(
            "sweep run: scanned={} aged={} moved={} write_failures={} parse_failures={} pressure_ratio={:?} force_mode={}",
            report.scanned,
            report.aged,
            report.moved,
            report.write_failures,
            report.parse_failures,
            report.pressure_ratio,
            report.force_mode_active,
        );
        report
    }

    async fn sweep_partition(
        &self,
        partition: usize,
        age_cutoff: i64,
        force_cutoff: i64,
        force_mode: bool,
        report: &mut SweepReport,
    ) -> Result<()> {
        let mut cursor = None;
        loop {
            let page = tier::timed(
                "scan",
                self.op_timeout,
                self.fast
                    .scan(partition, cursor.clone(), "*", self.scan_page_size),
            )
            .await?;

            for key in &page.keys {
                report.scanned += 1;

                let bytes = match tier::timed("get", self.op_timeout, self.fast.get(key)).await {
                    Ok(Some(bytes)) => bytes,
                    // Gone since the scan page was taken (expired or deleted)
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::debug!("sweep read for key {key:?} failed, skipping: {e}");
                        continue;
                    }
                };

                let timestamp = extract_timestamp(&bytes);
                if timestamp.is_none() {
                    report.parse_failures += 1;
                }

                let eligible = match timestamp {
                    Some(ts) if ts < age_cutoff => {
                        report.aged += 1;
                        true
                    }
                    Some(ts) => force_mode && ts < force_cutoff,
                    // Age-unknown: under pressure, moving eagerly beats
                    // keeping data whose staleness cannot be judged
                    None => force_mode,
                };
                if !eligible {
                    continue;
                }

                if let Err(e) = self.cold.put_key(key, &bytes).await {
                    report.write_failures += 1;
                    tracing::warn!("offload write failed for key {key:?}: {e}");
                    continue;
                }
                // Cold write success gates the delete
                match tier::timed("delete", self.op_timeout, self.fast.delete(key)).await {
                    Ok(()) => report.moved += 1,
                    Err(e) => {
                        tracing::warn!("fast-tier delete after offload failed for key {key:?}: {e}")
                    }
                }
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(())
    }

    /// Start the periodic loop.
    ///
    /// Fails fast when the fast tier does not answer a ping, so a
    /// misconfigured deployment dies at startup instead of sweeping
    /// nothing forever. One run completes before the next begins.
    pub async fn start(self) -> Result<SweeperHandle> {
        tier::timed("ping", self.op_timeout, self.fast.ping())
            .await
            .map_err(|e| StrataError::Startup(format!("fast tier unreachable: {e}")))?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (report_tx, report_rx) = watch::channel(None);

        let interval = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = self.run_once().await;
                        let _ = report_tx.send(Some(report));
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("offload sweeper stopped");
        });

        Ok(SweeperHandle {
            shutdown: shutdown_tx,
            reports: report_rx,
            task,
        })
    }
}

/// Running sweeper lifecycle handle
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    reports: watch::Receiver<Option<SweepReport>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Channel carrying the latest completed run's report
    pub fn reports(&self) -> watch::Receiver<Option<SweepReport>> {
        self.reports.clone()
    }

    /// Signal shutdown and wait for the in-flight run to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Pull the embedded ingestion timestamp out of a stored payload.
/// Integers, floats, and numeric strings are all accepted.
fn extract_timestamp(bytes: &[u8]) -> Option<i64> {
    let payload: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    match payload.get(INGESTION_TS_FIELD)? {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
