//! Integration tests for the offload sweeper
//!
//! Deterministic single runs via `run_once`, classification against age and
//! force cutoffs, write-then-delete ordering under cold-tier failure, and
//! the start/stop lifecycle.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use strata_server::config::SweeperConfig;
use strata_server::pressure::PressureMonitor;
use strata_server::sweeper::OffloadSweeper;
use strata_server::testing::{FailingColdStore, FlakyFastTier};
use strata_server::tier::{ColdStore, FastTier, FsColdStore, MemoryFastTier};

const OP_TIMEOUT: Duration = Duration::from_secs(1);
const PAGE_SIZE: usize = 10;

fn sweeper_config() -> SweeperConfig {
    SweeperConfig {
        offload_after_secs: 600,
        force_min_age_secs: 5,
        interval_secs: 1,
    }
}

fn sweeper(
    fast: Arc<dyn FastTier>,
    cold: Arc<dyn ColdStore>,
    config: &SweeperConfig,
    force_ratio: f64,
) -> OffloadSweeper {
    let monitor = PressureMonitor::new(fast.clone(), OP_TIMEOUT);
    OffloadSweeper::new(fast, cold, monitor, config, force_ratio, PAGE_SIZE, OP_TIMEOUT)
}

/// Write a record whose embedded timestamp is `age_secs` in the past
async fn seed(fast: &Arc<dyn FastTier>, key: &str, age_secs: i64) {
    let payload = json!({"_ts": chrono::Utc::now().timestamp() - age_secs, "key": key});
    fast.set_with_ttl(key, serde_json::to_vec(&payload).unwrap(), Duration::from_secs(3600))
        .await
        .unwrap();
}

/// Write a record with no embedded timestamp at all
async fn seed_age_unknown(fast: &Arc<dyn FastTier>, key: &str) {
    let payload = json!({"key": key});
    fast.set_with_ttl(key, serde_json::to_vec(&payload).unwrap(), Duration::from_secs(3600))
        .await
        .unwrap();
}

fn fast_tier() -> Arc<dyn FastTier> {
    Arc::new(MemoryFastTier::new(1, 1024 * 1024))
}

fn cold_store() -> (Arc<dyn ColdStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    (Arc::new(FsColdStore::new(dir.path())), dir)
}

mod aging_tests {
    use super::*;

    #[tokio::test]
    async fn test_twenty_backdated_records_all_move() {
        let fast = fast_tier();
        let (cold, _dir) = cold_store();
        for i in 0..20 {
            seed(&fast, &format!("seed:old:{i}"), 7200).await;
        }

        let report = sweeper(fast.clone(), cold.clone(), &sweeper_config(), 0.70)
            .run_once()
            .await;

        assert_eq!(report.scanned, 20);
        assert_eq!(report.aged, 20);
        assert_eq!(report.moved, 20);
        assert_eq!(report.write_failures, 0);
        assert_eq!(report.parse_failures, 0);
        assert!(!report.force_mode_active);

        // Fast tier is empty and every record is per-key readable cold
        let page = fast.scan(0, None, "*", 100).await.unwrap();
        assert!(page.keys.is_empty());
        for i in 0..20 {
            let bytes = cold
                .get_key(&format!("seed:old:{i}"))
                .await
                .unwrap()
                .expect("moved record readable from cold tier");
            let payload: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(payload["key"], format!("seed:old:{i}"));
        }
    }

    #[tokio::test]
    async fn test_only_aged_records_move() {
        let fast = fast_tier();
        let (cold, _dir) = cold_store();
        for i in 0..3 {
            seed(&fast, &format!("old:{i}"), 7200).await;
        }
        for i in 0..2 {
            seed(&fast, &format!("fresh:{i}"), 30).await;
        }

        let report = sweeper(fast.clone(), cold, &sweeper_config(), 0.70)
            .run_once()
            .await;

        assert_eq!(report.scanned, 5);
        assert_eq!(report.aged, 3);
        assert_eq!(report.moved, 3);

        let page = fast.scan(0, None, "*", 100).await.unwrap();
        let mut rest = page.keys;
        rest.sort();
        assert_eq!(rest, vec!["fresh:0".to_string(), "fresh:1".to_string()]);
    }

    #[tokio::test]
    async fn test_age_unknown_stays_without_pressure() {
        let fast = fast_tier();
        let (cold, _dir) = cold_store();
        seed_age_unknown(&fast, "mystery").await;

        let report = sweeper(fast.clone(), cold, &sweeper_config(), 0.70)
            .run_once()
            .await;

        assert_eq!(report.parse_failures, 1);
        assert_eq!(report.moved, 0);
        assert!(fast.get("mystery").await.unwrap().is_some());
    }
}

mod force_mode_tests {
    use super::*;

    /// force_ratio of 0.0 makes any reported ratio trigger force mode
    const ALWAYS_FORCE: f64 = 0.0;

    #[tokio::test]
    async fn test_force_mode_moves_past_shorter_horizon() {
        let fast = fast_tier();
        let (cold, _dir) = cold_store();
        // Older than force_min_age (5s) but far younger than the 600s cutoff
        seed(&fast, "young-ish", 30).await;
        // Younger than even the force horizon: stays either way
        seed(&fast, "brand-new", 0).await;

        let report = sweeper(fast.clone(), cold, &sweeper_config(), ALWAYS_FORCE)
            .run_once()
            .await;

        assert!(report.force_mode_active);
        assert_eq!(report.aged, 0, "nothing is past the normal cutoff");
        assert_eq!(report.moved, 1);
        assert!(fast.get("young-ish").await.unwrap().is_none());
        assert!(fast.get("brand-new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_force_mode_evicts_age_unknown() {
        let fast = fast_tier();
        let (cold, _dir) = cold_store();
        seed_age_unknown(&fast, "mystery").await;

        let report = sweeper(fast.clone(), cold.clone(), &sweeper_config(), ALWAYS_FORCE)
            .run_once()
            .await;

        assert_eq!(report.parse_failures, 1);
        assert_eq!(report.moved, 1);
        assert!(fast.get("mystery").await.unwrap().is_none());
        assert!(cold.get_key("mystery").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_force_mode_requires_available_pressure() {
        // Zero configured capacity: the sample is unavailable, so force mode
        // must stay off even with a force_ratio of zero
        let fast: Arc<dyn FastTier> = Arc::new(MemoryFastTier::new(1, 0));
        let (cold, _dir) = cold_store();

        let report = sweeper(fast, cold, &sweeper_config(), ALWAYS_FORCE)
            .run_once()
            .await;

        assert!(report.pressure_ratio.is_none());
        assert!(!report.force_mode_active);
    }
}

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_cold_write_failure_leaves_key_resident() {
        let fast = fast_tier();
        let cold: Arc<dyn ColdStore> = Arc::new(FailingColdStore::new());
        seed(&fast, "stuck", 7200).await;

        let report = sweeper(fast.clone(), cold, &sweeper_config(), 0.70)
            .run_once()
            .await;

        assert_eq!(report.aged, 1);
        assert_eq!(report.write_failures, 1);
        assert_eq!(report.moved, 0);
        assert!(
            fast.get("stuck").await.unwrap().is_some(),
            "delete must not run after a failed cold write"
        );
    }

    #[tokio::test]
    async fn test_retry_on_next_run_after_cold_recovers() {
        let fast = fast_tier();
        seed(&fast, "stuck", 7200).await;

        let failing: Arc<dyn ColdStore> = Arc::new(FailingColdStore::new());
        let report = sweeper(fast.clone(), failing, &sweeper_config(), 0.70)
            .run_once()
            .await;
        assert_eq!(report.write_failures, 1);

        let (healthy, _dir) = cold_store();
        let report = sweeper(fast.clone(), healthy.clone(), &sweeper_config(), 0.70)
            .run_once()
            .await;
        assert_eq!(report.moved, 1);
        assert!(healthy.get_key("stuck").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_partition_failure_spares_other_partitions() {
        let inner = MemoryFastTier::new(4, 1024 * 1024);
        let fast: Arc<dyn FastTier> = Arc::new(FlakyFastTier::new(inner, [2]));
        let (cold, _dir) = cold_store();
        for i in 0..40 {
            seed(&fast, &format!("old:{i}"), 7200).await;
        }

        let report = sweeper(fast.clone(), cold, &sweeper_config(), 0.70)
            .run_once()
            .await;

        assert!(report.moved > 0, "healthy partitions still sweep");
        assert!(
            report.moved < 40,
            "the failing partition's keys stay resident"
        );

        let mut remaining = 0;
        for p in [0usize, 1, 3] {
            let page = fast.scan(p, None, "*", 100).await.unwrap();
            remaining += page.keys.len();
        }
        assert_eq!(remaining, 0, "healthy partitions fully drained");
    }
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_startup_fails_fast_when_fast_tier_unreachable() {
        let fast: Arc<dyn FastTier> =
            Arc::new(FlakyFastTier::failing_ping(MemoryFastTier::new(1, 1024)));
        let (cold, _dir) = cold_store();

        let result = sweeper(fast, cold, &sweeper_config(), 0.70).start().await;
        assert!(matches!(
            result,
            Err(strata_server::StrataError::Startup(_))
        ));
    }

    #[tokio::test]
    async fn test_started_sweeper_publishes_reports_and_stops() {
        let fast = fast_tier();
        let (cold, _dir) = cold_store();
        for i in 0..5 {
            seed(&fast, &format!("old:{i}"), 7200).await;
        }

        let handle = sweeper(fast.clone(), cold.clone(), &sweeper_config(), 0.70)
            .start()
            .await
            .unwrap();

        // The first tick fires immediately; wait for a report to land
        let mut reports = handle.reports();
        while reports.borrow_and_update().is_none() {
            reports.changed().await.unwrap();
        }

        handle.stop().await;

        let page = fast.scan(0, None, "*", 100).await.unwrap();
        assert!(page.keys.is_empty(), "first run drained the fast tier");
        for i in 0..5 {
            assert!(cold.get_key(&format!("old:{i}")).await.unwrap().is_some());
        }
    }
}
