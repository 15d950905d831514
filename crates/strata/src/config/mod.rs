use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Strata
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Fast tier (partitioned in-memory store) configuration
    #[serde(default)]
    pub fast_tier: FastTierConfig,
    /// Memory-pressure thresholds
    #[serde(default)]
    pub pressure: PressureConfig,
    /// Background offload sweeper configuration
    #[serde(default)]
    pub sweeper: SweeperConfig,
    /// Local in-process LRU cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Cold tier (on-disk overflow/archive store) configuration
    #[serde(default)]
    pub cold_tier: ColdTierConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// Fast tier configuration
///
/// The embedded fast tier derives one partition per bootstrap node, so a
/// three-node list behaves like a three-shard cluster. `partitions` overrides
/// the derived count when set.
#[derive(Debug, Clone, Deserialize)]
pub struct FastTierConfig {
    /// Cluster node addresses, one partition per node
    #[serde(default = "default_bootstrap_nodes")]
    pub bootstrap_nodes: Vec<String>,
    /// Explicit partition count override (0 = derive from bootstrap_nodes)
    #[serde(default)]
    pub partitions: usize,
    /// Per-partition capacity in bytes
    #[serde(default = "default_partition_max_bytes")]
    pub partition_max_bytes: u64,
    /// Timeout for individual tier operations in seconds
    #[serde(default = "default_op_timeout_secs")]
    pub op_timeout_secs: u64,
    /// Page size for cursor scans
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: usize,
}

impl FastTierConfig {
    /// Effective partition count: explicit override, else one per node
    pub fn partition_count(&self) -> usize {
        if self.partitions > 0 {
            self.partitions
        } else {
            self.bootstrap_nodes.len().max(1)
        }
    }
}

impl Default for FastTierConfig {
    fn default() -> Self {
        Self {
            bootstrap_nodes: default_bootstrap_nodes(),
            partitions: 0,
            partition_max_bytes: default_partition_max_bytes(),
            op_timeout_secs: default_op_timeout_secs(),
            scan_page_size: default_scan_page_size(),
        }
    }
}

fn default_bootstrap_nodes() -> Vec<String> {
    vec!["127.0.0.1:7001".to_string()]
}

fn default_partition_max_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_op_timeout_secs() -> u64 {
    2
}

fn default_scan_page_size() -> usize {
    100
}

/// Memory-pressure thresholds, as fractions of aggregate fast-tier capacity
#[derive(Debug, Clone, Deserialize)]
pub struct PressureConfig {
    /// At or above this ratio, new ingestions route straight to the cold tier
    #[serde(default = "default_soft_ratio")]
    pub soft_ratio: f64,
    /// At or above this ratio, the sweeper moves data aggressively
    #[serde(default = "default_force_ratio")]
    pub force_ratio: f64,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            soft_ratio: default_soft_ratio(),
            force_ratio: default_force_ratio(),
        }
    }
}

fn default_soft_ratio() -> f64 {
    0.80
}

fn default_force_ratio() -> f64 {
    0.70
}

/// Background sweeper configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    /// Age in seconds after which a record is moved to the cold tier
    #[serde(default = "default_offload_after_secs")]
    pub offload_after_secs: i64,
    /// Minimum record age in seconds for force-mode moves
    #[serde(default = "default_force_min_age_secs")]
    pub force_min_age_secs: i64,
    /// Seconds between sweep runs
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            offload_after_secs: default_offload_after_secs(),
            force_min_age_secs: default_force_min_age_secs(),
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_offload_after_secs() -> i64 {
    600
}

fn default_force_min_age_secs() -> i64 {
    5
}

fn default_interval_secs() -> u64 {
    60
}

/// Local LRU cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Enable the in-process cache
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Maximum number of entries across both cache namespaces
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    1024
}

/// Cold tier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ColdTierConfig {
    /// Root directory for overflow and offloaded objects
    #[serde(default = "default_cold_root")]
    pub root: PathBuf,
}

impl Default for ColdTierConfig {
    fn default() -> Self {
        Self {
            root: default_cold_root(),
        }
    }
}

fn default_cold_root() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".strata").join("cold"))
        .unwrap_or_else(|| PathBuf::from(".strata/cold"))
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8080")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}
