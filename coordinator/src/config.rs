//! Coordinator configuration with TOML file support.

use ballot_replication::QuorumPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::CoordinatorError;

/// Configuration for the vote coordinator and its cluster.
///
/// Can be loaded from a TOML file via [`CoordinatorConfig::from_toml_file`]
/// or built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Maximum number of concurrently processed votes.
    #[serde(default = "default_max_concurrent_votes")]
    pub max_concurrent_votes: usize,

    /// How long a vote may wait for an admission slot before it is rejected
    /// as busy.
    #[serde(default = "default_admission_wait_ms")]
    pub admission_wait_ms: u64,

    /// Number of replica nodes in the cluster.
    #[serde(default = "default_replica_count")]
    pub replica_count: usize,

    /// Per-call timeout for replica requests.
    #[serde(default = "default_replica_call_timeout_ms")]
    pub replica_call_timeout_ms: u64,

    /// Whether the coordinator's own apply counts toward quorum.
    #[serde(default = "default_true")]
    pub quorum_counts_coordinator: bool,

    /// Period of the clock synchronization loop.
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,

    /// Period of the replica health-check loop.
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,

    /// Readings further than this from the cluster median are excluded from
    /// the clock-sync average.
    #[serde(default = "default_sync_deviation_threshold_ms")]
    pub sync_deviation_threshold_ms: u64,

    /// Capacity of the in-memory event feed exposed to callers.
    #[serde(default = "default_event_feed_capacity")]
    pub event_feed_capacity: usize,

    /// Port for the HTTP surface.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional TOML file with the voter roster and candidate list.
    /// When absent, the built-in demo roster is used.
    #[serde(default)]
    pub roster_file: Option<PathBuf>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_max_concurrent_votes() -> usize {
    5
}

fn default_admission_wait_ms() -> u64 {
    2_000
}

fn default_replica_count() -> usize {
    2
}

fn default_replica_call_timeout_ms() -> u64 {
    1_000
}

fn default_true() -> bool {
    true
}

fn default_sync_interval_ms() -> u64 {
    5_000
}

fn default_health_check_interval_ms() -> u64 {
    5_000
}

fn default_sync_deviation_threshold_ms() -> u64 {
    10_000
}

fn default_event_feed_capacity() -> usize {
    100
}

fn default_rpc_port() -> u16 {
    7200
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl CoordinatorConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, CoordinatorError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CoordinatorError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, CoordinatorError> {
        toml::from_str(s).map_err(|e| CoordinatorError::Config(e.to_string()))
    }

    pub fn admission_wait(&self) -> Duration {
        Duration::from_millis(self.admission_wait_ms)
    }

    pub fn replica_call_timeout(&self) -> Duration {
        Duration::from_millis(self.replica_call_timeout_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn quorum_policy(&self) -> QuorumPolicy {
        QuorumPolicy {
            count_coordinator: self.quorum_counts_coordinator,
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_votes: default_max_concurrent_votes(),
            admission_wait_ms: default_admission_wait_ms(),
            replica_count: default_replica_count(),
            replica_call_timeout_ms: default_replica_call_timeout_ms(),
            quorum_counts_coordinator: default_true(),
            sync_interval_ms: default_sync_interval_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
            sync_deviation_threshold_ms: default_sync_deviation_threshold_ms(),
            event_feed_capacity: default_event_feed_capacity(),
            rpc_port: default_rpc_port(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            roster_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = CoordinatorConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.max_concurrent_votes, 5);
        assert_eq!(config.replica_count, 2);
        assert!(config.quorum_counts_coordinator);
        assert_eq!(config.sync_interval_ms, 5_000);
        assert_eq!(config.health_check_interval_ms, 5_000);
        assert_eq!(config.rpc_port, 7200);
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            max_concurrent_votes = 1
            replica_count = 3
            quorum_counts_coordinator = false
        "#;
        let config = CoordinatorConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.max_concurrent_votes, 1);
        assert_eq!(config.replica_count, 3);
        assert!(!config.quorum_counts_coordinator);
        assert_eq!(config.admission_wait_ms, 2_000); // default
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "sync_interval_ms = 1000").expect("write");
        let path = file.path().to_str().expect("utf-8 path");

        let config = CoordinatorConfig::from_toml_file(path).expect("should load");
        assert_eq!(config.sync_interval_ms, 1_000);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = CoordinatorConfig::from_toml_file("/nonexistent/ballot.toml").unwrap_err();
        assert!(matches!(err, CoordinatorError::Config(_)));
    }

    #[test]
    fn quorum_policy_reflects_config() {
        let config = CoordinatorConfig {
            quorum_counts_coordinator: false,
            ..Default::default()
        };
        assert!(!config.quorum_policy().count_coordinator);
    }
}
