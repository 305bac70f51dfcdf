//! Bully Simulator Configuration
//!
//! This module provides configuration structures for a simulation run:
//! the node id set, the initial leader, and the timers that drive
//! re-election and failure detection.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::state::NodeId;

/// Main simulator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BullyConfig {
    /// Cluster membership configuration
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Timer configuration
    #[serde(default)]
    pub timing: TimingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cluster membership configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Node ids participating in the election
    pub ids: Vec<NodeId>,

    /// Node that starts as leader (defaults to the highest id)
    #[serde(default)]
    pub initial_leader: Option<NodeId>,

    /// Smallest accepted cluster size
    #[serde(default = "default_min_size")]
    pub min_size: usize,

    /// Largest accepted cluster size
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Fixed seed for the random choice of election initiators
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Timer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Delay between a leader failure and the re-election it triggers
    #[serde(default = "default_reelection_delay_ms")]
    pub reelection_delay_ms: u64,

    /// Period of the automatic failure-detection loop
    #[serde(default = "default_detection_interval_ms")]
    pub detection_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (full, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_min_size() -> usize {
    3
}

fn default_max_size() -> usize {
    10
}

fn default_node_count() -> usize {
    5
}

fn default_reelection_delay_ms() -> u64 {
    800
}

fn default_detection_interval_ms() -> u64 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "full".to_string()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::sequential(default_node_count())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            reelection_delay_ms: default_reelection_delay_ms(),
            detection_interval_ms: default_detection_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ClusterConfig {
    /// Cluster of nodes numbered `1..=count`, led by the highest id
    pub fn sequential(count: usize) -> Self {
        Self {
            ids: (1..=count as NodeId).collect(),
            initial_leader: None,
            min_size: default_min_size(),
            max_size: default_max_size(),
            seed: None,
        }
    }

    /// Initial leader, falling back to the highest configured id
    pub fn initial_leader_id(&self) -> Option<NodeId> {
        self.initial_leader.or_else(|| self.ids.iter().copied().max())
    }

    /// Validate the cluster section
    pub fn validate(&self) -> crate::Result<()> {
        if self.min_size == 0 {
            return Err(crate::Error::Config("cluster.min_size must be at least 1".into()));
        }

        if self.min_size > self.max_size {
            return Err(crate::Error::Config(format!(
                "cluster.min_size ({}) is larger than cluster.max_size ({})",
                self.min_size, self.max_size
            )));
        }

        let size = self.ids.len();
        if size < self.min_size || size > self.max_size {
            return Err(crate::Error::ClusterSize {
                size,
                min: self.min_size,
                max: self.max_size,
            });
        }

        let mut seen = HashSet::with_capacity(size);
        for id in &self.ids {
            if !seen.insert(*id) {
                return Err(crate::Error::DuplicateNodeId(*id));
            }
        }

        match self.initial_leader_id() {
            Some(leader) if seen.contains(&leader) => Ok(()),
            Some(leader) => Err(crate::Error::UnknownInitialLeader(leader)),
            None => Err(crate::Error::Config("cluster.ids cannot be empty".into())),
        }
    }
}

impl BullyConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: BullyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("cannot render configuration: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        self.cluster.validate()?;

        if self.timing.detection_interval_ms == 0 {
            return Err(crate::Error::Config(
                "timing.detection_interval_ms must be greater than zero".into(),
            ));
        }

        match self.logging.format.as_str() {
            "full" | "compact" => Ok(()),
            other => Err(crate::Error::Config(format!(
                "logging.format must be \"full\" or \"compact\", got \"{}\"",
                other
            ))),
        }
    }

    /// Get re-election delay as Duration
    pub fn reelection_delay(&self) -> Duration {
        Duration::from_millis(self.timing.reelection_delay_ms)
    }

    /// Get failure-detection interval as Duration
    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.timing.detection_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[cluster]
ids = [10, 20, 30, 40]
initial_leader = 30
seed = 7

[timing]
reelection_delay_ms = 0
detection_interval_ms = 250
"#;

        let config = BullyConfig::from_str(toml).unwrap();
        assert_eq!(config.cluster.ids, vec![10, 20, 30, 40]);
        assert_eq!(config.cluster.initial_leader_id(), Some(30));
        assert_eq!(config.cluster.min_size, 3);
        assert_eq!(config.cluster.max_size, 10);
        assert_eq!(config.cluster.seed, Some(7));
        assert_eq!(config.reelection_delay(), Duration::ZERO);
        assert_eq!(config.detection_interval(), Duration::from_millis(250));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_initial_leader_defaults_to_highest_id() {
        let config = BullyConfig::from_str("[cluster]\nids = [4, 9, 2]\n").unwrap();
        assert_eq!(config.cluster.initial_leader_id(), Some(9));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = BullyConfig::default();
        config.validate().unwrap();
        assert_eq!(config.cluster.ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(config.cluster.initial_leader_id(), Some(5));
    }

    #[test]
    fn test_rejects_small_cluster() {
        let err = BullyConfig::from_str("[cluster]\nids = [1, 2]\ninitial_leader = 1\n").unwrap_err();
        assert!(matches!(err, crate::Error::ClusterSize { size: 2, min: 3, max: 10 }));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let err = BullyConfig::from_str("[cluster]\nids = [1, 1, 2]\n").unwrap_err();
        assert!(matches!(err, crate::Error::DuplicateNodeId(1)));
    }

    #[test]
    fn test_rejects_unknown_leader() {
        let err = BullyConfig::from_str("[cluster]\nids = [1, 2, 3]\ninitial_leader = 8\n").unwrap_err();
        assert!(matches!(err, crate::Error::UnknownInitialLeader(8)));
    }

    #[test]
    fn test_rejects_bad_timing_and_format() {
        let err = BullyConfig::from_str("[timing]\ndetection_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));

        let err = BullyConfig::from_str("[logging]\nformat = \"xml\"\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_round_trip_through_file() {
        let mut config = BullyConfig::default();
        config.cluster = ClusterConfig::sequential(7);
        config.cluster.initial_leader = Some(3);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

        let loaded = BullyConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.cluster.ids.len(), 7);
        assert_eq!(loaded.cluster.initial_leader_id(), Some(3));
    }
}
