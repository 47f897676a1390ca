use crate::error::ConfigError;
use crate::pacing::DelayProfile;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Immutable run configuration.
///
/// Built once at startup and handed to every worker by value; nothing in here
/// is mutated during a run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    /// What to search for, e.g. "coffee shops".
    pub query: String,
    /// Geographic partitions, one worker per entry. Empty means a single
    /// unpartitioned run.
    pub partitions: Vec<String>,
    /// Global target across all partitions.
    pub max_results: usize,
    /// Consecutive no-progress iterations before a run gives up.
    pub stall_threshold: usize,
    pub delays: DelayProfile,
    /// Randomized scroll step in pixels.
    pub scroll_min_px: u32,
    pub scroll_max_px: u32,
    /// Cooperative per-worker time bound; a worker past it returns whatever
    /// it has.
    pub worker_timeout_secs: Option<u64>,
    pub max_workers: usize,
    pub headless: bool,
    /// How long to wait for the results feed to render before declaring the
    /// source unavailable.
    pub feed_wait_secs: u64,
    /// Fields joined into the deduplication key, lead field mandatory.
    pub identity_fields: Vec<String>,
    /// Field each record is tagged with to carry its partition.
    pub partition_field: String,
    pub output_csv: PathBuf,
    pub output_summary: PathBuf,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            query: "coffee shops".to_string(),
            partitions: Vec::new(),
            max_results: 60,
            stall_threshold: 3,
            delays: DelayProfile::default(),
            scroll_min_px: 600,
            scroll_max_px: 1_000,
            worker_timeout_secs: Some(1_800),
            max_workers: 4,
            headless: true,
            feed_wait_secs: 25,
            identity_fields: vec!["name".to_string(), "address".to_string()],
            partition_field: "region".to_string(),
            output_csv: PathBuf::from("results.csv"),
            output_summary: PathBuf::from("run_summary.json"),
        }
    }
}

impl ScoutConfig {
    /// Load from a JSON file and validate. Missing keys fall back to
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_results == 0 {
            return Err(ConfigError::ZeroMaxResults);
        }
        if self.stall_threshold == 0 {
            return Err(ConfigError::ZeroStallThreshold);
        }
        if self.max_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.identity_fields.is_empty() {
            return Err(ConfigError::EmptyIdentityFields);
        }
        if !self.delays.pre_extract.is_valid() {
            return Err(ConfigError::InvertedDelayRange("pre_extract"));
        }
        if !self.delays.pre_advance.is_valid() {
            return Err(ConfigError::InvertedDelayRange("pre_advance"));
        }
        if !self.delays.post_advance.is_valid() {
            return Err(ConfigError::InvertedDelayRange("post_advance"));
        }
        if self.scroll_min_px > self.scroll_max_px {
            return Err(ConfigError::InvertedScrollStep);
        }
        Ok(())
    }

    /// The partitions to run; a single anonymous partition when none are
    /// configured.
    pub fn partition_list(&self) -> Vec<String> {
        if self.partitions.is_empty() {
            vec![String::new()]
        } else {
            self.partitions.clone()
        }
    }

    /// Even split of the global target, as the per-worker bound. At least one
    /// so every partition gets a chance to contribute.
    pub fn per_partition_target(&self) -> usize {
        let count = self.partition_list().len();
        (self.max_results / count).max(1)
    }

    pub fn worker_timeout(&self) -> Option<Duration> {
        self.worker_timeout_secs.map(Duration::from_secs)
    }

    pub fn feed_wait(&self) -> Duration {
        Duration::from_secs(self.feed_wait_secs)
    }

    pub fn scroll_step_px(&self) -> (u32, u32) {
        (self.scroll_min_px, self.scroll_max_px)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ScoutConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ScoutConfig =
            serde_json::from_str(r#"{"query": "estate planning firm", "max_results": 200}"#)
                .unwrap();
        assert_eq!(config.query, "estate planning firm");
        assert_eq!(config.max_results, 200);
        assert_eq!(config.stall_threshold, 3);
        assert_eq!(config.identity_fields, ["name", "address"]);
    }

    #[test]
    fn zero_counts_are_rejected() {
        let mut config = ScoutConfig::default();
        config.max_results = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxResults));

        let mut config = ScoutConfig::default();
        config.max_workers = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroWorkers));
    }

    #[test]
    fn inverted_delay_range_is_rejected() {
        let mut config = ScoutConfig::default();
        config.delays.pre_advance.min_ms = 10_000;
        config.delays.pre_advance.max_ms = 1;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvertedDelayRange("pre_advance"))
        );
    }

    #[test]
    fn target_splits_evenly_across_partitions() {
        let mut config = ScoutConfig::default();
        config.max_results = 100;
        config.partitions = vec![
            "Washington".to_string(),
            "Oregon".to_string(),
            "Idaho".to_string(),
        ];
        assert_eq!(config.per_partition_target(), 33);

        config.partitions.clear();
        assert_eq!(config.per_partition_target(), 100);
    }

    #[test]
    fn tiny_target_still_gives_each_partition_one() {
        let mut config = ScoutConfig::default();
        config.max_results = 1;
        config.partitions = vec!["a".to_string(), "b".to_string()];
        assert_eq!(config.per_partition_target(), 1);
    }
}
