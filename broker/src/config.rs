//! Configuration for the broker.
//!
//! Every field has a default, so a YAML file only needs to name what it
//! overrides:
//!
//! ```yaml
//! storage:
//!   type: Aws
//!   region: us-east-1
//!   bucket: message-archive
//! engine:
//!   data_dir: /var/lib/broker
//!   segment_max_age: 5m
//! emitter:
//!   enabled: true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::BlobStoreConfig;
use common::duration::serde_str;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MIB: u64 = 1024 * 1024;

/// Top-level broker configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Blob store receiving sealed segments.
    #[serde(default)]
    pub storage: BlobStoreConfig,

    /// Buffer and segment thresholds.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Live subscriber settings.
    #[serde(default)]
    pub fanout: FanoutConfig,

    /// Optional JSONL archive path.
    #[serde(default)]
    pub emitter: EmitterConfig,
}

/// Configuration of the durable segment engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding open and not yet uploaded segment files.
    pub data_dir: PathBuf,

    /// Active buffer size that triggers an immediate rotation.
    pub buffer_threshold_bytes: u64,

    /// Interval of the unconditional buffer rotation.
    #[serde(with = "serde_str")]
    pub rotation_interval: Duration,

    /// Segment size that triggers a seal.
    pub segment_max_bytes: u64,

    /// Segment age that triggers a seal of a non-empty segment.
    #[serde(with = "serde_str")]
    pub segment_max_age: Duration,

    /// How often each topic checks whether its segment is due.
    #[serde(with = "serde_str")]
    pub flush_check_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".segments"),
            buffer_threshold_bytes: 10 * MIB,
            rotation_interval: Duration::from_secs(10),
            segment_max_bytes: 100 * MIB,
            segment_max_age: Duration::from_secs(10 * 60),
            flush_check_interval: Duration::from_secs(1),
        }
    }
}

/// Configuration of live push subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Interval between keepalive pings to each subscriber.
    #[serde(with = "serde_str")]
    pub keepalive_interval: Duration,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(10),
        }
    }
}

/// Configuration of the JSONL emitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Whether accepted publishes are also written to the JSONL archive.
    pub enabled: bool,

    /// Per-topic cache size that triggers a flush.
    pub max_cache_bytes: usize,

    /// Interval of the auto-flush task.
    #[serde(with = "serde_str")]
    pub flush_interval: Duration,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_cache_bytes: MIB as usize,
            flush_interval: Duration::from_secs(2),
        }
    }
}

/// Loads the broker configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())
        .map_err(|e| Error::Io(format!("Failed to read config file: {}", e)))?;

    serde_yaml::from_str(&contents)
        .map_err(|e| Error::Encoding(format!("Failed to parse config file: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_use_documented_defaults() {
        // given/when
        let config = EngineConfig::default();

        // then
        assert_eq!(config.buffer_threshold_bytes, 10 * 1024 * 1024);
        assert_eq!(config.segment_max_bytes, 100 * 1024 * 1024);
        assert_eq!(config.rotation_interval, Duration::from_secs(10));
        assert_eq!(config.segment_max_age, Duration::from_secs(600));
        assert_eq!(config.flush_check_interval, Duration::from_secs(1));
    }

    #[test]
    fn should_parse_partial_yaml_config() {
        // given
        let yaml = r#"
storage:
  type: InMemory
engine:
  data_dir: /tmp/segments
  segment_max_age: 5m
emitter:
  enabled: true
  max_cache_bytes: 4096
"#;

        // when
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // then
        assert_eq!(config.storage, BlobStoreConfig::InMemory);
        assert_eq!(config.engine.data_dir, PathBuf::from("/tmp/segments"));
        assert_eq!(config.engine.segment_max_age, Duration::from_secs(300));
        assert_eq!(config.engine.rotation_interval, Duration::from_secs(10));
        assert!(config.emitter.enabled);
        assert_eq!(config.emitter.max_cache_bytes, 4096);
        assert_eq!(config.fanout.keepalive_interval, Duration::from_secs(10));
    }

    #[test]
    fn should_load_config_from_file() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.yaml");
        std::fs::write(&path, "fanout:\n  keepalive_interval: 30s\n").unwrap();

        // when
        let config = load_config(&path).unwrap();

        // then
        assert_eq!(config.fanout.keepalive_interval, Duration::from_secs(30));
    }

    #[test]
    fn should_fail_on_missing_config_file() {
        let result = load_config("/nonexistent/broker.yaml");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
