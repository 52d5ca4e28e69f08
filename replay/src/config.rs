//! Configuration for the replay tier.
//!
//! ```yaml
//! storage:
//!   type: Aws
//!   region: us-east-1
//!   bucket: message-archive
//! session:
//!   layout: jsonl
//!   ack_timeout: 10s
//! ```

use std::path::Path;
use std::time::Duration;

use common::duration::serde_str;
use common::{BlobStoreConfig, SegmentLayout};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level replay configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Blob store holding archived segments and checkpoints.
    #[serde(default)]
    pub storage: BlobStoreConfig,

    /// Per-session delivery settings.
    #[serde(default)]
    pub session: ReplayConfig,
}

/// Delivery settings of a replay session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Which archive layout to stream.
    pub layout: SegmentLayout,

    /// Interval between listings of new segments.
    #[serde(with = "serde_str")]
    pub poll_interval: Duration,

    /// How long to wait for the acknowledgement of one send.
    #[serde(with = "serde_str")]
    pub ack_timeout: Duration,

    /// Sends of the same segment before the session gives up.
    pub max_attempts: u32,

    /// Interval between keepalive pings.
    #[serde(with = "serde_str")]
    pub ping_interval: Duration,

    /// A connection with no inbound frame (pongs included) for this long is
    /// considered gone.
    #[serde(with = "serde_str")]
    pub idle_timeout: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            layout: SegmentLayout::Dated,
            poll_interval: Duration::from_secs(1),
            ack_timeout: Duration::from_secs(10),
            max_attempts: 3,
            ping_interval: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Loads the replay configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())
        .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

    serde_yaml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))
}
