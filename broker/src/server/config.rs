//! Command line arguments and server configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use common::duration::parse_duration;

use crate::config::Config;

/// CLI arguments for the broker.
#[derive(Parser, Debug)]
#[command(name = "broker")]
#[command(about = "Message bus broker: durable segments and live fanout")]
pub struct CliArgs {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "BROKER_CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "BROKER_PORT")]
    pub port: u16,

    /// Directory for open segment files
    #[arg(long, env = "BROKER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// S3 bucket receiving sealed segments (switches storage to S3)
    #[arg(long, env = "S3_BUCKET")]
    pub bucket: Option<String>,

    /// AWS region of the bucket
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Active buffer size that forces a rotation
    #[arg(long, env = "BROKER_BUFFER_THRESHOLD_BYTES")]
    pub buffer_threshold_bytes: Option<u64>,

    /// Segment size that forces a seal
    #[arg(long, env = "BROKER_SEGMENT_MAX_BYTES")]
    pub segment_max_bytes: Option<u64>,

    /// Segment age that forces a seal, e.g. "10m"
    #[arg(long, env = "BROKER_SEGMENT_MAX_AGE", value_parser = parse_duration)]
    pub segment_max_age: Option<Duration>,

    /// Enable the JSONL archive path
    #[arg(long, env = "BROKER_EMITTER_ENABLED")]
    pub emitter: bool,
}

impl CliArgs {
    /// Applies command line overrides on top of a loaded configuration.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(bucket) = &self.bucket {
            config.storage = config
                .storage
                .with_bucket(bucket.clone(), self.region.clone());
        }
        if let Some(data_dir) = &self.data_dir {
            config.engine.data_dir = data_dir.clone();
        }
        if let Some(bytes) = self.buffer_threshold_bytes {
            config.engine.buffer_threshold_bytes = bytes;
        }
        if let Some(bytes) = self.segment_max_bytes {
            config.engine.segment_max_bytes = bytes;
        }
        if let Some(age) = self.segment_max_age {
            config.engine.segment_max_age = age;
        }
        if self.emitter {
            config.emitter.enabled = true;
        }
        config
    }
}

/// Configuration for the broker HTTP server.
#[derive(Debug, Clone)]
pub struct BrokerServerConfig {
    pub port: u16,
    pub keepalive_interval: Duration,
}

impl BrokerServerConfig {
    pub fn new(args: &CliArgs, config: &Config) -> Self {
        Self {
            port: args.port,
            keepalive_interval: config.fanout.keepalive_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use common::BlobStoreConfig;
    use common::storage::config::AwsBlobStoreConfig;

    use super::*;

    #[test]
    fn should_apply_cli_overrides() {
        // given
        let args = CliArgs::parse_from([
            "broker",
            "--bucket",
            "archive",
            "--region",
            "us-east-1",
            "--segment-max-age",
            "5m",
            "--emitter",
        ]);

        // when
        let config = args.apply(Config::default());

        // then
        assert_eq!(
            config.storage,
            BlobStoreConfig::Aws(AwsBlobStoreConfig {
                region: "us-east-1".to_string(),
                bucket: "archive".to_string(),
            })
        );
        assert_eq!(config.engine.segment_max_age, Duration::from_secs(300));
        assert!(config.emitter.enabled);
        assert_eq!(args.port, 8080);
    }
}
