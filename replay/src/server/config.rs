//! Command line arguments and server configuration.

use std::time::Duration;

use clap::Parser;
use common::SegmentLayout;
use common::duration::parse_duration;

use crate::config::Config;

/// CLI arguments for the replay server.
#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Message bus replay: acknowledged delivery of archived segments")]
pub struct CliArgs {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "READER_CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(short, long, default_value = "8082", env = "READER_PORT")]
    pub port: u16,

    /// S3 bucket holding archived segments (switches storage to S3)
    #[arg(long, env = "S3_BUCKET")]
    pub bucket: Option<String>,

    /// AWS region of the bucket
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Archive layout to stream: "dated" or "jsonl"
    #[arg(long, env = "READER_LAYOUT")]
    pub layout: Option<SegmentLayout>,

    /// Interval between listings, e.g. "1s"
    #[arg(long, env = "READER_POLL_INTERVAL", value_parser = parse_duration)]
    pub poll_interval: Option<Duration>,

    /// How long to wait for each acknowledgement, e.g. "10s"
    #[arg(long, env = "READER_ACK_TIMEOUT", value_parser = parse_duration)]
    pub ack_timeout: Option<Duration>,
}

impl CliArgs {
    /// Applies command line overrides on top of a loaded configuration.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(bucket) = &self.bucket {
            config.storage = config
                .storage
                .with_bucket(bucket.clone(), self.region.clone());
        }
        if let Some(layout) = self.layout {
            config.session.layout = layout;
        }
        if let Some(interval) = self.poll_interval {
            config.session.poll_interval = interval;
        }
        if let Some(timeout) = self.ack_timeout {
            config.session.ack_timeout = timeout;
        }
        config
    }
}

/// Configuration for the replay HTTP server.
#[derive(Debug, Clone)]
pub struct ReplayServerConfig {
    pub port: u16,
}

impl ReplayServerConfig {
    pub fn new(args: &CliArgs) -> Self {
        Self { port: args.port }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_apply_cli_overrides() {
        // given
        let args = CliArgs::parse_from([
            "replay",
            "--layout",
            "jsonl",
            "--poll-interval",
            "250ms",
            "--ack-timeout",
            "2s",
        ]);

        // when
        let config = args.apply(Config::default());

        // then
        assert_eq!(config.session.layout, SegmentLayout::Jsonl);
        assert_eq!(config.session.poll_interval, Duration::from_millis(250));
        assert_eq!(config.session.ack_timeout, Duration::from_secs(2));
        assert_eq!(config.session.max_attempts, 3);
        assert_eq!(args.port, 8082);
    }
}
