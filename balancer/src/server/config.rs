//! Command line arguments and server configuration.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use common::duration::parse_duration;

use crate::config::{Config, KubernetesSourceConfig, SourceConfig, StaticSourceConfig};

/// Where instance lists come from when chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    Static,
    Kubernetes,
}

/// CLI arguments for the balancer.
#[derive(Parser, Debug)]
#[command(name = "balancer")]
#[command(about = "Message bus balancer: routes publishes and subscriptions")]
pub struct CliArgs {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "BALANCER_CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(short, long, default_value = "8083", env = "PORT")]
    pub port: u16,

    /// Instance source
    #[arg(long, value_enum, env = "BALANCER_SOURCE")]
    pub source: Option<SourceKind>,

    /// Namespace to discover pods in
    #[arg(long, env = "POD_NAMESPACE")]
    pub namespace: Option<String>,

    /// Comma separated broker addresses for the static source
    #[arg(long, value_delimiter = ',', env = "BALANCER_BROKERS")]
    pub brokers: Vec<String>,

    /// Comma separated replay addresses for the static source
    #[arg(long, value_delimiter = ',', env = "BALANCER_REPLAYS")]
    pub replays: Vec<String>,

    /// Interval between membership refreshes, e.g. "5s"
    #[arg(long, env = "BALANCER_REFRESH_INTERVAL", value_parser = parse_duration)]
    pub refresh_interval: Option<Duration>,
}

impl CliArgs {
    /// Applies command line overrides on top of a loaded configuration.
    pub fn apply(&self, mut config: Config) -> Config {
        match self.source {
            Some(SourceKind::Static) => {
                config.membership.source = SourceConfig::Static(StaticSourceConfig::default());
            }
            Some(SourceKind::Kubernetes) => {
                if !matches!(config.membership.source, SourceConfig::Kubernetes(_)) {
                    config.membership.source =
                        SourceConfig::Kubernetes(KubernetesSourceConfig::default());
                }
            }
            None => {}
        }

        match &mut config.membership.source {
            SourceConfig::Static(source) => {
                if !self.brokers.is_empty() {
                    source.brokers = self.brokers.clone();
                }
                if !self.replays.is_empty() {
                    source.replays = self.replays.clone();
                }
            }
            SourceConfig::Kubernetes(source) => {
                if let Some(namespace) = &self.namespace {
                    source.namespace = Some(namespace.clone());
                }
            }
        }

        if let Some(interval) = self.refresh_interval {
            config.membership.refresh_interval = interval;
        }
        config
    }
}

/// Configuration for the balancer HTTP server.
#[derive(Debug, Clone)]
pub struct BalancerServerConfig {
    pub port: u16,
    pub request_timeout: Duration,
}

impl BalancerServerConfig {
    pub fn new(args: &CliArgs, config: &Config) -> Self {
        Self {
            port: args.port,
            request_timeout: config.upstream.request_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_switch_to_static_source() {
        // given
        let args = CliArgs::parse_from([
            "balancer",
            "--source",
            "static",
            "--brokers",
            "127.0.0.1:8080,127.0.0.1:9080",
            "--replays",
            "127.0.0.1:8082",
        ]);

        // when
        let config = args.apply(Config::default());

        // then
        assert_eq!(
            config.membership.source,
            SourceConfig::Static(StaticSourceConfig {
                brokers: vec!["127.0.0.1:8080".to_string(), "127.0.0.1:9080".to_string()],
                replays: vec!["127.0.0.1:8082".to_string()],
            })
        );
    }

    #[test]
    fn should_override_kubernetes_namespace() {
        // given
        let args = CliArgs::parse_from(["balancer", "--namespace", "messaging", "--port", "9000"]);

        // when
        let config = args.apply(Config::default());

        // then
        match config.membership.source {
            SourceConfig::Kubernetes(source) => {
                assert_eq!(source.namespace.as_deref(), Some("messaging"));
            }
            other => panic!("unexpected source {:?}", other),
        }
        assert_eq!(args.port, 9000);
    }
}
