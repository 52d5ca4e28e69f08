//! Configuration for the routing tier.
//!
//! ```yaml
//! membership:
//!   refresh_interval: 5s
//!   source:
//!     type: Kubernetes
//!     namespace: messaging
//!     broker_selector: app=broker
//!     replay_selector: app=replay
//! upstream:
//!   request_timeout: 10s
//! ```

use std::path::Path;
use std::time::Duration;

use common::duration::serde_str;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level balancer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub membership: MembershipConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Where live broker and replay instances come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipConfig {
    /// Interval between refreshes of each role's instance list.
    #[serde(with = "serde_str")]
    pub refresh_interval: Duration,

    pub source: SourceConfig,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(5),
            source: SourceConfig::default(),
        }
    }
}

/// Instance source selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceConfig {
    /// Fixed `host:port` lists, for local runs.
    Static(StaticSourceConfig),
    /// Pods listed from the Kubernetes API of the cluster the balancer runs in.
    Kubernetes(KubernetesSourceConfig),
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Kubernetes(KubernetesSourceConfig::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticSourceConfig {
    pub brokers: Vec<String>,
    pub replays: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesSourceConfig {
    /// Namespace to list pods in; falls back to `POD_NAMESPACE`, then `default`.
    pub namespace: Option<String>,
    pub broker_selector: String,
    pub replay_selector: String,
    pub broker_port: u16,
    pub replay_port: u16,
}

impl Default for KubernetesSourceConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            broker_selector: "app=broker".to_string(),
            replay_selector: "app=replay".to_string(),
            broker_port: 8080,
            replay_port: 8082,
        }
    }
}

/// Settings for requests forwarded to brokers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    #[serde(with = "serde_str")]
    pub request_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Loads the balancer configuration from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())
        .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

    serde_yaml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_kubernetes_membership() {
        // given/when
        let config = Config::default();

        // then
        assert_eq!(config.membership.refresh_interval, Duration::from_secs(5));
        assert_eq!(
            config.membership.source,
            SourceConfig::Kubernetes(KubernetesSourceConfig::default())
        );
        assert_eq!(config.upstream.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn should_parse_static_membership() {
        // given
        let yaml = r#"
membership:
  refresh_interval: 1s
  source:
    type: Static
    brokers: ["127.0.0.1:8080"]
    replays: ["127.0.0.1:8082"]
"#;

        // when
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // then
        assert_eq!(config.membership.refresh_interval, Duration::from_secs(1));
        assert_eq!(
            config.membership.source,
            SourceConfig::Static(StaticSourceConfig {
                brokers: vec!["127.0.0.1:8080".to_string()],
                replays: vec!["127.0.0.1:8082".to_string()],
            })
        );
    }

    #[test]
    fn should_load_config_from_file() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("balancer.yaml");
        std::fs::write(
            &path,
            "membership:\n  source:\n    type: Kubernetes\n    namespace: messaging\n",
        )
        .unwrap();

        // when
        let config = load_config(&path).unwrap();

        // then
        match config.membership.source {
            SourceConfig::Kubernetes(k8s) => {
                assert_eq!(k8s.namespace.as_deref(), Some("messaging"));
                assert_eq!(k8s.broker_selector, "app=broker");
            }
            other => panic!("unexpected source {:?}", other),
        }
    }
}
