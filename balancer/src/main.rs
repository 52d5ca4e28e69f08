//! Balancer binary entry point.

use std::sync::Arc;

use balancer::server::{BalancerServer, BalancerServerConfig, CliArgs};
use balancer::{
    Config, InstanceSource, KubernetesInstanceSource, MembershipTracker, SourceConfig,
    StaticInstanceSource, load_config,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

const BROKER: &str = "broker";
const REPLAY: &str = "replay";

fn instance_source(config: &Config, role: &str) -> balancer::Result<Arc<dyn InstanceSource>> {
    match &config.membership.source {
        SourceConfig::Static(source) => {
            let addresses = if role == BROKER {
                &source.brokers
            } else {
                &source.replays
            };
            Ok(Arc::new(StaticInstanceSource::new(addresses.clone())))
        }
        SourceConfig::Kubernetes(source) => {
            let (selector, port) = if role == BROKER {
                (&source.broker_selector, source.broker_port)
            } else {
                (&source.replay_selector, source.replay_port)
            };
            Ok(Arc::new(KubernetesInstanceSource::in_cluster(
                source.namespace.clone(),
                selector.clone(),
                port,
                config.upstream.request_timeout,
            )?))
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::info!("No configuration file provided, using defaults");
            Config::default()
        }
    };
    let config = args.apply(config);

    tracing::info!("Membership source: {:?}", config.membership.source);
    let interval = config.membership.refresh_interval;
    let tracker = |role: &str| {
        let source = instance_source(&config, role).unwrap_or_else(|e| {
            tracing::error!("Failed to initialise {} membership source: {}", role, e);
            std::process::exit(1);
        });
        Arc::new(MembershipTracker::new(role, source, interval))
    };
    let brokers = tracker(BROKER);
    let replays = tracker(REPLAY);

    let server_config = BalancerServerConfig::new(&args, &config);
    let server = BalancerServer::new(brokers, replays, server_config);
    if let Err(e) = server.run().await {
        tracing::error!("Server failed: {}", e);
        std::process::exit(1);
    }
}
