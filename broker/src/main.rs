//! Broker binary entry point.

use std::sync::Arc;

use broker::server::{BrokerServer, BrokerServerConfig, CliArgs};
use broker::{Config, Fanout, JsonlEmitter, SegmentEngine, load_config};
use clap::Parser;
use common::{Clock, SystemClock, create_blob_store};
use tracing_subscriber::EnvFilter;

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

    tracing::info!("Creating blob store with config: {:?}", config.storage);
    let store = create_blob_store(&config.storage).unwrap_or_else(|e| {
        tracing::error!("Failed to create blob store: {}", e);
        std::process::exit(1);
    });

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = SegmentEngine::open(config.engine.clone(), store.clone(), clock.clone())
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to open segment engine: {}", e);
            std::process::exit(1);
        });

    let emitter = config
        .emitter
        .enabled
        .then(|| Arc::new(JsonlEmitter::new(config.emitter.clone(), store, clock)));

    let server_config = BrokerServerConfig::new(&args, &config);
    let server = BrokerServer::new(Arc::new(engine), Fanout::new(), emitter, server_config);
    if let Err(e) = server.run().await {
        tracing::error!("Server failed: {}", e);
        std::process::exit(1);
    }
}
