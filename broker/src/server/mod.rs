//! HTTP and websocket surface of the broker.

mod config;
mod error;
mod handlers;
mod http;
mod metrics;
mod ws;

pub use config::{BrokerServerConfig, CliArgs};
pub use handlers::AppState;
pub use http::{BrokerServer, build_router};
pub use metrics::Metrics;
