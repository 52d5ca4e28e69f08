//! HTTP and websocket surface of the balancer.

mod config;
mod error;
mod handlers;
mod http;
mod metrics;
mod relay;

pub use config::{BalancerServerConfig, CliArgs};
pub use handlers::AppState;
pub use http::{BalancerServer, build_router};
pub use metrics::Metrics;
