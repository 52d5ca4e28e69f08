//! Websocket surface of the replay tier.

mod config;
mod handlers;
mod http;
mod metrics;
mod ws;

pub use config::{CliArgs, ReplayServerConfig};
pub use handlers::AppState;
pub use http::{ReplayServer, build_router};
pub use metrics::Metrics;
