//! Replay tier of the message bus.
//!
//! A replay subscriber connects with a subscriber id and a topic and receives
//! every archived segment of the topic it has not yet acknowledged, oldest
//! first, one segment at a time. Progress is kept in a durable checkpoint per
//! subscriber and topic, so a reconnecting subscriber resumes right after the
//! last segment it acknowledged.
//!
//! # Key Concepts
//!
//! - **Checkpoint**: the key of the last acknowledged segment.
//! - **ReplaySession**: the send, wait for ack, advance loop of one connection.
//! - **BatchSink**: the outbound half of a connection; the websocket server
//!   provides one, tests provide their own.

mod checkpoint;
mod config;
mod error;
mod listing;
#[cfg(feature = "http-server")]
pub mod server;
mod session;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use config::{Config, ReplayConfig, load_config};
pub use error::{Error, Result};
pub use listing::pending_segments;
pub use session::{
    BatchSink, NO_ACK_REASON, ReplayMetrics, ReplaySession, SessionOutcome, SessionReport,
};
