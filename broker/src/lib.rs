//! Broker tier of the message bus.
//!
//! The broker accepts publishes for the topics routed to it, keeps the most
//! recent payloads of each topic in a double buffer, appends every payload to
//! a local segment file and archives sealed segments to the blob store. In
//! parallel every accepted payload is pushed to the topic's live subscribers.
//!
//! # Key Concepts
//!
//! - **SegmentEngine**: owns the per-topic buffers and segment files and the
//!   supervised tasks that rotate and seal them.
//! - **Fanout**: registry of connected push subscribers per topic.
//! - **JsonlEmitter**: optional second archive path writing JSON lines.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use broker::{EngineConfig, Fanout, SegmentEngine};
//! use bytes::Bytes;
//! use common::{ObjectBlobStore, SystemClock};
//!
//! let engine = SegmentEngine::open(
//!     EngineConfig::default(),
//!     Arc::new(ObjectBlobStore::in_memory()),
//!     Arc::new(SystemClock),
//! )
//! .await?;
//! let fanout = Fanout::new();
//!
//! engine.ingest("orders", Bytes::from("m1")).await?;
//! fanout.dispatch("orders", Bytes::from("m1"));
//! ```

mod buffer;
mod config;
mod emitter;
mod engine;
mod error;
mod fanout;
mod segment;
#[cfg(feature = "http-server")]
pub mod server;

pub use config::{Config, EmitterConfig, EngineConfig, FanoutConfig, load_config};
pub use emitter::{JsonlEmitter, StoredMessage};
pub use engine::{SegmentEngine, TopicStats};
pub use error::{Error, Result};
pub use fanout::{Fanout, FanoutDispatch, PushSink, Subscriber};
