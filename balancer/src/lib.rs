//! Routing tier of the message bus.
//!
//! The balancer is the single entry point for publishers and subscribers.
//! It keeps the live broker and replay instances of the cluster in
//! [`MembershipTracker`]s and routes every request with [`hash::pick`]:
//!
//! - publishes and live subscriptions by topic, so all traffic of a topic
//!   meets on the same broker;
//! - replay subscriptions by subscriber and topic, so a reconnecting
//!   subscriber resumes on the same replay instance.
//!
//! Publishes are forwarded as HTTP requests; subscriptions are relayed as
//! websockets frame by frame.

mod config;
mod error;
pub mod hash;
pub mod membership;
#[cfg(feature = "http-server")]
pub mod server;

pub use config::{
    Config, KubernetesSourceConfig, MembershipConfig, SourceConfig, StaticSourceConfig,
    UpstreamConfig, load_config,
};
pub use error::{Error, Result};
pub use membership::{
    Instance, InstanceSource, KubernetesInstanceSource, MembershipTracker, StaticInstanceSource,
};
