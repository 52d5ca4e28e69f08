//! Building blocks shared by the balancer, broker and replay services.
//!
//! - [`storage`]: the key-addressed [`BlobStore`] that holds archived
//!   segments and checkpoints, with an `object_store` backed implementation.
//! - [`keys`]: the blob key layout and topic name validation.
//! - [`protocol`]: JSON frames exchanged with publishers and subscribers.
//! - [`metrics`]: HTTP request metrics applied as an axum middleware.
//! - [`clock`]: injectable time source.

pub mod clock;
pub mod duration;
pub mod keys;
pub mod metrics;
pub mod protocol;
pub mod shutdown;
pub mod storage;

pub use clock::{Clock, MockClock, SystemClock};
pub use keys::{SegmentLayout, TopicError, validate_topic};
pub use protocol::{
    AckFrame, BatchFrame, ErrorFrame, ProtocolError, PublishRequest, PublishResponse,
    SubscribeRequest,
};
pub use storage::config::BlobStoreConfig;
pub use storage::factory::create_blob_store;
pub use storage::object::ObjectBlobStore;
pub use storage::{BlobError, BlobResult, BlobStore};
