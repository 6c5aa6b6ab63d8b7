//! # Watermark Queue
//!
//! Bounded image processing queue that sends each image through an external
//! watermark-removal transformation, a few at a time.
//!
//! ## Key Features
//!
//! - **Capacity-bounded queue**: at most `max_capacity` items (10 by
//!   default); oversized additions are truncated, not rejected wholesale
//! - **Per-item lifecycle**: `Idle -> Running -> Success | Failed`, with
//!   failed items picked up again by the next run
//! - **Bounded concurrency**: items are dispatched in consecutive groups of
//!   `batch_width` (2 by default); a group fully resolves before the next starts
//! - **Owned preview resources**: every item holds a handle for its original
//!   payload and, once transformed, for its result; handles are released on
//!   removal or replacement
//! - **Live statistics**: [`QueueStats`] is derived from the current contents
//!   on every call
//!
//! ## Quick Start
//!
//! 1. Implement [`Transformer`] for your watermark-removal backend
//! 2. Create an [`ItemQueue`] and [`add()`](ItemQueue::add) inputs
//! 3. Call [`BatchScheduler::run_all()`] whenever the user starts processing
//! 4. Read [`ItemQueue::snapshot()`] and [`ItemQueue::stats()`] to render

pub mod config;
pub mod encoder;
pub mod error;
pub mod events;
pub mod queue;
pub mod resource;
pub mod scheduler;
pub mod stats;
pub mod types;

pub use config::{QueueConfig, QueueConfigBuilder, BATCH_WIDTH, MAX_CAPACITY};
pub use encoder::FileEncoder;
pub use error::{ItemError, QueueError};
pub use events::{EventSink, NoopSink, QueueEvent};
pub use queue::ItemQueue;
pub use resource::{Resource, ResourceHandle, ResourceStore};
pub use scheduler::BatchScheduler;
pub use stats::QueueStats;
pub use types::{
    media_type_for_path, AddOutcome, Input, Item, ItemStatus, Payload, RunSummary,
    TransformOutput,
};

/// The external image transformation (e.g. a watermark-removal service).
///
/// Only the error's message is used: it is rendered with `{:#}` and stored
/// on the failed item.
///
/// # Example
///
/// ```ignore
/// use watermark_queue::*;
///
/// struct Passthrough;
///
/// impl Transformer for Passthrough {
///     async fn transform(
///         &self,
///         bytes: &[u8],
///         _media_type: &str,
///     ) -> anyhow::Result<TransformOutput> {
///         Ok(TransformOutput::new(bytes.to_vec()))
///     }
/// }
/// ```
pub trait Transformer: Send + Sync + 'static {
    /// Transform one image.
    ///
    /// # Arguments
    /// * `bytes`: the encoded input image
    /// * `media_type`: the input's media type (e.g. `image/png`)
    fn transform(
        &self,
        bytes: &[u8],
        media_type: &str,
    ) -> impl std::future::Future<Output = anyhow::Result<TransformOutput>> + Send;
}

/// Turns an item's payload into the bytes handed to the [`Transformer`].
///
/// A failure is recorded on the item exactly like a failed transformation.
pub trait PayloadEncoder: Send + Sync + 'static {
    /// Produce the bytes for one payload. Called at dispatch time, once per
    /// attempt.
    fn encode(
        &self,
        payload: &Payload,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, ItemError>> + Send;
}
