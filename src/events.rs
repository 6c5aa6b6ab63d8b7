use serde::{Deserialize, Serialize};

use crate::types::{ItemStatus, RunSummary};

/// Notification emitted by the queue and scheduler.
///
/// Events are advisory; [`ItemQueue::snapshot`](crate::ItemQueue::snapshot)
/// is always the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum QueueEvent {
    /// Inputs were offered to the queue.
    ItemsAdded { admitted: usize, rejected: usize },
    /// An item was removed by the caller.
    ItemRemoved { id: String },
    /// The queue was emptied.
    QueueCleared { released: usize },
    /// A scheduler run picked its eligible set.
    RunStarted { eligible: usize },
    /// An item was dispatched to the transformation.
    ItemStarted { id: String },
    /// An item's transformation resolved.
    ItemFinished {
        id: String,
        status: ItemStatus,
        error: Option<String>,
        duration_ms: u64,
        /// Items of this run resolved so far.
        completed: usize,
        /// Items dispatched by this run.
        total: usize,
    },
    /// A scheduler run finished.
    RunCompleted { summary: RunSummary },
}

impl QueueEvent {
    /// Channel name used when forwarding to a frontend.
    pub fn name(&self) -> &'static str {
        match self {
            QueueEvent::ItemsAdded { .. } => "watermark_queue:items_added",
            QueueEvent::ItemRemoved { .. } => "watermark_queue:item_removed",
            QueueEvent::QueueCleared { .. } => "watermark_queue:queue_cleared",
            QueueEvent::RunStarted { .. } => "watermark_queue:run_started",
            QueueEvent::ItemStarted { .. } => "watermark_queue:item_started",
            QueueEvent::ItemFinished { .. } => "watermark_queue:item_finished",
            QueueEvent::RunCompleted { .. } => "watermark_queue:run_completed",
        }
    }
}

/// Receiver of [`QueueEvent`]s.
///
/// Implementations must not block; emission failures are swallowed.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &QueueEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &QueueEvent) {}
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<QueueEvent> {
    fn emit(&self, event: &QueueEvent) {
        let _ = self.send(event.clone());
    }
}

impl<S: EventSink + ?Sized> EventSink for std::sync::Arc<S> {
    fn emit(&self, event: &QueueEvent) {
        (**self).emit(event);
    }
}

#[cfg(feature = "tauri")]
impl<R: tauri::Runtime> EventSink for tauri::AppHandle<R> {
    fn emit(&self, event: &QueueEvent) {
        use tauri::Emitter;
        if let Err(e) = Emitter::emit(self, event.name(), event) {
            tracing::debug!(event = event.name(), error = %e, "failed to emit event");
        }
    }
}
