use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use futures::future::join_all;
use futures::FutureExt;

use crate::encoder::FileEncoder;
use crate::error::ItemError;
use crate::events::QueueEvent;
use crate::queue::ItemQueue;
use crate::types::{ItemStatus, RunSummary};
use crate::{PayloadEncoder, Transformer};

/// How a single dispatched (or skipped) item ended.
enum ItemOutcome {
    /// The item vanished or stopped being eligible before dispatch.
    Skipped,
    Succeeded,
    Failed,
    /// The call finished but the item had been removed meanwhile.
    Dropped,
}

/// Fails a dispatched item if its future is dropped before a result is
/// recorded, so a cancelled run never leaves it `Running`.
struct InFlight<'a> {
    queue: &'a ItemQueue,
    id: &'a str,
    start: Instant,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(queue: &'a ItemQueue, id: &'a str) -> Self {
        Self {
            queue,
            id,
            start: Instant::now(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let duration_ms = self.start.elapsed().as_millis() as u64;
        match self
            .queue
            .finish_failure(self.id, "run cancelled".to_string(), duration_ms)
        {
            Ok(true) => tracing::warn!(id = self.id, "run cancelled, item marked failed"),
            Ok(false) => {}
            Err(e) => tracing::error!(id = self.id, error = %e, "failed to fail cancelled item"),
        }
    }
}

/// Drives eligible items through the [`Transformer`] with bounded concurrency.
///
/// A run snapshots the eligible items (`Idle` or `Failed`) in queue order,
/// splits them into consecutive groups of the queue's `batch_width`, and
/// processes the groups one after another; items within a group run
/// concurrently. Per-item failures are recorded on the item and never abort
/// the run.
///
/// The scheduler holds no items. It reads and updates them by ID, so items
/// removed mid-run are tolerated. Callers should not start two runs on the
/// same queue at once; an item already `Running` is skipped by the second run.
///
/// Dropping the `run_all` future (timeout, `select!`, shutdown) marks every
/// in-flight item `Failed` with "run cancelled"; items not yet dispatched
/// keep their status.
///
/// # Example
///
/// ```ignore
/// let queue = ItemQueue::new();
/// queue.add(vec![Input::from_path("photo.png")])?;
///
/// let scheduler = BatchScheduler::new(MyRemover::new());
/// let summary = scheduler.run_all(&queue).await;
/// println!("{} ok, {} failed", summary.succeeded, summary.failed);
/// ```
pub struct BatchScheduler<T, E = FileEncoder> {
    transformer: T,
    encoder: E,
}

impl<T> BatchScheduler<T, FileEncoder>
where
    T: Transformer,
{
    /// Create a scheduler that reads payloads with [`FileEncoder`].
    pub fn new(transformer: T) -> Self {
        Self {
            transformer,
            encoder: FileEncoder,
        }
    }
}

impl<T, E> BatchScheduler<T, E>
where
    T: Transformer,
    E: PayloadEncoder,
{
    /// Replace the payload encoder.
    pub fn with_encoder<E2: PayloadEncoder>(self, encoder: E2) -> BatchScheduler<T, E2> {
        BatchScheduler {
            transformer: self.transformer,
            encoder,
        }
    }

    pub fn transformer(&self) -> &T {
        &self.transformer
    }

    /// Process every item that is eligible right now.
    ///
    /// Items added while the run is in progress wait for the next run.
    /// Returns immediately, without dispatching anything, when nothing is
    /// eligible.
    pub async fn run_all(&self, queue: &ItemQueue) -> RunSummary {
        let eligible = match queue.eligible_ids() {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "cannot read queue, run aborted");
                return RunSummary::default();
            }
        };

        if eligible.is_empty() {
            tracing::debug!("no eligible items, nothing to run");
            return RunSummary::default();
        }

        let width = queue.config().batch_width.max(1);
        let total = eligible.len();
        tracing::info!(eligible = total, batch_width = width, "run started");
        queue.emit(QueueEvent::RunStarted { eligible: total });

        let started = Instant::now();
        let completed = AtomicUsize::new(0);
        let mut summary = RunSummary::default();

        for group in eligible.chunks(width) {
            let outcomes = join_all(
                group
                    .iter()
                    .map(|id| self.process_item(queue, id, &completed, total)),
            )
            .await;

            for outcome in outcomes {
                match outcome {
                    ItemOutcome::Skipped => continue,
                    ItemOutcome::Succeeded => summary.succeeded += 1,
                    ItemOutcome::Failed => summary.failed += 1,
                    ItemOutcome::Dropped => summary.dropped += 1,
                }
                summary.dispatched += 1;
            }
        }

        summary.total_duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            dispatched = summary.dispatched,
            succeeded = summary.succeeded,
            failed = summary.failed,
            dropped = summary.dropped,
            duration_ms = summary.total_duration_ms,
            "run completed"
        );
        queue.emit(QueueEvent::RunCompleted {
            summary: summary.clone(),
        });
        summary
    }

    async fn process_item(
        &self,
        queue: &ItemQueue,
        id: &str,
        completed: &AtomicUsize,
        total: usize,
    ) -> ItemOutcome {
        let (payload, media_type) = match queue.begin_run(id) {
            Ok(Some(dispatch)) => dispatch,
            Ok(None) => {
                tracing::debug!(id, "item no longer eligible, skipped");
                return ItemOutcome::Skipped;
            }
            Err(e) => {
                tracing::error!(id, error = %e, "failed to mark item running");
                return ItemOutcome::Skipped;
            }
        };

        tracing::debug!(id, media_type = %media_type, "item dispatched");
        queue.emit(QueueEvent::ItemStarted { id: id.to_string() });

        let mut guard = InFlight::new(queue, id);
        let call = async {
            match self.encoder.encode(&payload).await {
                Ok(bytes) => self
                    .transformer
                    .transform(&bytes, &media_type)
                    .await
                    .map_err(|e| ItemError::Transformation(format!("{:#}", e))),
                Err(e) => Err(e),
            }
        };
        let result = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(ItemError::Transformation(
                "transformation panicked".to_string(),
            )),
        };
        let duration_ms = guard.start.elapsed().as_millis() as u64;
        guard.disarm();

        let (status, error, recorded) = match result {
            Ok(output) => {
                let recorded = queue.finish_success(id, output, duration_ms);
                (ItemStatus::Success, None, recorded)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(id, error = %message, "item failed");
                let recorded = queue.finish_failure(id, message.clone(), duration_ms);
                (ItemStatus::Failed, Some(message), recorded)
            }
        };

        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        match recorded {
            Ok(true) => {
                tracing::debug!(id, status = status.as_str(), duration_ms, "item finished");
                queue.emit(QueueEvent::ItemFinished {
                    id: id.to_string(),
                    status,
                    error,
                    duration_ms,
                    completed: done,
                    total,
                });
                if status == ItemStatus::Success {
                    ItemOutcome::Succeeded
                } else {
                    ItemOutcome::Failed
                }
            }
            Ok(false) => {
                tracing::debug!(id, "item removed while running, result discarded");
                ItemOutcome::Dropped
            }
            Err(e) => {
                tracing::error!(id, error = %e, "failed to record item result");
                ItemOutcome::Dropped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Input, TransformOutput};

    struct Echo;

    impl Transformer for Echo {
        async fn transform(
            &self,
            bytes: &[u8],
            _media_type: &str,
        ) -> anyhow::Result<TransformOutput> {
            let mut out = bytes.to_vec();
            out.extend_from_slice(b"-clean");
            Ok(TransformOutput::new(out))
        }
    }

    struct Panics;

    impl Transformer for Panics {
        async fn transform(
            &self,
            _bytes: &[u8],
            _media_type: &str,
        ) -> anyhow::Result<TransformOutput> {
            panic!("backend exploded");
        }
    }

    #[tokio::test]
    async fn test_run_all_processes_idle_items() {
        let queue = ItemQueue::new();
        let ids = queue
            .add(vec![Input::new(b"a".to_vec(), "image/png")])
            .unwrap()
            .admitted_ids;

        let summary = BatchScheduler::new(Echo).run_all(&queue).await;
        assert_eq!(summary.dispatched, 1);
        assert_eq!(summary.succeeded, 1);

        let item = queue.get(&ids[0]).unwrap();
        assert_eq!(item.status, ItemStatus::Success);
        assert!(item.duration_ms.is_some());
        let result = queue
            .resources()
            .resolve(item.result_handle.as_ref().unwrap())
            .unwrap();
        assert_eq!(result.payload.as_bytes(), Some(&b"a-clean"[..]));
        assert_eq!(result.media_type, "image/png");
    }

    #[tokio::test]
    async fn test_run_all_empty_queue() {
        let queue = ItemQueue::new();
        let summary = BatchScheduler::new(Echo).run_all(&queue).await;
        assert_eq!(summary, RunSummary::default());
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let queue = ItemQueue::new();
        let ids = queue
            .add(vec![
                Input::new(b"a".to_vec(), "image/png"),
                Input::new(b"b".to_vec(), "image/png"),
            ])
            .unwrap()
            .admitted_ids;

        let summary = BatchScheduler::new(Panics).run_all(&queue).await;
        assert_eq!(summary.failed, 2);
        for id in &ids {
            let item = queue.get(id).unwrap();
            assert_eq!(item.status, ItemStatus::Failed);
            assert_eq!(item.error.as_deref(), Some("transformation panicked"));
        }
    }
}
