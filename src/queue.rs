use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::events::{EventSink, NoopSink, QueueEvent};
use crate::resource::ResourceStore;
use crate::stats::QueueStats;
use crate::types::*;

/// Bounded, ordered collection of items awaiting or undergoing processing.
///
/// The queue owns its items and every resource handle they hold. Items keep
/// insertion order, which is also the order a scheduler run visits them.
/// All item mutations happen under one lock, so [`snapshot()`](Self::snapshot)
/// always observes a consistent state.
pub struct ItemQueue {
    items: Mutex<Vec<Item>>,
    resources: Arc<ResourceStore>,
    config: QueueConfig,
    events: Arc<dyn EventSink>,
}

impl Default for ItemQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemQueue {
    /// Create an empty queue with the default limits.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            resources: Arc::new(ResourceStore::new()),
            config: QueueConfig::default(),
            events: Arc::new(NoopSink),
        }
    }

    /// Create an empty queue with custom limits.
    pub fn with_config(config: QueueConfig) -> Result<Self, QueueError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Forward queue and scheduler events to `sink`.
    pub fn with_events(mut self, sink: impl EventSink + 'static) -> Self {
        self.events = Arc::new(sink);
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Store holding the original and result resources of every item.
    pub fn resources(&self) -> &Arc<ResourceStore> {
        &self.resources
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Item>>, QueueError> {
        self.items.lock().map_err(|e| {
            tracing::error!(error = %e, "item queue mutex poisoned");
            QueueError::LockPoisoned(e.to_string())
        })
    }

    pub(crate) fn emit(&self, event: QueueEvent) {
        self.events.emit(&event);
    }

    /// Admit as many inputs as there is room for, in order.
    ///
    /// Inputs beyond the remaining capacity are dropped and counted in
    /// [`AddOutcome::rejected`]; a partial admission is not an error.
    pub fn add(&self, inputs: impl IntoIterator<Item = Input>) -> Result<AddOutcome, QueueError> {
        let outcome = {
            let mut items = self.lock()?;
            let remaining = self.config.max_capacity.saturating_sub(items.len());

            let mut outcome = AddOutcome::default();
            for input in inputs {
                if outcome.admitted >= remaining {
                    outcome.rejected += 1;
                    continue;
                }
                let item = self.create_item(input);
                outcome.admitted_ids.push(item.id.clone());
                outcome.admitted += 1;
                items.push(item);
            }
            outcome
        };

        if outcome.capacity_exceeded() {
            tracing::info!(
                admitted = outcome.admitted,
                rejected = outcome.rejected,
                capacity = self.config.max_capacity,
                "queue capacity exceeded, extra inputs dropped"
            );
        } else {
            tracing::debug!(admitted = outcome.admitted, "inputs admitted");
        }

        self.emit(QueueEvent::ItemsAdded {
            admitted: outcome.admitted,
            rejected: outcome.rejected,
        });
        Ok(outcome)
    }

    fn create_item(&self, input: Input) -> Item {
        let original_handle = self
            .resources
            .create(input.payload.clone(), &input.media_type);
        Item {
            id: uuid::Uuid::new_v4().to_string(),
            payload: input.payload,
            media_type: input.media_type,
            status: ItemStatus::Idle,
            original_handle,
            result_handle: None,
            error: None,
            duration_ms: None,
            added_at: chrono::Utc::now().to_rfc3339(),
            started_at: None,
            finished_at: None,
        }
    }

    fn release_handles(&self, item: &Item) {
        self.resources.release(&item.original_handle);
        if let Some(handle) = &item.result_handle {
            self.resources.release(handle);
        }
    }

    /// Remove an item and release its handles.
    ///
    /// Returns `false` if no item has this ID. A removed item that is still
    /// being transformed has its late result discarded.
    pub fn remove(&self, id: &str) -> Result<bool, QueueError> {
        let removed = {
            let mut items = self.lock()?;
            match items.iter().position(|i| i.id == id) {
                Some(idx) => items.remove(idx),
                None => return Ok(false),
            }
        };

        self.release_handles(&removed);
        tracing::debug!(id, status = removed.status.as_str(), "item removed");
        self.emit(QueueEvent::ItemRemoved { id: id.to_string() });
        Ok(true)
    }

    /// Remove every item and release all their handles.
    /// Returns the number of items removed.
    pub fn clear(&self) -> Result<usize, QueueError> {
        let drained: Vec<Item> = {
            let mut items = self.lock()?;
            items.drain(..).collect()
        };

        for item in &drained {
            self.release_handles(item);
        }
        tracing::debug!(released = drained.len(), "queue cleared");
        self.emit(QueueEvent::QueueCleared {
            released: drained.len(),
        });
        Ok(drained.len())
    }

    /// Put a finished item back to `Idle` so the next run processes it again.
    ///
    /// Works on `Success` and `Failed` items. This is the only way a
    /// `Success` item leaves that state other than removal; the scheduler
    /// never picks it up on its own. A previous result handle stays in place
    /// until a new successful run replaces it. Returns `false` for unknown
    /// IDs and for items that are idle or running.
    pub fn resubmit(&self, id: &str) -> Result<bool, QueueError> {
        let mut items = self.lock()?;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            return Ok(false);
        };
        if !matches!(item.status, ItemStatus::Success | ItemStatus::Failed) {
            return Ok(false);
        }
        item.status = ItemStatus::Idle;
        item.error = None;
        tracing::debug!(id, "item resubmitted");
        Ok(true)
    }

    /// Get all items (cloned snapshot), in queue order.
    pub fn snapshot(&self) -> Vec<Item> {
        self.items.lock().map(|i| i.clone()).unwrap_or_default()
    }

    /// Get a specific item by ID.
    pub fn get(&self, id: &str) -> Option<Item> {
        self.items
            .lock()
            .ok()?
            .iter()
            .find(|i| i.id == id)
            .cloned()
    }

    /// Counters derived from the current contents.
    pub fn stats(&self) -> QueueStats {
        self.items
            .lock()
            .map(|i| QueueStats::from_items(&i))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|i| i.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of inputs the next [`add()`](Self::add) can admit.
    pub fn remaining_capacity(&self) -> usize {
        self.config.max_capacity.saturating_sub(self.len())
    }

    /// Number of items a run would dispatch right now.
    pub fn eligible_count(&self) -> usize {
        self.items
            .lock()
            .map(|i| i.iter().filter(|item| item.status.is_eligible()).count())
            .unwrap_or(0)
    }

    // -- Scheduler-side transitions. All look items up by ID and report
    // `false`/`None` when the item is gone or not in the expected state. --

    /// IDs of all eligible items, in queue order.
    pub(crate) fn eligible_ids(&self) -> Result<Vec<String>, QueueError> {
        let items = self.lock()?;
        Ok(items
            .iter()
            .filter(|i| i.status.is_eligible())
            .map(|i| i.id.clone())
            .collect())
    }

    /// Move an eligible item to `Running` and return what to dispatch.
    pub(crate) fn begin_run(&self, id: &str) -> Result<Option<(Payload, String)>, QueueError> {
        let mut items = self.lock()?;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        if !item.status.can_transition_to(ItemStatus::Running) {
            return Ok(None);
        }

        item.status = ItemStatus::Running;
        item.error = None;
        item.started_at = Some(chrono::Utc::now().to_rfc3339());
        item.finished_at = None;
        Ok(Some((item.payload.clone(), item.media_type.clone())))
    }

    /// Record a successful transformation, replacing any older result.
    pub(crate) fn finish_success(
        &self,
        id: &str,
        output: TransformOutput,
        duration_ms: u64,
    ) -> Result<bool, QueueError> {
        let mut items = self.lock()?;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            return Ok(false);
        };
        if !item.status.can_transition_to(ItemStatus::Success) {
            return Ok(false);
        }

        if let Some(stale) = item.result_handle.take() {
            self.resources.release(&stale);
        }
        let media_type = output
            .media_type
            .unwrap_or_else(|| item.media_type.clone());
        item.result_handle = Some(self.resources.create(output.bytes, &media_type));
        item.status = ItemStatus::Success;
        item.error = None;
        item.duration_ms = Some(duration_ms);
        item.finished_at = Some(chrono::Utc::now().to_rfc3339());
        Ok(true)
    }

    /// Record a failed transformation. Any earlier result handle is kept.
    pub(crate) fn finish_failure(
        &self,
        id: &str,
        message: String,
        duration_ms: u64,
    ) -> Result<bool, QueueError> {
        let mut items = self.lock()?;
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            return Ok(false);
        };
        if !item.status.can_transition_to(ItemStatus::Failed) {
            return Ok(false);
        }

        item.status = ItemStatus::Failed;
        item.error = Some(message);
        item.duration_ms = Some(duration_ms);
        item.finished_at = Some(chrono::Utc::now().to_rfc3339());
        Ok(true)
    }
}
