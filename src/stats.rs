use serde::{Deserialize, Serialize};

use crate::types::{Item, ItemStatus};

/// Progress counters derived from the queue's current contents.
///
/// Always recomputed from a snapshot; nothing is cached between calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total: usize,
    /// `success + failed`.
    pub completed: usize,
    pub success: usize,
    pub failed: usize,
}

impl QueueStats {
    pub fn from_items(items: &[Item]) -> Self {
        let success = items
            .iter()
            .filter(|i| i.status == ItemStatus::Success)
            .count();
        let failed = items
            .iter()
            .filter(|i| i.status == ItemStatus::Failed)
            .count();

        Self {
            total: items.len(),
            completed: success + failed,
            success,
            failed,
        }
    }

    /// Items not yet in a final state (idle or running).
    pub fn pending(&self) -> usize {
        self.total - self.completed
    }

    /// Fraction of items that have finished, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}
