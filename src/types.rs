use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::resource::ResourceHandle;

/// Processing status of a single item.
///
/// `Idle -> Running -> {Success, Failed}`, and `Failed -> Running` when the
/// item is picked up again. Only `Idle` and `Failed` items are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemStatus {
    Idle,
    Running,
    Success,
    Failed,
}

impl ItemStatus {
    /// Whether a run may dispatch an item in this status.
    pub fn is_eligible(self) -> bool {
        matches!(self, ItemStatus::Idle | ItemStatus::Failed)
    }

    /// Transitions the scheduler is allowed to make.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Idle, Running) | (Failed, Running) | (Running, Success) | (Running, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Idle => "idle",
            ItemStatus::Running => "running",
            ItemStatus::Success => "success",
            ItemStatus::Failed => "failed",
        }
    }
}

/// Source bytes of an item, either held in memory or read from disk at dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Bytes(Arc<[u8]>),
    File(PathBuf),
}

impl Payload {
    /// In-memory bytes, if the payload is not file-backed.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Bytes(bytes) => Some(&bytes[..]),
            Payload::File(_) => None,
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes.into())
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.into())
    }
}

impl From<Arc<[u8]>> for Payload {
    fn from(bytes: Arc<[u8]>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<PathBuf> for Payload {
    fn from(path: PathBuf) -> Self {
        Payload::File(path)
    }
}

/// Guess an image media type from a file extension.
pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// A raw input handed to [`ItemQueue::add`](crate::ItemQueue::add).
#[derive(Debug, Clone)]
pub struct Input {
    pub payload: Payload,
    pub media_type: String,
}

impl Input {
    pub fn new(payload: impl Into<Payload>, media_type: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            media_type: media_type.into(),
        }
    }

    /// File-backed input; the media type is inferred from the extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let media_type = media_type_for_path(&path).to_string();
        Self {
            payload: Payload::File(path),
            media_type,
        }
    }
}

/// A single unit of work and its processing state.
///
/// Values returned by the queue are snapshots; changing them does not
/// affect the queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique identifier, assigned at creation.
    pub id: String,
    /// Original input. Never modified after creation.
    #[serde(skip)]
    pub payload: Payload,
    /// Format of the payload (e.g. `image/png`).
    pub media_type: String,
    /// Current processing status.
    pub status: ItemStatus,
    /// Preview handle for the original payload.
    pub original_handle: ResourceHandle,
    /// Handle for the most recent successful output.
    pub result_handle: Option<ResourceHandle>,
    /// Failure message, present only while the item is Failed.
    pub error: Option<String>,
    /// Duration of the last external call in milliseconds.
    pub duration_ms: Option<u64>,
    /// RFC 3339 timestamp when the item was added.
    pub added_at: String,
    /// RFC 3339 timestamp when the last run of this item started.
    pub started_at: Option<String>,
    /// RFC 3339 timestamp when the last run of this item finished.
    pub finished_at: Option<String>,
}

/// Output of the external transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub bytes: Vec<u8>,
    /// Media type of `bytes`; `None` means "same as the input".
    pub media_type: Option<String>,
}

impl TransformOutput {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            media_type: None,
        }
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }
}

/// Result of [`ItemQueue::add`](crate::ItemQueue::add).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOutcome {
    pub admitted: usize,
    pub rejected: usize,
    /// IDs of the admitted items, in input order.
    pub admitted_ids: Vec<String>,
}

impl AddOutcome {
    /// Some inputs were dropped because the queue was full.
    pub fn capacity_exceeded(&self) -> bool {
        self.rejected > 0
    }
}

/// Summary of a single scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Items dispatched to the transformation.
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Results discarded because their item was removed mid-flight.
    pub dropped: usize,
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility() {
        assert!(ItemStatus::Idle.is_eligible());
        assert!(ItemStatus::Failed.is_eligible());
        assert!(!ItemStatus::Running.is_eligible());
        assert!(!ItemStatus::Success.is_eligible());
    }

    #[test]
    fn test_transitions() {
        assert!(ItemStatus::Idle.can_transition_to(ItemStatus::Running));
        assert!(ItemStatus::Failed.can_transition_to(ItemStatus::Running));
        assert!(ItemStatus::Running.can_transition_to(ItemStatus::Success));
        assert!(ItemStatus::Running.can_transition_to(ItemStatus::Failed));

        assert!(!ItemStatus::Success.can_transition_to(ItemStatus::Running));
        assert!(!ItemStatus::Idle.can_transition_to(ItemStatus::Success));
        assert!(!ItemStatus::Running.can_transition_to(ItemStatus::Running));
    }

    #[test]
    fn test_media_type_for_path() {
        assert_eq!(media_type_for_path(Path::new("a/cat.PNG")), "image/png");
        assert_eq!(media_type_for_path(Path::new("dog.jpeg")), "image/jpeg");
        assert_eq!(media_type_for_path(Path::new("dog.jpg")), "image/jpeg");
        assert_eq!(media_type_for_path(Path::new("x.webp")), "image/webp");
        assert_eq!(
            media_type_for_path(Path::new("notes")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_input_from_path() {
        let input = Input::from_path("photos/beach.jpg");
        assert_eq!(input.media_type, "image/jpeg");
        assert_eq!(input.payload, Payload::File(PathBuf::from("photos/beach.jpg")));
        assert!(input.payload.as_bytes().is_none());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ItemStatus::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
        assert_eq!(ItemStatus::Running.as_str(), "running");
    }

    #[test]
    fn test_status_label_outlives_status() {
        let label: &'static str = {
            let status = ItemStatus::Success;
            status.as_str()
        };
        assert_eq!(label, "success");
    }

    #[test]
    fn test_transform_output_media_type() {
        let out = TransformOutput::new(vec![1, 2]);
        assert!(out.media_type.is_none());
        let out = out.with_media_type("image/webp");
        assert_eq!(out.media_type.as_deref(), Some("image/webp"));
    }
}
