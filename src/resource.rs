use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::types::Payload;

/// Opaque reference to a payload held by a [`ResourceStore`].
///
/// Handles are plain identifiers; cloning one does not keep the payload alive.
/// Once released, [`ResourceStore::resolve`] returns `None` for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    fn generate() -> Self {
        Self(format!("resource:{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload and media type behind a live handle.
///
/// File-backed payloads are referenced, not read; the display layer loads
/// them itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub payload: Payload,
    pub media_type: String,
}

/// Creates and releases the preview/output resources owned by queue items.
///
/// Release is idempotent: releasing an unknown or already-released handle is
/// a no-op.
pub struct ResourceStore {
    entries: Mutex<HashMap<ResourceHandle, Resource>>,
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a payload and hand back a fresh handle for it.
    pub fn create(&self, payload: impl Into<Payload>, media_type: &str) -> ResourceHandle {
        let handle = ResourceHandle::generate();
        let resource = Resource {
            payload: payload.into(),
            media_type: media_type.to_string(),
        };

        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(handle.clone(), resource);
            }
            Err(e) => {
                // Entries are inserted and removed whole, so a poisoned map is still consistent.
                tracing::error!(error = %e, "resource store mutex poisoned");
                e.into_inner().insert(handle.clone(), resource);
            }
        }

        tracing::debug!(%handle, media_type, "resource created");
        handle
    }

    /// Free the payload behind `handle`. Returns `true` if something was freed.
    pub fn release(&self, handle: &ResourceHandle) -> bool {
        let removed = match self.entries.lock() {
            Ok(mut entries) => entries.remove(handle),
            Err(e) => e.into_inner().remove(handle),
        };
        if removed.is_some() {
            tracing::debug!(%handle, "resource released");
            true
        } else {
            false
        }
    }

    /// Look up the payload behind a live handle.
    pub fn resolve(&self, handle: &ResourceHandle) -> Option<Resource> {
        self.entries.lock().ok()?.get(handle).cloned()
    }

    pub fn contains(&self, handle: &ResourceHandle) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains_key(handle))
            .unwrap_or(false)
    }

    /// Number of handles that have been created and not yet released.
    pub fn live_count(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_resolve() {
        let store = ResourceStore::new();
        let handle = store.create(vec![1u8, 2, 3], "image/png");

        let resource = store.resolve(&handle).unwrap();
        assert_eq!(resource.payload.as_bytes(), Some(&[1u8, 2, 3][..]));
        assert_eq!(resource.media_type, "image/png");
        assert_eq!(store.live_count(), 1);
    }

    #[test]
    fn test_handles_are_unique() {
        let store = ResourceStore::new();
        let a = store.create(vec![0u8], "image/png");
        let b = store.create(vec![0u8], "image/png");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("resource:"));
    }

    #[test]
    fn test_release_is_idempotent() {
        let store = ResourceStore::new();
        let handle = store.create(vec![9u8; 16], "image/jpeg");

        assert!(store.release(&handle));
        assert!(!store.contains(&handle));
        assert!(store.resolve(&handle).is_none());

        // Second release and unknown handles are no-ops
        assert!(!store.release(&handle));
        assert!(!store.release(&ResourceHandle("resource:unknown".into())));
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_file_payload_is_referenced() {
        let store = ResourceStore::new();
        let path = std::path::PathBuf::from("photos/cat.png");
        let handle = store.create(path.clone(), "image/png");

        let resource = store.resolve(&handle).unwrap();
        assert_eq!(resource.payload, Payload::File(path));
    }

    #[test]
    fn test_handle_serializes_as_string() {
        let handle = ResourceHandle("resource:abc".into());
        assert_eq!(serde_json::to_string(&handle).unwrap(), "\"resource:abc\"");
    }
}
