use super::{ContentStore, ImageEntry, StoreError};
use crate::core::hash::EntryId;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct MemState {
    records: Vec<ImageEntry>,
    blobs: HashMap<EntryId, Vec<u8>>,
}

/// In-memory store backing, used by tests and callers that do not need
/// durability. `persist` is a no-op.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ContentStore for MemoryStore {
    fn contains(&self, id: &EntryId) -> bool {
        self.lock().blobs.contains_key(id)
    }

    fn insert(&self, entry: ImageEntry, bytes: &[u8]) -> Result<bool, StoreError> {
        let mut state = self.lock();
        if state.blobs.contains_key(&entry.id) {
            return Ok(false);
        }
        state.blobs.insert(entry.id.clone(), bytes.to_vec());
        state.records.push(entry);
        Ok(true)
    }

    fn entry(&self, id: &EntryId) -> Option<ImageEntry> {
        self.lock().records.iter().find(|r| r.id == *id).cloned()
    }

    fn entries(&self) -> Vec<ImageEntry> {
        self.lock().records.clone()
    }

    fn read_bytes(&self, id: &EntryId) -> Result<Vec<u8>, StoreError> {
        self.lock()
            .blobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownEntry { id: id.clone() })
    }

    fn remove(&self, id: &EntryId) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.blobs.remove(id).is_some() {
            state.records.retain(|r| r.id != *id);
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanonicalFormat;
    use crate::core::hash::content_hash;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        let bytes = b"blob".to_vec();
        let entry = ImageEntry {
            id: content_hash(&bytes),
            format: CanonicalFormat::Png,
            width: 2,
            height: 2,
        };

        assert!(store.insert(entry.clone(), &bytes).unwrap());
        assert!(!store.insert(entry.clone(), &bytes).unwrap());
        assert_eq!(store.read_bytes(&entry.id).unwrap(), bytes);

        store.remove(&entry.id).unwrap();
        store.remove(&entry.id).unwrap();
        assert!(store.is_empty());
    }
}
