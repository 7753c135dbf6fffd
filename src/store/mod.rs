pub mod fs;
pub mod manifest;
pub mod memory;

pub use self::fs::FsStore;
pub use self::memory::MemoryStore;

use crate::config::CanonicalFormat;
use crate::core::hash::EntryId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No stored entry for id {id}")]
    UnknownEntry { id: EntryId },
}

/// One live image in the collection. Created at first ingestion of a byte
/// sequence, never mutated, destroyed only by an explicit purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub id: EntryId,
    pub format: CanonicalFormat,
    pub width: u32,
    pub height: u32,
}

impl ImageEntry {
    /// Deterministic flat file name for the canonical bytes.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.format.extension())
    }
}

/// Content-addressed backing for canonical image bytes plus the manifest of
/// live entries. The manifest is the single source of truth for what
/// exists; implementations keep it bidirectionally consistent with stored
/// bytes after every mutation batch.
///
/// `insert` serializes its exists-check and write internally so parallel
/// ingest workers cannot double-write the same new content.
pub trait ContentStore: Send + Sync {
    fn contains(&self, id: &EntryId) -> bool;

    /// Store canonical bytes under the entry's id and append the entry to
    /// the manifest. Returns `false` (and stores nothing) when the id is
    /// already present.
    fn insert(&self, entry: ImageEntry, bytes: &[u8]) -> Result<bool, StoreError>;

    fn entry(&self, id: &EntryId) -> Option<ImageEntry>;

    /// All live entries in manifest insertion order, reproducible across
    /// runs for a given manifest state.
    fn entries(&self) -> Vec<ImageEntry>;

    fn read_bytes(&self, id: &EntryId) -> Result<Vec<u8>, StoreError>;

    /// Delete stored bytes and drop the manifest record, in memory only.
    /// Idempotent: removing an unknown id is a no-op. Callers persist the
    /// manifest once per mutation batch via [`ContentStore::persist`].
    fn remove(&self, id: &EntryId) -> Result<(), StoreError>;

    /// Atomically rewrite the durable manifest to match in-memory state.
    fn persist(&self) -> Result<(), StoreError>;

    fn ids(&self) -> Vec<EntryId> {
        self.entries().into_iter().map(|e| e.id).collect()
    }

    fn len(&self) -> usize {
        self.entries().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
