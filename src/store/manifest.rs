use super::{ImageEntry, StoreError};
use crate::core::hash::EntryId;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Ordered set of live entries. Order is insertion order and is preserved
/// across save/load round trips.
#[derive(Debug, Default)]
pub struct Manifest {
    records: Vec<ImageEntry>,
    index: HashSet<EntryId>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the manifest from disk. A missing file is an empty collection,
    /// not an error (first run).
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = fs::read(path)?;
        let records: Vec<ImageEntry> = serde_json::from_slice(&data)?;
        let index = records.iter().map(|r| r.id.clone()).collect();
        Ok(Self { records, index })
    }

    /// Rewrite the manifest atomically: serialize to a temp file in the
    /// same directory, then rename over the target.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, &self.records)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.index.contains(id)
    }

    pub fn get(&self, id: &EntryId) -> Option<&ImageEntry> {
        self.records.iter().find(|r| r.id == *id)
    }

    /// Append a record. Returns false if the id is already present.
    pub fn push(&mut self, entry: ImageEntry) -> bool {
        if !self.index.insert(entry.id.clone()) {
            return false;
        }
        self.records.push(entry);
        true
    }

    /// Drop a record. Returns false if the id was not present.
    pub fn remove(&mut self, id: &EntryId) -> bool {
        if !self.index.remove(id) {
            return false;
        }
        self.records.retain(|r| r.id != *id);
        true
    }

    /// Drop every record for which `keep` returns false, returning the
    /// number dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&ImageEntry) -> bool) -> usize {
        let before = self.records.len();
        self.records.retain(|r| keep(r));
        self.index = self.records.iter().map(|r| r.id.clone()).collect();
        before - self.records.len()
    }

    pub fn records(&self) -> &[ImageEntry] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
