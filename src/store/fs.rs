use super::manifest::Manifest;
use super::{ContentStore, ImageEntry, StoreError};
use crate::config::CanonicalFormat;
use crate::core::hash::EntryId;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Filesystem-backed content store: one canonical-format file per entry in
/// a flat directory, named by content hash, plus a JSON manifest.
pub struct FsStore {
    root: PathBuf,
    manifest_path: PathBuf,
    state: Mutex<Manifest>,
}

impl FsStore {
    /// Open (or create) a store rooted at `root` with its manifest at
    /// `manifest_path`. Verifies bidirectional consistency between the
    /// manifest and the stored files and auto-repairs drift, preferring the
    /// directory's actual contents as ground truth:
    ///
    /// - a manifest record with no backing file is an interrupted removal
    ///   and is dropped;
    /// - a stored file absent from the manifest is re-adopted, in sorted
    ///   filename order so repeated repairs are reproducible.
    pub fn open(root: impl Into<PathBuf>, manifest_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let manifest_path = manifest_path.into();
        fs::create_dir_all(&root)?;

        let mut manifest = Manifest::load(&manifest_path)?;
        let repairs = Self::repair(&root, &mut manifest)?;
        if repairs > 0 {
            log::warn!(
                "manifest repaired: {} record(s) adjusted to match {}",
                repairs,
                root.display()
            );
            manifest.save(&manifest_path)?;
        }

        Ok(Self {
            root,
            manifest_path,
            state: Mutex::new(manifest),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repair(root: &Path, manifest: &mut Manifest) -> Result<usize, StoreError> {
        // Removal deletes bytes before the manifest is rewritten, so a
        // record without backing bytes is always an intended removal.
        let dropped = manifest.retain(|entry| {
            let backed = root.join(entry.file_name()).exists();
            if !backed {
                log::warn!("dropping manifest record with missing bytes: {}", entry.id);
            }
            backed
        });

        let mut adopted = 0;
        let mut orphans: Vec<PathBuf> = Vec::new();
        for dir_entry in fs::read_dir(root)? {
            let path = dir_entry?.path();
            if !path.is_file() {
                continue;
            }
            let format = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(CanonicalFormat::from_extension);
            let unknown = match (format, path.file_stem().and_then(|s| s.to_str())) {
                (Some(_), Some(stem)) => !manifest.contains(&EntryId::from_hex(stem)),
                _ => false,
            };
            if unknown {
                orphans.push(path);
            }
        }
        orphans.sort();

        for path in orphans {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let format = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(CanonicalFormat::from_extension)
                .unwrap_or_default();

            match image::image_dimensions(&path) {
                Ok((width, height)) => {
                    log::warn!("re-adopting stored file missing from manifest: {}", path.display());
                    manifest.push(ImageEntry {
                        id: EntryId::from_hex(stem),
                        format,
                        width,
                        height,
                    });
                    adopted += 1;
                }
                Err(e) => {
                    log::warn!("skipping unreadable stored file {}: {}", path.display(), e);
                }
            }
        }

        Ok(dropped + adopted)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Manifest> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn path_for(&self, entry: &ImageEntry) -> PathBuf {
        self.root.join(entry.file_name())
    }
}

impl ContentStore for FsStore {
    fn contains(&self, id: &EntryId) -> bool {
        self.lock().contains(id)
    }

    fn insert(&self, entry: ImageEntry, bytes: &[u8]) -> Result<bool, StoreError> {
        // Exists-check and write under one lock so two workers racing on
        // the same new content cannot both decide "absent".
        let mut manifest = self.lock();
        if manifest.contains(&entry.id) {
            return Ok(false);
        }
        fs::write(self.path_for(&entry), bytes)?;
        manifest.push(entry);
        Ok(true)
    }

    fn entry(&self, id: &EntryId) -> Option<ImageEntry> {
        self.lock().get(id).cloned()
    }

    fn entries(&self) -> Vec<ImageEntry> {
        self.lock().records().to_vec()
    }

    fn read_bytes(&self, id: &EntryId) -> Result<Vec<u8>, StoreError> {
        let entry = self
            .entry(id)
            .ok_or_else(|| StoreError::UnknownEntry { id: id.clone() })?;
        Ok(fs::read(self.path_for(&entry))?)
    }

    fn remove(&self, id: &EntryId) -> Result<(), StoreError> {
        let mut manifest = self.lock();
        let Some(entry) = manifest.get(id).cloned() else {
            return Ok(());
        };
        match fs::remove_file(self.path_for(&entry)) {
            Ok(()) => {}
            // Already gone counts as removed.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            // Bytes still exist; keep the record so the manifest stays
            // consistent with the directory.
            Err(e) => return Err(StoreError::Io(e)),
        }
        manifest.remove(id);
        Ok(())
    }

    fn persist(&self) -> Result<(), StoreError> {
        self.lock().save(&self.manifest_path)
    }
}
