use crate::config::StoreConfig;
use crate::core::hash::{content_hash_file, EntryId};
use crate::store::{ContentStore, ImageEntry, StoreError};
use anyhow::Context;
use image::imageops::FilterType;
use rayon::prelude::*;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid source path: {path}")]
    InvalidPath { path: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// One source file that could not be ingested. The source is still
/// consumed; the failure is reported in aggregate at batch end.
#[derive(Debug)]
pub struct IngestFailure {
    pub path: PathBuf,
    pub error: anyhow::Error,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    /// Ids newly added to the store, in source order.
    pub stored: Vec<EntryId>,
    /// Sources whose bytes were already in the store.
    pub duplicates: usize,
    /// Files skipped at the boundary for an unrecognized extension.
    pub ignored: usize,
    pub failures: Vec<IngestFailure>,
}

enum Prepared {
    New {
        path: PathBuf,
        entry: ImageEntry,
        bytes: Vec<u8>,
    },
    Duplicate {
        path: PathBuf,
        id: EntryId,
    },
    Failed {
        path: PathBuf,
        error: anyhow::Error,
    },
}

/// Moves source images into a content-addressed store: exact-byte
/// duplicates collapse onto one entry, everything else is normalized
/// (bounded dimensions, canonical lossless encoding) before storage.
///
/// Ingestion is destructive to the source: every recognized file is
/// removed once processed, whether it was stored, already present, or
/// failed to decode.
pub struct Ingestor<'a, S: ContentStore> {
    store: &'a S,
    config: &'a StoreConfig,
}

impl<'a, S: ContentStore> Ingestor<'a, S> {
    pub fn new(store: &'a S, config: &'a StoreConfig) -> Self {
        Self { store, config }
    }

    /// Walk `root`, ingest every file on the extension allow-list, remove
    /// consumed sources and any subdirectories left empty, then persist the
    /// manifest. A missing root is an empty batch, not an error.
    pub fn ingest_tree(&self, root: &Path) -> Result<IngestReport, IngestError> {
        if !root.exists() {
            log::info!("source directory {} does not exist, nothing to ingest", root.display());
            return Ok(IngestReport::default());
        }
        if !root.is_dir() {
            return Err(IngestError::InvalidPath {
                path: root.to_string_lossy().to_string(),
            });
        }

        let mut sources = Vec::new();
        let mut ignored = 0;
        for entry in WalkDir::new(root).follow_links(false).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let allowed = path
                .extension()
                .map(|ext| self.config.is_allowed_extension(&ext.to_string_lossy()))
                .unwrap_or(false);
            if allowed {
                sources.push(path.to_path_buf());
            } else {
                ignored += 1;
            }
        }

        let mut report = self.ingest_files(&sources)?;
        report.ignored += ignored;

        self.sweep_empty_dirs(root);
        Ok(report)
    }

    /// Ingest an explicit list of source files. Per-file decode/hash/
    /// resize/encode runs on the rayon pool; insertion into the store is
    /// serialized by the store itself. The manifest is persisted once,
    /// after the whole batch.
    pub fn ingest_files(&self, paths: &[PathBuf]) -> Result<IngestReport, IngestError> {
        let prepared: Vec<Prepared> = paths
            .par_iter()
            .map(|path| self.prepare(path))
            .collect();

        let mut report = IngestReport::default();
        for item in prepared {
            let source = match item {
                Prepared::New { path, entry, bytes } => {
                    let id = entry.id.clone();
                    match self.store.insert(entry, &bytes) {
                        // Lost the race against an identical file in the
                        // same batch: still a duplicate.
                        Ok(false) => report.duplicates += 1,
                        Ok(true) => report.stored.push(id),
                        Err(e) => {
                            log::warn!("failed to store {}: {}", path.display(), e);
                            report.failures.push(IngestFailure {
                                path: path.clone(),
                                error: anyhow::Error::new(e),
                            });
                        }
                    }
                    path
                }
                Prepared::Duplicate { path, id } => {
                    log::debug!("{} already stored as {}", path.display(), id);
                    report.duplicates += 1;
                    path
                }
                Prepared::Failed { path, error } => {
                    log::warn!("failed to ingest {}: {:#}", path.display(), error);
                    report.failures.push(IngestFailure {
                        path: path.clone(),
                        error,
                    });
                    path
                }
            };

            // Move semantics: the source is consumed in every outcome.
            if let Err(e) = fs::remove_file(&source) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("failed to remove source {}: {}", source.display(), e);
                }
            }
        }

        self.store.persist()?;
        log::info!(
            "ingest complete: {} stored, {} duplicates, {} failed, {} live entries",
            report.stored.len(),
            report.duplicates,
            report.failures.len(),
            self.store.len()
        );
        Ok(report)
    }

    fn prepare(&self, path: &Path) -> Prepared {
        // Identity comes from the raw source bytes. Hashing streams the
        // file, so a byte-identical source short-circuits before it is
        // ever held in memory or decoded.
        let id = match content_hash_file(path)
            .with_context(|| format!("failed to hash {}", path.display()))
        {
            Ok(id) => id,
            Err(error) => return Prepared::Failed { path: path.to_path_buf(), error },
        };
        if self.store.contains(&id) {
            return Prepared::Duplicate { path: path.to_path_buf(), id };
        }

        let bytes = match fs::read(path).with_context(|| format!("failed to read {}", path.display())) {
            Ok(bytes) => bytes,
            Err(error) => return Prepared::Failed { path: path.to_path_buf(), error },
        };

        match self.normalize(&id, &bytes) {
            Ok((entry, encoded)) => Prepared::New {
                path: path.to_path_buf(),
                entry,
                bytes: encoded,
            },
            Err(error) => Prepared::Failed { path: path.to_path_buf(), error },
        }
    }

    /// Decode, bound dimensions (aspect preserved, never upscaled), and
    /// re-encode into the canonical storage format.
    fn normalize(&self, id: &EntryId, bytes: &[u8]) -> anyhow::Result<(ImageEntry, Vec<u8>)> {
        let img = image::load_from_memory(bytes).context("failed to decode image")?;

        let max = self.config.max_dimension;
        let img = if img.width() > max || img.height() > max {
            img.resize(max, max, FilterType::Lanczos3)
        } else {
            img
        };

        let format = self.config.canonical_format;
        let mut encoded = Vec::new();
        img.write_to(&mut Cursor::new(&mut encoded), format.image_format())
            .context("failed to encode canonical image")?;

        Ok((
            ImageEntry {
                id: id.clone(),
                format,
                width: img.width(),
                height: img.height(),
            },
            encoded,
        ))
    }

    /// Remove subdirectories left empty after their contents were consumed.
    /// Bottom-up so nested empties collapse in one pass; the root itself is
    /// kept.
    fn sweep_empty_dirs(&self, root: &Path) {
        for entry in WalkDir::new(root)
            .contents_first(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path == root || !path.is_dir() {
                continue;
            }
            let is_empty = fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(false);
            if is_empty {
                if let Err(e) = fs::remove_dir(path) {
                    log::warn!("failed to remove empty directory {}: {}", path.display(), e);
                }
            }
        }
    }
}
