use crate::core::hash::EntryId;
use crate::store::ContentStore;
use image_hasher::{HashAlg, Hasher, HasherConfig, ImageHash};
use rayon::prelude::*;
use std::collections::HashMap;

const GRID_SIZE: u32 = 8;

/// Per-entry perceptual fingerprints, derived only from the canonical
/// stored bytes so identical stored content always yields identical
/// signatures.
///
/// - `structural`: gradient hash, captures local edge structure; robust to
///   recompression and minor color shifts.
/// - `intensity`: mean hash, captures coarse brightness blocks; robust to
///   resampling.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub structural: ImageHash,
    pub intensity: ImageHash,
}

/// Combined distance between two signatures: sum of the per-kind Hamming
/// distances. Lower is more similar.
pub fn combined_distance(a: &Signature, b: &Signature) -> u32 {
    a.structural.dist(&b.structural) + a.intensity.dist(&b.intensity)
}

fn structural_hasher() -> Hasher {
    HasherConfig::new()
        .hash_alg(HashAlg::Gradient)
        .hash_size(GRID_SIZE, GRID_SIZE)
        .to_hasher()
}

fn intensity_hasher() -> Hasher {
    HasherConfig::new()
        .hash_alg(HashAlg::Mean)
        .hash_size(GRID_SIZE, GRID_SIZE)
        .to_hasher()
}

/// Compute both fingerprints for one canonical byte buffer.
pub fn signature_of_bytes(bytes: &[u8]) -> Result<Signature, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    Ok(Signature {
        structural: structural_hasher().hash_image(&img),
        intensity: intensity_hasher().hash_image(&img),
    })
}

/// Session-lifetime cache of signatures keyed by entry identity. Stored
/// bytes never change for a given id, so a cached value is valid for as
/// long as the entry lives. An entry whose bytes cannot be decoded caches
/// `None`: it is excluded from clustering but remains reviewable.
#[derive(Default)]
pub struct SignatureIndex {
    cache: HashMap<EntryId, Option<Signature>>,
}

impl SignatureIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute any missing signatures for `ids` in parallel and cache the
    /// results. Already-cached ids are not recomputed.
    pub fn prime<S: ContentStore>(&mut self, store: &S, ids: &[EntryId]) {
        let missing: Vec<EntryId> = ids
            .iter()
            .filter(|id| !self.cache.contains_key(*id))
            .cloned()
            .collect();
        if missing.is_empty() {
            return;
        }

        let computed: Vec<(EntryId, Option<Signature>)> = missing
            .into_par_iter()
            .map(|id| {
                let signature = match store.read_bytes(&id) {
                    Ok(bytes) => match signature_of_bytes(&bytes) {
                        Ok(sig) => Some(sig),
                        Err(e) => {
                            log::warn!("failed to decode stored bytes for {id}: {e}");
                            None
                        }
                    },
                    Err(e) => {
                        log::warn!("failed to read stored bytes for {id}: {e}");
                        None
                    }
                };
                (id, signature)
            })
            .collect();

        self.cache.extend(computed);
    }

    /// Seed the cache with a precomputed result, e.g. one carried over from
    /// an earlier session. Stored bytes for an id never change, so a
    /// signature computed elsewhere for the same id is still valid.
    pub fn insert(&mut self, id: EntryId, signature: Option<Signature>) {
        self.cache.insert(id, signature);
    }

    pub fn signature_of(&self, id: &EntryId) -> Option<&Signature> {
        self.cache.get(id).and_then(|s| s.as_ref())
    }

    /// Whether a signature has been attempted for this id (even if decoding
    /// failed).
    pub fn is_cached(&self, id: &EntryId) -> bool {
        self.cache.contains_key(id)
    }

    /// Drop the cached signature for a purged entry.
    pub fn evict(&mut self, id: &EntryId) {
        self.cache.remove(id);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CanonicalFormat;
    use crate::core::hash::content_hash;
    use crate::store::{ImageEntry, MemoryStore};
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            // Smooth ramp topping out below 256 so resampling never crosses
            // a wraparound edge.
            let intensity = ((x * 128 / width.max(1)) + (y * 127 / height.max(1))) as u8;
            Rgb([intensity, intensity / 2, 255 - intensity])
        });
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn store_bytes(store: &MemoryStore, bytes: &[u8]) -> EntryId {
        use crate::store::ContentStore;
        let id = content_hash(bytes);
        let entry = ImageEntry {
            id: id.clone(),
            format: CanonicalFormat::Png,
            width: 0,
            height: 0,
        };
        store.insert(entry, bytes).unwrap();
        id
    }

    #[test]
    fn test_identical_bytes_identical_signature() {
        let bytes = gradient_png(64, 64);
        let a = signature_of_bytes(&bytes).unwrap();
        let b = signature_of_bytes(&bytes).unwrap();
        assert_eq!(a, b);
        assert_eq!(combined_distance(&a, &b), 0);
    }

    #[test]
    fn test_resized_copy_stays_close() {
        let original = gradient_png(200, 200);
        let img = image::load_from_memory(&original).unwrap();
        let resized = img.resize(100, 100, image::imageops::FilterType::Lanczos3);
        let mut resized_bytes = Vec::new();
        resized
            .write_to(&mut Cursor::new(&mut resized_bytes), image::ImageFormat::Png)
            .unwrap();

        let a = signature_of_bytes(&original).unwrap();
        let b = signature_of_bytes(&resized_bytes).unwrap();
        assert!(
            combined_distance(&a, &b) <= 10,
            "resized copy drifted too far: {}",
            combined_distance(&a, &b)
        );
    }

    #[test]
    fn test_undecodable_entry_caches_none() {
        let store = MemoryStore::new();
        let id = store_bytes(&store, b"not an image at all");

        let mut index = SignatureIndex::new();
        index.prime(&store, &[id.clone()]);

        assert!(index.is_cached(&id));
        assert!(index.signature_of(&id).is_none());
    }

    #[test]
    fn test_prime_caches_and_reuses() {
        let store = MemoryStore::new();
        let id = store_bytes(&store, &gradient_png(32, 32));

        let mut index = SignatureIndex::new();
        index.prime(&store, &[id.clone()]);
        let first = index.signature_of(&id).cloned().unwrap();

        // Second prime must not disturb the cached value.
        index.prime(&store, &[id.clone()]);
        assert_eq!(index.signature_of(&id), Some(&first));
        assert_eq!(index.len(), 1);
    }
}
