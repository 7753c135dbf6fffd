//! Content-addressed image store with perceptual duplicate review.
//!
//! Raw downloads flow one way through the crate: [`ingest::Ingestor`] moves
//! them into a [`store::ContentStore`] (exact-byte dedupe, bounded
//! dimensions, canonical lossless encoding), [`core::SignatureIndex`]
//! fingerprints the stored entries, the clusterer in [`mod@core::cluster`]
//! groups near-duplicates for a human to review, and
//! [`session::ReviewSession`] applies the
//! resulting deletions back against the store and its manifest. No UI lives
//! here; a frontend drives the session and renders its rosters.

pub mod config;
pub mod core;
pub mod ingest;
pub mod session;
pub mod store;

pub use self::config::{CanonicalFormat, StoreConfig};
pub use self::core::{ClusterRoster, EntryId, Signature, SignatureIndex};
pub use self::ingest::{IngestReport, Ingestor};
pub use self::session::{PurgeReport, ReviewSession, SessionState};
pub use self::store::{ContentStore, FsStore, ImageEntry, MemoryStore};
