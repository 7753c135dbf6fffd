pub mod cluster;
pub mod hash;
pub mod signature;

pub use self::cluster::{cluster, ClusterRoster};
pub use self::hash::{content_hash, content_hash_file, EntryId};
pub use self::signature::{combined_distance, Signature, SignatureIndex};
