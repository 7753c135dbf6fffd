use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable identity of a stored image: lowercase hex SHA-256 of the raw
/// source bytes, computed once at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accepts an externally-produced digest string, e.g. a stored filename
    /// stem found during consistency repair.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the content identity of a raw byte sequence.
pub fn content_hash(bytes: &[u8]) -> EntryId {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    EntryId(format!("{:x}", hasher.finalize()))
}

/// Streaming variant for callers that do not need the bytes afterward.
pub fn content_hash_file(path: &Path) -> Result<EntryId, HashError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(EntryId(format!("{:x}", hasher.finalize())))
}
