//! Repository entries.
//!
//! An entry is what the repository knows about one file at index time.
//! All three fields are computed before the entry is stored, so a reader
//! never sees a length from one version and a fingerprint from another.

use crate::error::{ResyncError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Indexed metadata for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// Last known filesystem modification time.
    pub modified_at: DateTime<Utc>,

    /// Byte length of the content when it was indexed.
    pub length: u64,

    /// Hex MD5 of the content when it was indexed.
    pub fingerprint: String,
}

impl ResourceEntry {
    pub fn new(modified_at: DateTime<Utc>, length: u64, fingerprint: impl Into<String>) -> Self {
        Self {
            modified_at,
            length,
            fingerprint: fingerprint.into(),
        }
    }

    /// Builds an entry from in-memory content.
    pub fn from_bytes(content: &[u8], modified_at: DateTime<Utc>) -> Self {
        Self {
            modified_at,
            length: content.len() as u64,
            fingerprint: fingerprint(content),
        }
    }

    /// Reads and hashes a file.
    ///
    /// Fails with [`ResyncError::MissingSource`] if the file is gone by the
    /// time we get to it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|e| ResyncError::io(path, e))?;
        let modified = metadata.modified().map_err(|e| ResyncError::io(path, e))?;
        let content = fs::read(path).map_err(|e| ResyncError::io(path, e))?;

        Ok(Self::from_bytes(&content, DateTime::<Utc>::from(modified)))
    }
}

/// MD5 of `content`, lowercase hex.
pub fn fingerprint(content: &[u8]) -> String {
    format!("{:x}", md5::compute(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_fingerprint_is_md5_hex() {
        assert_eq!(fingerprint(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(fingerprint(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_from_file_reads_length_and_hash() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "abc").unwrap();

        let entry = ResourceEntry::from_file(&path).unwrap();
        assert_eq!(entry.length, 3);
        assert_eq!(entry.fingerprint, "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_from_file_missing_source() {
        let dir = tempdir().unwrap();
        let err = ResourceEntry::from_file(&dir.path().join("gone.txt")).unwrap_err();
        assert!(matches!(err, ResyncError::MissingSource { .. }));
    }
}
