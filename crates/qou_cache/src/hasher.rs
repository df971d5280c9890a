//! Input file hashing and fingerprinting.
//!
//! An [`InputSet`] is an immutable snapshot of the generator's declared
//! inputs: each path paired with the content hash of its bytes, in declared
//! order. Its fingerprint is the order-sensitive combination of those hashes.

use std::path::{Path, PathBuf};

use qou_common::ContentHash;

use crate::error::CacheError;

/// An ordered snapshot of `(path, content hash)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSet {
    entries: Vec<(PathBuf, ContentHash)>,
}

impl InputSet {
    /// Reads and hashes every path, in order.
    ///
    /// Fails with [`CacheError::Io`] on the first input that cannot be read.
    pub fn snapshot(paths: &[PathBuf]) -> Result<Self, CacheError> {
        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            entries.push((path.clone(), hash_file(path)?));
        }
        Ok(Self { entries })
    }

    /// Builds an input set from already computed hashes.
    pub fn from_entries(entries: Vec<(PathBuf, ContentHash)>) -> Self {
        Self { entries }
    }

    /// Returns the combined fingerprint of all inputs.
    pub fn fingerprint(&self) -> ContentHash {
        ContentHash::combine(self.entries.iter().map(|(_, hash)| hash))
    }

    /// Returns the `(path, hash)` pairs in declared order.
    pub fn entries(&self) -> &[(PathBuf, ContentHash)] {
        &self.entries
    }

    /// Returns the number of inputs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the set has no inputs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Computes the content hash of a single file.
pub fn hash_file(path: &Path) -> Result<ContentHash, CacheError> {
    let content = std::fs::read(path).map_err(|e| CacheError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(ContentHash::from_bytes(&content))
}
