//! XXH3-128 digests used as input fingerprints and payload checksums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 128-bit XXH3 digest.
///
/// Equal digests are taken to mean equal content. Rendered as 32 lowercase
/// hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Digest of `data`.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(data).to_le_bytes())
    }

    /// Digest of the concatenated digests, in iteration order.
    ///
    /// Swapping two elements changes the result.
    pub fn combine<'a>(hashes: impl IntoIterator<Item = &'a ContentHash>) -> Self {
        let buf: Vec<u8> = hashes.into_iter().flat_map(|h| h.0).collect();
        Self::from_bytes(&buf)
    }

    /// The digest bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// The first 12 hex characters, for progress output.
    pub fn short(&self) -> String {
        self.to_string()[..12].to_string()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_digest() {
        assert_eq!(
            ContentHash::from_bytes(b"spacy==3.7"),
            ContentHash::from_bytes(b"spacy==3.7")
        );
        assert_ne!(
            ContentHash::from_bytes(b"spacy==3.7"),
            ContentHash::from_bytes(b"spacy==3.8")
        );
    }

    #[test]
    fn combine_depends_on_order() {
        let h1 = ContentHash::from_bytes(b"a.txt");
        let h2 = ContentHash::from_bytes(b"b.py");
        assert_ne!(
            ContentHash::combine([&h1, &h2]),
            ContentHash::combine([&h2, &h1])
        );
    }

    #[test]
    fn combine_digests_the_concatenation() {
        let h1 = ContentHash::from_bytes(b"one");
        let h2 = ContentHash::from_bytes(b"two");
        let concat = [h1.as_bytes().as_slice(), h2.as_bytes().as_slice()].concat();
        assert_eq!(
            ContentHash::combine([&h1, &h2]),
            ContentHash::from_bytes(&concat)
        );
        assert_eq!(ContentHash::combine([]), ContentHash::from_bytes(b""));
    }

    #[test]
    fn renders_as_hex() {
        let h = ContentHash::from_bytes(b"patterns.json");
        let hex = h.to_string();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(hex.starts_with(&h.short()));
        assert_eq!(format!("{h:?}"), format!("ContentHash({})", h.short()));
    }
}
