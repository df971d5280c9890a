//! On-disk resource layout.
//!
//! A packaged resource is a 4-byte little-endian header length, a bincode
//! encoded [`ResourceHeader`], then the artifact payload verbatim.

use std::path::Path;

use qou_common::{Artifact, ContentHash};
use serde::{Deserialize, Serialize};

use crate::error::PackagingError;

/// Magic bytes identifying a packaged qou resource.
pub const RESOURCE_MAGIC: [u8; 4] = *b"QOUR";

/// Current resource format version. Increment on breaking changes to the
/// header or payload layout.
pub const RESOURCE_FORMAT_VERSION: u32 = 1;

/// Header prepended to every packaged resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceHeader {
    /// Magic bytes: must be `b"QOUR"`.
    pub magic: [u8; 4],

    /// Resource format version.
    pub format_version: u32,

    /// Logical artifact name.
    pub name: String,

    /// Tool version that produced the artifact.
    pub version: String,

    /// Fingerprint of the inputs the artifact was generated from.
    pub fingerprint: ContentHash,

    /// Content hash of the payload.
    pub checksum: ContentHash,
}

impl ResourceHeader {
    /// Builds the header describing `artifact`.
    pub fn for_artifact(artifact: &Artifact) -> Self {
        Self {
            magic: RESOURCE_MAGIC,
            format_version: RESOURCE_FORMAT_VERSION,
            name: artifact.name.clone(),
            version: artifact.version.clone(),
            fingerprint: artifact.fingerprint,
            checksum: artifact.checksum(),
        }
    }
}

/// Encodes a header and payload into the resource byte layout.
pub fn encode(header: &ResourceHeader, payload: &[u8]) -> Result<Vec<u8>, PackagingError> {
    let header_bytes = bincode::serde::encode_to_vec(header, bincode::config::standard())
        .map_err(|e| PackagingError::Serialization {
            reason: e.to_string(),
        })?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(payload);
    Ok(output)
}

/// Decodes and validates resource bytes read from `path`.
///
/// Fails with [`PackagingError::Corrupt`] if the header is truncated or
/// unreadable, the magic or format version is wrong, or the payload does not
/// match the stored checksum.
pub fn decode(path: &Path, raw: &[u8]) -> Result<Artifact, PackagingError> {
    let corrupt = |reason: String| PackagingError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    if raw.len() < 4 {
        return Err(corrupt("truncated header length".to_string()));
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&raw[..4]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let body = &raw[4..];
    if body.len() < header_len {
        return Err(corrupt(format!(
            "header declares {header_len} bytes, only {} present",
            body.len()
        )));
    }

    let (header, _): (ResourceHeader, usize) =
        bincode::serde::decode_from_slice(&body[..header_len], bincode::config::standard())
            .map_err(|e| corrupt(format!("unreadable header: {e}")))?;

    if header.magic != RESOURCE_MAGIC {
        return Err(corrupt(format!("bad magic {:?}", header.magic)));
    }
    if header.format_version != RESOURCE_FORMAT_VERSION {
        return Err(corrupt(format!(
            "format version {} (expected {RESOURCE_FORMAT_VERSION})",
            header.format_version
        )));
    }

    let payload = &body[header_len..];
    let actual = ContentHash::from_bytes(payload);
    if actual != header.checksum {
        return Err(corrupt(format!(
            "checksum mismatch: expected {}, got {actual}",
            header.checksum
        )));
    }

    Ok(Artifact {
        name: header.name,
        version: header.version,
        fingerprint: header.fingerprint,
        payload: payload.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Artifact {
        Artifact {
            name: "patterns".to_string(),
            version: "0.1.0".to_string(),
            fingerprint: ContentHash::from_bytes(b"inputs"),
            payload: br#"[{"label":"BRAND","pattern":"fage"}]"#.to_vec(),
        }
    }

    fn reason(err: PackagingError) -> String {
        match err {
            PackagingError::Corrupt { reason, .. } => reason,
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let a = sample();
        let bytes = encode(&ResourceHeader::for_artifact(&a), &a.payload).unwrap();
        assert_eq!(decode(Path::new("p.qou"), &bytes).unwrap(), a);
    }

    #[test]
    fn truncated_length_is_corrupt() {
        let err = decode(Path::new("p.qou"), b"QO").unwrap_err();
        assert!(reason(err).contains("truncated"));
    }

    #[test]
    fn header_length_past_end_is_corrupt() {
        let mut bytes = 1000u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"short");
        let err = decode(Path::new("p.qou"), &bytes).unwrap_err();
        assert!(reason(err).contains("header declares"));
    }

    #[test]
    fn wrong_magic_is_corrupt() {
        let a = sample();
        let mut header = ResourceHeader::for_artifact(&a);
        header.magic = *b"ZZZZ";
        let bytes = encode(&header, &a.payload).unwrap();
        let err = decode(Path::new("p.qou"), &bytes).unwrap_err();
        assert!(reason(err).contains("magic"));
    }

    #[test]
    fn wrong_format_version_is_corrupt() {
        let a = sample();
        let mut header = ResourceHeader::for_artifact(&a);
        header.format_version = 999;
        let bytes = encode(&header, &a.payload).unwrap();
        let err = decode(Path::new("p.qou"), &bytes).unwrap_err();
        assert!(reason(err).contains("format version 999"));
    }

    #[test]
    fn tampered_payload_is_corrupt() {
        let a = sample();
        let mut bytes = encode(&ResourceHeader::for_artifact(&a), &a.payload).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = decode(Path::new("p.qou"), &bytes).unwrap_err();
        assert!(reason(err).contains("checksum mismatch"));
    }
}
