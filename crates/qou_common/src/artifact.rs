//! The generated artifact passed from the generator to the packager and loader.

use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;
use crate::pattern::{PatternError, PatternTable};

/// A named, versioned blob derived from a set of input files.
///
/// The `fingerprint` is the combined content hash of the inputs the artifact
/// was generated from. An artifact is only valid while that fingerprint
/// matches the current inputs; otherwise it is stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Logical artifact name (e.g. `"patterns"`).
    pub name: String,

    /// Version of the tool that produced the artifact.
    pub version: String,

    /// Fingerprint of the input set the artifact was derived from.
    pub fingerprint: ContentHash,

    /// Raw artifact bytes exactly as generated.
    pub payload: Vec<u8>,
}

impl Artifact {
    /// Returns the checksum of the payload bytes.
    pub fn checksum(&self) -> ContentHash {
        ContentHash::from_bytes(&self.payload)
    }

    /// Parses the payload as an entity pattern table.
    pub fn patterns(&self) -> Result<PatternTable, PatternError> {
        PatternTable::from_json(&self.payload)
    }
}
