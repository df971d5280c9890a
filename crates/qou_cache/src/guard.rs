//! Staleness decisions for generated artifacts.
//!
//! [`should_regenerate`] is the pure gate in front of the generator: it
//! fingerprints the declared inputs and compares against the previous
//! [`GenerationRecord`]. [`CacheGuard`] ties that decision to the persisted
//! [`GenerationManifest`] for the build pipeline.

use std::path::{Path, PathBuf};

use chrono::Utc;
use qou_common::{Artifact, ContentHash};
use tracing::debug;

use crate::error::CacheError;
use crate::hasher::{hash_file, InputSet};
use crate::manifest::{GenerationManifest, GenerationRecord};

/// Why an artifact does or does not need regeneration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    /// The inputs match the previous generation; regeneration can be skipped.
    Fresh,
    /// No previous generation is recorded.
    NoRecord,
    /// A declared input could not be read.
    MissingInput(PathBuf),
    /// The inputs changed since the previous generation.
    FingerprintChanged {
        /// Fingerprint stored in the previous record.
        previous: ContentHash,
        /// Fingerprint of the current inputs.
        current: ContentHash,
    },
    /// The inputs are unchanged but the output file no longer holds what the
    /// generator wrote.
    OutputModified(PathBuf),
}

impl Staleness {
    /// Returns `true` unless the artifact is [`Staleness::Fresh`].
    pub fn is_stale(&self) -> bool {
        !matches!(self, Staleness::Fresh)
    }
}

/// Decides whether the inputs differ from the previous generation.
///
/// Reads every input but has no other side effects.
pub fn assess(input_paths: &[PathBuf], previous: Option<&GenerationRecord>) -> Staleness {
    let Some(record) = previous else {
        return Staleness::NoRecord;
    };

    let mut entries = Vec::with_capacity(input_paths.len());
    for path in input_paths {
        match hash_file(path) {
            Ok(hash) => entries.push((path.clone(), hash)),
            Err(_) => return Staleness::MissingInput(path.clone()),
        }
    }

    let current = InputSet::from_entries(entries).fingerprint();
    if current == record.fingerprint {
        Staleness::Fresh
    } else {
        Staleness::FingerprintChanged {
            previous: record.fingerprint,
            current,
        }
    }
}

/// Returns `true` if no record exists, any input is missing, or the
/// fingerprints differ.
pub fn should_regenerate(input_paths: &[PathBuf], previous: Option<&GenerationRecord>) -> bool {
    assess(input_paths, previous).is_stale()
}

/// Manifest-backed staleness gate for the build pipeline.
///
/// All reads are fail-safe: a missing or corrupt manifest, or a record
/// written by a different tool version, makes the artifact stale rather than
/// producing an error.
pub struct CacheGuard {
    /// Directory holding the manifest.
    cache_dir: PathBuf,

    /// Generation records loaded from disk.
    manifest: GenerationManifest,

    /// Version of the running tool, stamped into new records.
    tool_version: String,
}

impl CacheGuard {
    /// Loads an existing manifest or starts with an empty one.
    pub fn load_or_create(cache_dir: &Path, tool_version: &str) -> Self {
        let manifest = GenerationManifest::load(cache_dir).unwrap_or_default();
        Self {
            cache_dir: cache_dir.to_path_buf(),
            manifest,
            tool_version: tool_version.to_string(),
        }
    }

    /// Returns the previous record for `artifact`, ignoring records written
    /// by another tool version.
    pub fn previous_record(&self, artifact: &str) -> Option<&GenerationRecord> {
        self.manifest
            .get(artifact)
            .filter(|r| r.tool_version == self.tool_version)
    }

    /// Assesses whether `artifact` must be regenerated from `inputs`.
    pub fn assess(&self, artifact: &str, inputs: &[PathBuf]) -> Staleness {
        let staleness = assess(inputs, self.previous_record(artifact));
        debug!(artifact, ?staleness, "assessed artifact staleness");
        staleness
    }

    /// Like [`CacheGuard::assess`], but also checks that `output` still holds
    /// the bytes recorded at the last generation.
    ///
    /// A missing output stays [`Staleness::Fresh`] so packaging can report it;
    /// a record without an output checksum cannot be checked and is trusted.
    pub fn assess_output(&self, artifact: &str, inputs: &[PathBuf], output: &Path) -> Staleness {
        let staleness = self.assess(artifact, inputs);
        if staleness.is_stale() {
            return staleness;
        }
        let recorded = self
            .previous_record(artifact)
            .and_then(|r| r.output_checksum);
        match (recorded, hash_file(output)) {
            (Some(expected), Ok(actual)) if expected != actual => {
                debug!(artifact, output = %output.display(), "output changed since generation");
                Staleness::OutputModified(output.to_path_buf())
            }
            _ => Staleness::Fresh,
        }
    }

    /// Returns `true` if `artifact` must be regenerated from `inputs`.
    pub fn should_regenerate(&self, artifact: &str, inputs: &[PathBuf]) -> bool {
        self.assess(artifact, inputs).is_stale()
    }

    /// Records a successful generation, overwriting any previous record.
    pub fn record(&mut self, artifact: &Artifact) -> &GenerationRecord {
        let record = GenerationRecord {
            fingerprint: artifact.fingerprint,
            generated_at: Utc::now(),
            tool_version: self.tool_version.clone(),
            output_checksum: Some(artifact.checksum()),
        };
        self.manifest.upsert(&artifact.name, record)
    }

    /// Persists the manifest to disk.
    pub fn save(&self) -> Result<(), CacheError> {
        self.manifest.save(&self.cache_dir)
    }

    /// Returns a reference to the current manifest.
    pub fn manifest(&self) -> &GenerationManifest {
        &self.manifest
    }
}
