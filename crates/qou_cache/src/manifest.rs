//! The generation manifest, `<cache_dir>/generation.json`.
//!
//! One [`GenerationRecord`] per artifact name. A record is written after the
//! first successful generation, replaced after each later one, and never
//! deleted.

use std::collections::btree_map::{BTreeMap, Entry};
use std::path::Path;

use chrono::{DateTime, Utc};
use qou_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// File name of the manifest inside the cache directory.
pub const MANIFEST_FILE: &str = "generation.json";

/// The last successful generation of one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Fingerprint of the inputs the artifact was generated from.
    pub fingerprint: ContentHash,
    /// Completion time.
    pub generated_at: DateTime<Utc>,
    /// Version of qou that ran the generation.
    pub tool_version: String,
    /// Content hash of the output file as the generator wrote it. Absent in
    /// manifests written before outputs were tracked.
    #[serde(default)]
    pub output_checksum: Option<ContentHash>,
}

/// All generation records, keyed by artifact name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationManifest {
    /// Records in name order, so the file diffs cleanly.
    pub records: BTreeMap<String, GenerationRecord>,
}

impl GenerationManifest {
    /// An empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the manifest from `cache_dir`.
    ///
    /// `None` when the file is absent or does not parse; the caller then
    /// treats every artifact as never generated.
    pub fn load(cache_dir: &Path) -> Option<Self> {
        std::fs::read(cache_dir.join(MANIFEST_FILE))
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }

    /// Writes the manifest to `cache_dir`, creating the directory.
    pub fn save(&self, cache_dir: &Path) -> Result<(), CacheError> {
        let io = |path: &Path| {
            let path = path.to_path_buf();
            move |source| CacheError::Io { path, source }
        };
        std::fs::create_dir_all(cache_dir).map_err(io(cache_dir))?;
        let json = serde_json::to_vec_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        let path = cache_dir.join(MANIFEST_FILE);
        std::fs::write(&path, json).map_err(io(&path))
    }

    /// The record for `artifact`, if any.
    pub fn get(&self, artifact: &str) -> Option<&GenerationRecord> {
        self.records.get(artifact)
    }

    /// Inserts or replaces the record for `artifact` and returns the stored record.
    pub fn upsert(&mut self, artifact: &str, record: GenerationRecord) -> &GenerationRecord {
        match self.records.entry(artifact.to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(record);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(inputs: &[u8], version: &str) -> GenerationRecord {
        GenerationRecord {
            fingerprint: ContentHash::from_bytes(inputs),
            generated_at: Utc::now(),
            tool_version: version.to_string(),
            output_checksum: Some(ContentHash::from_bytes(b"[]")),
        }
    }

    #[test]
    fn saved_records_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = GenerationManifest::new();
        let patterns = record(b"build_patterns.py", "0.1.0");
        m.upsert("patterns", patterns.clone());
        m.upsert("synonyms", record(b"synonyms.txt", "0.1.0"));
        m.save(dir.path()).unwrap();

        let loaded = GenerationManifest::load(dir.path()).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.get("patterns"), Some(&patterns));
        assert!(loaded.get("stopwords").is_none());
    }

    #[test]
    fn upsert_replaces_the_previous_record() {
        let mut m = GenerationManifest::new();
        m.upsert("patterns", record(b"v1", "0.1.0"));
        m.upsert("patterns", record(b"v2", "0.2.0"));
        assert_eq!(m.records.len(), 1);
        assert_eq!(m.get("patterns").unwrap().tool_version, "0.2.0");
        assert_eq!(
            m.get("patterns").unwrap().fingerprint,
            ContentHash::from_bytes(b"v2")
        );
    }

    #[test]
    fn absent_or_garbled_manifest_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GenerationManifest::load(dir.path()).is_none());
        std::fs::write(dir.path().join(MANIFEST_FILE), r#"{"records": 7}"#).unwrap();
        assert!(GenerationManifest::load(dir.path()).is_none());
    }

    #[test]
    fn record_without_output_checksum_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let fingerprint = serde_json::to_value(ContentHash::from_bytes(b"inputs")).unwrap();
        let json = serde_json::json!({
            "records": {
                "patterns": {
                    "fingerprint": fingerprint,
                    "generated_at": "2026-01-05T10:00:00Z",
                    "tool_version": "0.1.0"
                }
            }
        });
        std::fs::write(dir.path().join(MANIFEST_FILE), json.to_string()).unwrap();

        let loaded = GenerationManifest::load(dir.path()).unwrap();
        assert_eq!(loaded.get("patterns").unwrap().output_checksum, None);
    }

    #[test]
    fn save_creates_missing_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join(".qou-cache").join("nested");
        GenerationManifest::new().save(&cache_dir).unwrap();
        assert!(cache_dir.join(MANIFEST_FILE).is_file());
    }
}
