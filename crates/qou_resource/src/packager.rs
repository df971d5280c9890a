//! Writes artifacts into the resource directory.

use std::path::{Path, PathBuf};

use qou_common::{Artifact, ContentHash, PatternTable};
use tracing::info;

use crate::error::PackagingError;
use crate::header::{self, ResourceHeader};

/// A resource written by [`ResourcePackager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedResource {
    /// Where the resource was written.
    pub path: PathBuf,
    /// Logical artifact name.
    pub name: String,
    /// Checksum of the packaged payload.
    pub checksum: ContentHash,
    /// Total bytes written, header included.
    pub size: usize,
}

/// Places artifacts at `<resource_dir>/<logical_name>`.
///
/// A packaged resource is replaced on every run; the previous file is never
/// observed half-written because the bytes go to a sibling temp file first.
pub struct ResourcePackager {
    resource_dir: PathBuf,
    logical_name: String,
    tool_version: String,
}

impl ResourcePackager {
    /// Creates a packager writing `logical_name` into `resource_dir`.
    pub fn new(resource_dir: &Path, logical_name: &str, tool_version: &str) -> Self {
        Self {
            resource_dir: resource_dir.to_path_buf(),
            logical_name: logical_name.to_string(),
            tool_version: tool_version.to_string(),
        }
    }

    /// Returns the path of the packaged resource.
    pub fn resource_path(&self) -> PathBuf {
        self.resource_dir.join(&self.logical_name)
    }

    /// Packages an in-memory artifact.
    pub fn package(&self, artifact: &Artifact) -> Result<PackagedResource, PackagingError> {
        std::fs::create_dir_all(&self.resource_dir).map_err(|e| PackagingError::Io {
            path: self.resource_dir.clone(),
            source: e,
        })?;

        let header = ResourceHeader::for_artifact(artifact);
        let bytes = header::encode(&header, &artifact.payload)?;

        let path = self.resource_path();
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &bytes).map_err(|e| PackagingError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| PackagingError::Io {
            path: path.clone(),
            source: e,
        })?;

        info!(
            artifact = %artifact.name,
            path = %path.display(),
            bytes = bytes.len(),
            "packaged resource"
        );

        Ok(PackagedResource {
            path,
            name: artifact.name.clone(),
            checksum: header.checksum,
            size: bytes.len(),
        })
    }

    /// Packages a generator output file that is already on disk.
    ///
    /// Used when the cache guard reports the artifact fresh and the generator
    /// was skipped. Fails with [`PackagingError::MissingArtifact`] if the file
    /// is absent or empty, and with [`PackagingError::InvalidPayload`] if its
    /// checksum differs from `recorded` or it does not parse as a pattern table.
    pub fn package_output(
        &self,
        output_path: &Path,
        name: &str,
        fingerprint: ContentHash,
        recorded: Option<ContentHash>,
    ) -> Result<PackagedResource, PackagingError> {
        let payload = match std::fs::read(output_path) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                return Err(PackagingError::MissingArtifact {
                    path: output_path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PackagingError::MissingArtifact {
                    path: output_path.to_path_buf(),
                })
            }
            Err(e) => {
                return Err(PackagingError::Io {
                    path: output_path.to_path_buf(),
                    source: e,
                })
            }
        };

        let invalid = |reason: String| PackagingError::InvalidPayload {
            path: output_path.to_path_buf(),
            reason,
        };
        let checksum = ContentHash::from_bytes(&payload);
        if let Some(expected) = recorded.filter(|expected| *expected != checksum) {
            return Err(invalid(format!(
                "content {} differs from generated {}",
                checksum.short(),
                expected.short()
            )));
        }
        PatternTable::from_json(&payload).map_err(|e| invalid(e.to_string()))?;

        let artifact = Artifact {
            name: name.to_string(),
            version: self.tool_version.clone(),
            fingerprint,
            payload,
        };
        self.package(&artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_resource;

    fn sample() -> Artifact {
        Artifact {
            name: "patterns".to_string(),
            version: "0.1.0".to_string(),
            fingerprint: ContentHash::from_bytes(b"inputs"),
            payload: br#"[{"label":"AISLE","pattern":"yogurt"}]"#.to_vec(),
        }
    }

    #[test]
    fn package_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let packager = ResourcePackager::new(dir.path(), "patterns.qou", "0.1.0");
        let a = sample();

        let packaged = packager.package(&a).unwrap();
        assert_eq!(packaged.path, dir.path().join("patterns.qou"));
        assert_eq!(packaged.checksum, a.checksum());

        let loaded = load_resource(dir.path(), "patterns.qou").unwrap();
        assert_eq!(loaded, a);
    }

    #[test]
    fn package_creates_resource_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("src").join("main").join("resources");
        let packager = ResourcePackager::new(&nested, "patterns.qou", "0.1.0");
        packager.package(&sample()).unwrap();
        assert!(nested.join("patterns.qou").exists());
        assert!(!nested.join("patterns.tmp").exists());
    }

    #[test]
    fn repackaging_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let packager = ResourcePackager::new(dir.path(), "patterns.qou", "0.1.0");
        packager.package(&sample()).unwrap();

        let mut updated = sample();
        updated.payload = br#"[{"label":"BRAND","pattern":"chobani"}]"#.to_vec();
        updated.fingerprint = ContentHash::from_bytes(b"new inputs");
        packager.package(&updated).unwrap();

        assert_eq!(load_resource(dir.path(), "patterns.qou").unwrap(), updated);
    }

    #[test]
    fn package_output_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("patterns.json");
        std::fs::write(&output, br#"[{"label":"BRAND","pattern":"fage"}]"#).unwrap();
        let fingerprint = ContentHash::from_bytes(b"fp");

        let packager = ResourcePackager::new(&dir.path().join("res"), "patterns.qou", "0.3.0");
        packager
            .package_output(&output, "patterns", fingerprint, None)
            .unwrap();

        let loaded = load_resource(&dir.path().join("res"), "patterns.qou").unwrap();
        assert_eq!(loaded.name, "patterns");
        assert_eq!(loaded.version, "0.3.0");
        assert_eq!(loaded.fingerprint, fingerprint);
        assert_eq!(loaded.patterns().unwrap().len(), 1);
    }

    #[test]
    fn package_output_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let packager = ResourcePackager::new(dir.path(), "patterns.qou", "0.1.0");
        let err = packager
            .package_output(
                &dir.path().join("patterns.json"),
                "patterns",
                ContentHash::from_bytes(b"fp"),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, PackagingError::MissingArtifact { .. }));
    }

    #[test]
    fn package_output_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("patterns.json");
        std::fs::write(&output, b"").unwrap();
        let packager = ResourcePackager::new(dir.path(), "patterns.qou", "0.1.0");
        let err = packager
            .package_output(&output, "patterns", ContentHash::from_bytes(b"fp"), None)
            .unwrap_err();
        assert!(matches!(err, PackagingError::MissingArtifact { .. }));
    }

    #[test]
    fn package_output_rejects_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("patterns.json");
        std::fs::write(&output, "not json at all").unwrap();
        let packager = ResourcePackager::new(dir.path(), "patterns.qou", "0.1.0");
        let err = packager
            .package_output(&output, "patterns", ContentHash::from_bytes(b"fp"), None)
            .unwrap_err();
        assert!(matches!(err, PackagingError::InvalidPayload { .. }), "{err:?}");
        assert!(!packager.resource_path().exists());
    }

    #[test]
    fn package_output_rejects_file_changed_since_generation() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("patterns.json");
        let generated = br#"[{"label":"BRAND","pattern":"fage"}]"#;
        std::fs::write(&output, br#"[{"label":"BRAND","pattern":"siggi's"}]"#).unwrap();
        let packager = ResourcePackager::new(dir.path(), "patterns.qou", "0.1.0");

        let err = packager
            .package_output(
                &output,
                "patterns",
                ContentHash::from_bytes(b"fp"),
                Some(ContentHash::from_bytes(generated)),
            )
            .unwrap_err();
        assert!(matches!(err, PackagingError::InvalidPayload { .. }), "{err:?}");

        std::fs::write(&output, generated).unwrap();
        packager
            .package_output(
                &output,
                "patterns",
                ContentHash::from_bytes(b"fp"),
                Some(ContentHash::from_bytes(generated)),
            )
            .unwrap();
    }
}
