//! Runtime loading of packaged resources.

use std::path::Path;

use qou_common::Artifact;
use tracing::debug;

use crate::error::PackagingError;
use crate::header;

/// Loads the resource `logical_name` from `resource_dir`.
///
/// Fails with [`PackagingError::MissingArtifact`] if the file does not exist
/// and [`PackagingError::Corrupt`] if it fails header or checksum validation.
pub fn load_resource(resource_dir: &Path, logical_name: &str) -> Result<Artifact, PackagingError> {
    let path = resource_dir.join(logical_name);
    let raw = std::fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PackagingError::MissingArtifact { path: path.clone() }
        } else {
            PackagingError::Io {
                path: path.clone(),
                source: e,
            }
        }
    })?;

    let artifact = header::decode(&path, &raw)?;
    debug!(
        artifact = %artifact.name,
        fingerprint = %artifact.fingerprint,
        "loaded packaged resource"
    );
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_resource() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_resource(dir.path(), "patterns.qou").unwrap_err();
        assert!(matches!(err, PackagingError::MissingArtifact { .. }));
    }

    #[test]
    fn garbage_resource_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("patterns.qou"), b"garbage data").unwrap();
        let err = load_resource(dir.path(), "patterns.qou").unwrap_err();
        assert!(matches!(err, PackagingError::Corrupt { .. }));
    }
}
