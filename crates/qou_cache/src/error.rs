//! Cache errors.

use std::path::PathBuf;

/// Failures the guard cannot recover from by regenerating.
///
/// Reading the manifest never fails (an unreadable manifest means "no
/// record"); hashing a declared input and persisting the manifest can.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A declared input or the manifest file could not be accessed.
    #[error("cannot access {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest could not be encoded.
    #[error("cannot encode generation manifest: {reason}")]
    Serialization {
        /// Encoder message.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_input() {
        let err = CacheError::Io {
            path: PathBuf::from("scripts/build_patterns.py"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(
            err.to_string(),
            "cannot access scripts/build_patterns.py: no such file"
        );
    }
}
