//! Error types for packaging and loading resources.

use std::path::PathBuf;

/// Errors that can occur while packaging or loading a resource.
#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    /// The artifact to package, or the packaged resource to load, does not exist.
    #[error("artifact missing at {path}")]
    MissingArtifact {
        /// The path that was expected to hold the artifact.
        path: PathBuf,
    },

    /// The generator output on disk is not a usable pattern table, or is not
    /// the output that was recorded at generation time.
    #[error("refusing to package {path}: {reason}")]
    InvalidPayload {
        /// The output file that was rejected.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// An I/O error occurred while reading or writing the resource.
    #[error("resource I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The packaged resource failed validation.
    #[error("corrupt resource {path}: {reason}")]
    Corrupt {
        /// The resource file path.
        path: PathBuf,
        /// Which check failed.
        reason: String,
    },

    /// The resource header could not be encoded.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}
