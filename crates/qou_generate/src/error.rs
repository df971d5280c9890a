//! Error types for artifact generation.

use std::path::PathBuf;

use qou_cache::CacheError;

/// Errors that abort artifact generation.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The external tool could not be spawned or exited unsuccessfully.
    #[error("`{command}` failed ({}): {stderr}", status_text(.status))]
    ExternalToolFailure {
        /// The command line that was run.
        command: String,
        /// Exit code, or `None` if the process never ran or was killed by a signal.
        status: Option<i32>,
        /// Captured standard error, or the spawn error.
        stderr: String,
    },

    /// The tool succeeded but its declared output is missing or unusable.
    #[error("malformed output at {path}: {reason}")]
    MalformedOutput {
        /// The declared output path.
        path: PathBuf,
        /// Why the output was rejected.
        reason: String,
    },

    /// A declared input could not be read for fingerprinting.
    #[error("cannot fingerprint inputs: {0}")]
    Input(#[from] CacheError),
}

fn status_text(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_string(),
    }
}
