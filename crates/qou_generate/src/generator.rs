//! Artifact generation from declared inputs to a validated pattern table.

use std::path::{Path, PathBuf};

use qou_cache::InputSet;
use qou_common::{Artifact, PatternTable};
use tracing::{debug, info};

use crate::error::GenerationError;
use crate::transform::ExternalTransform;

/// Produces an [`Artifact`] by running a transformation over declared inputs.
pub struct ArtifactGenerator<T> {
    transform: T,
    name: String,
    output: PathBuf,
    tool_version: String,
}

impl<T: ExternalTransform> ArtifactGenerator<T> {
    /// Creates a generator that expects `transform` to write `output`.
    pub fn new(transform: T, name: &str, output: &Path, tool_version: &str) -> Self {
        Self {
            transform,
            name: name.to_string(),
            output: output.to_path_buf(),
            tool_version: tool_version.to_string(),
        }
    }

    /// Returns the declared output path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Runs the transformation and returns the artifact it produced.
    ///
    /// The inputs are fingerprinted before the tool runs, so the artifact is
    /// tied to the inputs the tool actually saw. Any previous output is
    /// removed first, so a tool that exits cleanly without writing fails with
    /// [`GenerationError::MalformedOutput`]. The payload is the output file's
    /// bytes exactly as written.
    pub fn generate(&self, input_paths: &[PathBuf]) -> Result<Artifact, GenerationError> {
        let fingerprint = InputSet::snapshot(input_paths)?.fingerprint();
        info!(
            artifact = %self.name,
            tool = %self.transform.describe(),
            inputs = input_paths.len(),
            %fingerprint,
            "generating artifact"
        );

        self.discard_previous_output()?;
        self.transform.run(input_paths)?;

        let payload = std::fs::read(&self.output).map_err(|e| GenerationError::MalformedOutput {
            path: self.output.clone(),
            reason: format!("output not readable: {e}"),
        })?;
        let table =
            PatternTable::from_json(&payload).map_err(|e| GenerationError::MalformedOutput {
                path: self.output.clone(),
                reason: e.to_string(),
            })?;
        info!(artifact = %self.name, patterns = table.len(), "artifact generated");

        Ok(Artifact {
            name: self.name.clone(),
            version: self.tool_version.clone(),
            fingerprint,
            payload,
        })
    }

    fn discard_previous_output(&self) -> Result<(), GenerationError> {
        match std::fs::remove_file(&self.output) {
            Ok(()) => {
                debug!(path = %self.output.display(), "removed previous output");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GenerationError::MalformedOutput {
                path: self.output.clone(),
                reason: format!("cannot remove previous output: {e}"),
            }),
        }
    }
}
