//! External transformations that write the artifact output file.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::GenerationError;

/// Captured streams of a successful transformation.
#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    /// Standard output of the tool.
    pub stdout: String,
    /// Standard error of the tool.
    pub stderr: String,
}

/// A step that reads the declared inputs and writes the declared output.
pub trait ExternalTransform {
    /// Human-readable description used in logs.
    fn describe(&self) -> String;

    /// Runs the transformation to completion.
    fn run(&self, inputs: &[PathBuf]) -> Result<TransformOutput, GenerationError>;
}

/// Runs a configured command line in the project root.
///
/// The command names its own inputs (e.g. `python3 build_patterns.py`), so
/// the declared input list is only used for fingerprinting. An optional setup
/// command runs first with the same failure semantics.
#[derive(Debug, Clone)]
pub struct ProcessTransform {
    command: Vec<String>,
    setup: Option<Vec<String>>,
    working_dir: PathBuf,
}

impl ProcessTransform {
    /// Creates a transform running `command` inside `working_dir`.
    pub fn new(command: Vec<String>, working_dir: &Path) -> Self {
        Self {
            command,
            setup: None,
            working_dir: working_dir.to_path_buf(),
        }
    }

    /// Adds a setup command run before the main command.
    pub fn with_setup(mut self, setup: Option<Vec<String>>) -> Self {
        self.setup = setup;
        self
    }

    fn run_command(&self, argv: &[String]) -> Result<TransformOutput, GenerationError> {
        let command_line = argv.join(" ");
        let Some((program, args)) = argv.split_first() else {
            return Err(GenerationError::ExternalToolFailure {
                command: command_line,
                status: None,
                stderr: "empty command".to_string(),
            });
        };

        info!(command = %command_line, dir = %self.working_dir.display(), "running external tool");
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .map_err(|e| GenerationError::ExternalToolFailure {
                command: command_line.clone(),
                status: None,
                stderr: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!(command = %command_line, status = ?output.status.code(), "external tool exited");

        if output.status.success() {
            Ok(TransformOutput { stdout, stderr })
        } else {
            Err(GenerationError::ExternalToolFailure {
                command: command_line,
                status: output.status.code(),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

impl ExternalTransform for ProcessTransform {
    fn describe(&self) -> String {
        self.command.join(" ")
    }

    fn run(&self, _inputs: &[PathBuf]) -> Result<TransformOutput, GenerationError> {
        if let Some(setup) = &self.setup {
            self.run_command(setup)?;
        }
        self.run_command(&self.command)
    }
}
