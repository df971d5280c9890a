//! Regeneration of derived artifacts from an external transformation.
//!
//! [`ArtifactGenerator`] fingerprints the declared inputs, runs an
//! [`ExternalTransform`] (normally a script launched by [`ProcessTransform`]),
//! then reads and validates the declared output as an entity pattern table.

#![warn(missing_docs)]

pub mod error;
pub mod generator;
pub mod transform;

pub use error::GenerationError;
pub use generator::ArtifactGenerator;
pub use transform::{ExternalTransform, ProcessTransform, TransformOutput};
