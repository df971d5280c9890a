//! Packaging of generated artifacts into loadable resources.
//!
//! The packager writes an [`Artifact`](qou_common::Artifact) into the
//! resource directory under its logical name, behind a validated binary
//! header. The runtime reads it back with [`load_resource`] without ever
//! touching the generator.

#![warn(missing_docs)]

pub mod error;
pub mod header;
pub mod loader;
pub mod packager;

pub use error::PackagingError;
pub use loader::load_resource;
pub use packager::{PackagedResource, ResourcePackager};
