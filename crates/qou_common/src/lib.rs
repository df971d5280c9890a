//! Shared foundational types for the qou pipeline.
//!
//! This crate provides content hashing for fingerprints, the generated
//! [`Artifact`] value passed between build stages, and the entity
//! [`PatternTable`] that the artifact carries.

#![warn(missing_docs)]

pub mod artifact;
pub mod hash;
pub mod pattern;

pub use artifact::Artifact;
pub use hash::ContentHash;
pub use pattern::{EntityLabel, PatternError, PatternRule, PatternTable};
