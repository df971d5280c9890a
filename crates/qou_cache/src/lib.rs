//! Incremental generation cache.
//!
//! This crate fingerprints the declared inputs of the artifact generator and
//! compares them against the last recorded generation, so the external
//! transformation only runs when its inputs actually changed. Staleness is
//! keyed by content hash rather than modification time, so decisions are
//! stable across checkouts and clones.

#![warn(missing_docs)]

pub mod error;
pub mod guard;
pub mod hasher;
pub mod manifest;

pub use error::CacheError;
pub use guard::{assess, should_regenerate, CacheGuard, Staleness};
pub use hasher::InputSet;
pub use manifest::{GenerationManifest, GenerationRecord};
