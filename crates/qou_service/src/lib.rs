//! Query understanding over the packaged pattern artifact.
//!
//! Raw search terms are normalized ([`normalize`]), tagged with entities from
//! the artifact's pattern rules ([`entities`]) and rewritten into the index's
//! query DSL ([`rewrite`]). [`SearchService`] ties this to a
//! [`SearchIndexClient`](qou_index::SearchIndexClient) and tracks whether the
//! artifact is available ([`lifecycle`]). [`seed`] populates the indices the
//! service reads.

pub mod entities;
pub mod facade;
pub mod lifecycle;
pub mod normalize;
pub mod rewrite;
pub mod seed;

#[cfg(test)]
mod testing;

pub use entities::{Entity, PatternMatcher};
pub use facade::{
    Explanation, FacetedMatches, LookupError, Match, SearchService, ServiceSettings,
};
pub use lifecycle::{InvalidTransition, Lifecycle, ServiceState};
pub use normalize::normalize;
pub use rewrite::UnderstoodQuery;
pub use seed::{Product, SeedError, SeedReport, Seeder};
