//! Client for an Elasticsearch-compatible search index.
//!
//! [`SearchIndexClient`] speaks the index's HTTP/JSON protocol through an
//! [`IndexTransport`], bounding concurrency with a [`ConnectionPool`] and
//! retrying transient failures under a [`RetryPolicy`]. Every request carries
//! a timeout and a cancellation token.

#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod pool;
pub mod query;
pub mod response;
pub mod retry;
pub mod transport;

pub use client::{ClientSettings, SearchIndexClient, COMPLETION_SUGGESTER};
pub use error::IndexError;
pub use pool::ConnectionPool;
pub use query::{SearchOptions, SearchQuery, TermSuggestion, TermsAggregation};
pub use response::{Correction, Facet, FacetValue, IndexAck, IndexDocument, SearchPage};
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, IndexTransport, Method, WireBody, WireRequest, WireResponse};
