//! Search requests in the index's query DSL.

use serde_json::{json, Map, Value};

/// A terms aggregation that becomes a facet in the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermsAggregation {
    /// Aggregation name, e.g. `by_category`.
    pub name: String,
    /// Keyword field to bucket on.
    pub field: String,
    /// Maximum number of buckets.
    pub size: usize,
}

impl TermsAggregation {
    /// Creates a terms aggregation.
    pub fn new(name: &str, field: &str, size: usize) -> Self {
        Self {
            name: name.to_string(),
            field: field.to_string(),
            size,
        }
    }
}

/// A term suggester used for "did you mean" corrections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermSuggestion {
    /// Suggester name, e.g. `spell-check`.
    pub name: String,
    /// Text to correct.
    pub text: String,
    /// Field whose terms are used as candidates.
    pub field: String,
}

/// A search: the query clause plus optional aggregations and suggester.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// The `query` clause, e.g. a `bool` query.
    pub query: Value,
    /// Terms aggregations requested alongside the hits.
    pub aggregations: Vec<TermsAggregation>,
    /// Optional term suggester.
    pub suggestion: Option<TermSuggestion>,
}

impl SearchQuery {
    /// A query without aggregations or suggestions.
    pub fn new(query: Value) -> Self {
        Self {
            query,
            aggregations: Vec::new(),
            suggestion: None,
        }
    }

    /// Adds a terms aggregation.
    pub fn with_aggregation(mut self, aggregation: TermsAggregation) -> Self {
        self.aggregations.push(aggregation);
        self
    }

    /// Sets the term suggester.
    pub fn with_suggestion(mut self, suggestion: TermSuggestion) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    /// Renders the `_search` body for one page.
    ///
    /// Aggregations and suggestions are only rendered when `with_extras` is
    /// set; follow-up pages of a stream do not need them.
    pub fn to_body(&self, from: usize, size: usize, with_extras: bool) -> Value {
        let mut body = Map::new();
        body.insert("from".to_string(), json!(from));
        body.insert("size".to_string(), json!(size));
        body.insert("query".to_string(), self.query.clone());

        if with_extras && !self.aggregations.is_empty() {
            let aggs: Map<String, Value> = self
                .aggregations
                .iter()
                .map(|a| {
                    (
                        a.name.clone(),
                        json!({ "terms": { "field": a.field, "size": a.size } }),
                    )
                })
                .collect();
            body.insert("aggs".to_string(), Value::Object(aggs));
        }

        if let Some(s) = self.suggestion.as_ref().filter(|_| with_extras) {
            body.insert(
                "suggest".to_string(),
                json!({ s.name.clone(): { "text": s.text, "term": { "field": s.field } } }),
            );
        }

        Value::Object(body)
    }
}

/// Where to search and how much to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Index name.
    pub index: String,
    /// Maximum number of documents a stream yields.
    pub limit: usize,
    /// Documents requested per page.
    pub page_size: usize,
}

impl SearchOptions {
    /// Options for `index` with a limit of 100 and pages of 25.
    pub fn new(index: &str) -> Self {
        Self {
            index: index.to_string(),
            limit: 100,
            page_size: 25,
        }
    }

    /// Sets the stream limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the page size; values below 1 are raised to 1.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}
