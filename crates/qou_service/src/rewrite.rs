//! Rewriting an understood query into the index's query DSL.

use qou_common::EntityLabel;
use qou_index::{SearchQuery, TermSuggestion, TermsAggregation};
use serde::Serialize;
use serde_json::{json, Value};

use crate::entities::{Entity, PatternMatcher};
use crate::normalize::normalize;

/// Words dropped from the residual text.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "the", "in", "on", "for", "from", "i", "me", "show", "find", "get", "some",
    "items", "products", "aisle",
];

/// Aggregation bucketing matches by category.
pub const CATEGORY_AGGREGATION: &str = "by_category";

/// Aggregation bucketing matches by brand.
pub const BRAND_AGGREGATION: &str = "by_brand";

/// Term suggester producing "did you mean" corrections.
pub const SPELL_CHECK: &str = "spell-check";

/// A query after normalization and entity tagging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnderstoodQuery {
    /// The raw input.
    pub raw: String,
    /// The normalized input.
    pub normalized: String,
    /// Entities found in the normalized input.
    pub entities: Vec<Entity>,
    /// Tokens covered by no entity, minus stop words.
    pub residual: String,
}

impl UnderstoodQuery {
    /// Normalizes `raw` and tags it with `matcher`.
    pub fn new(raw: &str, matcher: &PatternMatcher) -> Self {
        let normalized = normalize(raw);
        let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
        let entities = matcher.tag(&tokens);

        let mut covered = vec![false; tokens.len()];
        for e in &entities {
            covered[e.start..e.end].iter_mut().for_each(|c| *c = true);
        }
        let residual = tokens
            .iter()
            .zip(&covered)
            .filter(|(t, c)| !**c && !STOP_WORDS.contains(*t))
            .map(|(t, _)| *t)
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            raw: raw.to_string(),
            normalized,
            entities,
            residual,
        }
    }

    /// Returns `true` if nothing searchable is left after normalization.
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

/// Builds the `bool` query for an understood query.
///
/// Brands, aisles and the organic attribute become filters; product types
/// become `match` clauses on the name. Residual text is matched across the
/// text fields when other must clauses exist; otherwise the whole normalized
/// query is matched on name and description.
pub fn bool_query(q: &UnderstoodQuery) -> Value {
    let mut filter = Vec::new();
    let mut must = Vec::new();

    for e in &q.entities {
        match &e.label {
            EntityLabel::Brand => filter.push(json!({
                "term": { "brand": { "value": e.value, "case_insensitive": true } }
            })),
            EntityLabel::DietaryAttribute | EntityLabel::GroceryAttribute => {
                if e.value.eq_ignore_ascii_case("organic") {
                    filter.push(json!({ "term": { "grocery_attributes.is_organic": { "value": true } } }));
                }
            }
            EntityLabel::Aisle => filter.push(json!({
                "term": { "categories": { "value": e.value } }
            })),
            EntityLabel::ProductType => must.push(json!({
                "match": { "name": { "query": e.value } }
            })),
            EntityLabel::Department | EntityLabel::Other(_) => {}
        }
    }

    if !must.is_empty() && !q.residual.is_empty() {
        must.push(json!({
            "multi_match": {
                "query": q.residual,
                "fields": ["name", "description", "search_aid^0.5"],
                "type": "best_fields"
            }
        }));
    }

    if must.is_empty() {
        must.push(json!({
            "multi_match": { "query": q.normalized, "fields": ["name", "description"] }
        }));
    }

    json!({ "bool": { "must": must, "filter": filter } })
}

/// Builds the full search: bool query, category and brand aggregations and
/// the spell-check suggester.
pub fn search_query(q: &UnderstoodQuery) -> SearchQuery {
    SearchQuery::new(bool_query(q))
        .with_aggregation(TermsAggregation::new(CATEGORY_AGGREGATION, "categories", 10))
        .with_aggregation(TermsAggregation::new(BRAND_AGGREGATION, "brand", 10))
        .with_suggestion(TermSuggestion {
            name: SPELL_CHECK.to_string(),
            text: q.normalized.clone(),
            field: "name".to_string(),
        })
}
