//! Decoding of index responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::IndexError;
use crate::query::TermsAggregation;

/// A document as stored in or returned by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Document id.
    pub id: String,
    /// Relevance score, present on search hits.
    pub score: Option<f64>,
    /// The document source.
    pub payload: Value,
}

/// One bucket of a facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetValue {
    /// Bucket key.
    pub value: String,
    /// Number of matching documents.
    pub count: u64,
}

/// Buckets of one terms aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    /// Aggregation or display name.
    pub name: String,
    /// Buckets in the order the index returned them.
    pub values: Vec<FacetValue>,
}

/// A term-suggester correction for one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    /// The token as searched.
    pub original: String,
    /// The best-scoring replacement.
    pub suggested: String,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    /// Hits in rank order.
    pub documents: Vec<IndexDocument>,
    /// Total matching documents, when reported.
    pub total: Option<u64>,
    /// Facets, in the order the aggregations were requested.
    pub facets: Vec<Facet>,
    /// Corrections from the term suggester.
    pub corrections: Vec<Correction>,
}

/// Acknowledgement of a bulk index request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexAck {
    /// Number of documents indexed.
    pub indexed: usize,
}

fn decode_error(reason: impl Into<String>) -> IndexError {
    IndexError::Decode {
        reason: reason.into(),
    }
}

/// Decodes a `_search` response.
pub fn parse_search_page(
    body: &Value,
    aggregations: &[TermsAggregation],
    suggester: Option<&str>,
) -> Result<SearchPage, IndexError> {
    let hits = body["hits"]["hits"]
        .as_array()
        .ok_or_else(|| decode_error("missing hits.hits"))?;

    let documents = hits
        .iter()
        .map(|hit| {
            let id = hit["_id"]
                .as_str()
                .ok_or_else(|| decode_error("hit without _id"))?;
            Ok(IndexDocument {
                id: id.to_string(),
                score: hit["_score"].as_f64(),
                payload: hit["_source"].clone(),
            })
        })
        .collect::<Result<Vec<_>, IndexError>>()?;

    let total = body["hits"]["total"]["value"]
        .as_u64()
        .or_else(|| body["hits"]["total"].as_u64());

    let facets = aggregations
        .iter()
        .filter_map(|agg| {
            let buckets = body["aggregations"][&agg.name]["buckets"].as_array()?;
            let values = buckets
                .iter()
                .filter_map(|b| {
                    let value = match &b["key"] {
                        Value::String(s) => s.clone(),
                        Value::Null => return None,
                        other => other.to_string(),
                    };
                    Some(FacetValue {
                        value,
                        count: b["doc_count"].as_u64().unwrap_or(0),
                    })
                })
                .collect();
            Some(Facet {
                name: agg.name.clone(),
                values,
            })
        })
        .collect();

    let corrections = suggester
        .and_then(|name| body["suggest"][name].as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let original = entry["text"].as_str()?;
                    let suggested = entry["options"][0]["text"].as_str()?;
                    Some(Correction {
                        original: original.to_string(),
                        suggested: suggested.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(SearchPage {
        documents,
        total,
        facets,
        corrections,
    })
}

/// Decodes the options of a completion suggester.
pub fn parse_completion(body: &Value, suggester: &str) -> Result<Vec<String>, IndexError> {
    let entries = body["suggest"][suggester]
        .as_array()
        .ok_or_else(|| decode_error(format!("missing suggest.{suggester}")))?;
    Ok(entries
        .iter()
        .flat_map(|entry| entry["options"].as_array().into_iter().flatten())
        .filter_map(|option| option["text"].as_str().map(str::to_string))
        .collect())
}

/// Decodes a `_bulk` response into an acknowledgement.
pub fn parse_bulk(body: &Value, total: usize) -> Result<IndexAck, IndexError> {
    let items = body["items"]
        .as_array()
        .ok_or_else(|| decode_error("missing items"))?;

    let failures: Vec<&Value> = items
        .iter()
        .filter_map(|item| {
            let action = item.as_object()?.values().next()?;
            action.get("error")
        })
        .collect();

    if let Some(first) = failures.first() {
        let first_reason = first["reason"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| first.to_string());
        return Err(IndexError::BulkRejected {
            failed: failures.len(),
            total,
            first_reason,
        });
    }

    Ok(IndexAck {
        indexed: items.len(),
    })
}
