//! The query understanding service.
//!
//! [`SearchService`] turns a free-text term into a structured search using
//! the pattern artifact loaded at startup, then delegates to the index
//! client. Without a usable artifact the service runs degraded: every lookup
//! fails with [`LookupError::ArtifactUnavailable`] and nothing panics.

use std::path::Path;
use std::sync::Arc;

use futures::TryStreamExt;
use qou_common::Artifact;
use qou_config::IndexConfig;
use qou_index::{Correction, Facet, IndexDocument, IndexError, SearchIndexClient, SearchOptions};
use qou_resource::load_resource;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::entities::PatternMatcher;
use crate::lifecycle::{Lifecycle, ServiceState};
use crate::rewrite::{self, UnderstoodQuery, BRAND_AGGREGATION, CATEGORY_AGGREGATION};

/// Completion field of the suggestions index.
pub const SUGGEST_FIELD: &str = "suggest";

/// Maximum completion suggestions returned.
pub const SUGGEST_SIZE: usize = 10;

/// Errors returned by lookups.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// The pattern artifact failed to load; the service is degraded.
    #[error("pattern artifact unavailable: {reason}")]
    ArtifactUnavailable {
        /// Why the artifact could not be loaded.
        reason: String,
    },

    /// The index request failed.
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl LookupError {
    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LookupError::ArtifactUnavailable { .. } => "artifact_unavailable",
            LookupError::Index(IndexError::Timeout { .. }) => "timeout",
            LookupError::Index(IndexError::ConnectionRefused { .. }) => "connection_refused",
            LookupError::Index(IndexError::AuthFailure { .. }) => "auth_failure",
            LookupError::Index(IndexError::MalformedQuery { .. }) => "malformed_query",
            LookupError::Index(IndexError::Cancelled) => "cancelled",
            LookupError::Index(_) => "index_error",
        }
    }
}

/// A ranked match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    /// Document id.
    pub id: String,
    /// Product name.
    pub name: String,
    /// Relevance score.
    pub score: f64,
}

impl From<IndexDocument> for Match {
    fn from(doc: IndexDocument) -> Self {
        let name = doc.payload["name"].as_str().unwrap_or_default().to_string();
        Self {
            id: doc.id,
            name,
            score: doc.score.unwrap_or(0.0),
        }
    }
}

/// Matches plus facets and a spelling suggestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetedMatches {
    /// Ranked matches of the first page.
    pub matches: Vec<Match>,
    /// `Category` and `Brand` facets; empty facets are omitted.
    pub facets: Vec<Facet>,
    /// The query with misspelled tokens replaced, if any were corrected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_you_mean: Option<String>,
}

/// How a term would be searched, without searching.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    /// The term after normalization and tagging.
    pub understood: UnderstoodQuery,
    /// Index the query targets.
    pub index: String,
    /// Query DSL that would be sent.
    pub query: Value,
}

/// Index names and result limits used by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Products index.
    pub products_index: String,
    /// Completion suggestions index.
    pub suggestions_index: String,
    /// Maximum matches returned by [`SearchService::lookup`].
    pub limit: usize,
    /// Documents per page.
    pub page_size: usize,
}

impl ServiceSettings {
    /// Settings for the configured indices with default limits.
    pub fn from_config(index: &IndexConfig) -> Self {
        Self {
            products_index: index.products_index.clone(),
            suggestions_index: index.suggestions_index.clone(),
            limit: 50,
            page_size: 10,
        }
    }

    fn options(&self) -> SearchOptions {
        SearchOptions::new(&self.products_index)
            .with_limit(self.limit)
            .with_page_size(self.page_size)
    }
}

struct Knowledge {
    artifact: Artifact,
    matcher: PatternMatcher,
}

struct Inner {
    client: SearchIndexClient,
    settings: ServiceSettings,
    state: ServiceState,
    knowledge: Option<Knowledge>,
}

/// Stateless query service over a shared, read-only artifact.
#[derive(Clone)]
pub struct SearchService {
    inner: Arc<Inner>,
}

impl SearchService {
    /// Loads the packaged artifact and starts serving, or starts degraded.
    pub fn start(
        client: SearchIndexClient,
        settings: ServiceSettings,
        resource_dir: &Path,
        logical_name: &str,
    ) -> Self {
        let loaded = load_resource(resource_dir, logical_name).map_err(|e| e.to_string());
        Self::settle(client, settings, loaded)
    }

    /// Starts serving an artifact already in memory.
    pub fn from_artifact(
        client: SearchIndexClient,
        settings: ServiceSettings,
        artifact: Artifact,
    ) -> Self {
        Self::settle(client, settings, Ok(artifact))
    }

    fn settle(
        client: SearchIndexClient,
        settings: ServiceSettings,
        loaded: Result<Artifact, String>,
    ) -> Self {
        let mut lifecycle = Lifecycle::new();
        let knowledge = loaded.and_then(|artifact| {
            let table = artifact.patterns().map_err(|e| e.to_string())?;
            let matcher = PatternMatcher::new(&table);
            lifecycle
                .advance(ServiceState::Packaged)
                .and_then(|_| lifecycle.advance(ServiceState::Serving))
                .map_err(|e| e.to_string())?;
            Ok(Knowledge { artifact, matcher })
        });

        let knowledge = match knowledge {
            Ok(k) => {
                info!(
                    artifact = %k.artifact.name,
                    fingerprint = %k.artifact.fingerprint,
                    rules = k.matcher.len(),
                    "serving"
                );
                Some(k)
            }
            Err(reason) => {
                error!(%reason, "pattern artifact unavailable, serving degraded");
                lifecycle = Lifecycle::new();
                if let Err(e) = lifecycle.advance(ServiceState::Degraded { reason }) {
                    error!(error = %e, "lifecycle rejected degraded state");
                }
                None
            }
        };

        Self {
            inner: Arc::new(Inner {
                client,
                settings,
                state: lifecycle.state().clone(),
                knowledge,
            }),
        }
    }

    /// The lifecycle state reached at startup.
    pub fn state(&self) -> &ServiceState {
        &self.inner.state
    }

    /// The loaded artifact, unless degraded.
    pub fn artifact(&self) -> Option<&Artifact> {
        self.inner.knowledge.as_ref().map(|k| &k.artifact)
    }

    fn understand(&self, term: &str) -> Result<UnderstoodQuery, LookupError> {
        let knowledge = self.inner.knowledge.as_ref().ok_or_else(|| {
            let reason = match &self.inner.state {
                ServiceState::Degraded { reason } => reason.clone(),
                other => format!("service is {other}"),
            };
            LookupError::ArtifactUnavailable { reason }
        })?;
        let understood = UnderstoodQuery::new(term, &knowledge.matcher);
        debug!(
            term,
            normalized = %understood.normalized,
            entities = understood.entities.len(),
            residual = %understood.residual,
            "understood query"
        );
        Ok(understood)
    }

    /// Ranked matches for `term`.
    pub async fn lookup(&self, term: &str) -> Result<Vec<Match>, LookupError> {
        self.lookup_with(term, &CancellationToken::new()).await
    }

    /// Like [`lookup`](Self::lookup), cancellable by the caller.
    pub async fn lookup_with(
        &self,
        term: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Match>, LookupError> {
        let understood = self.understand(term)?;
        if understood.is_empty() {
            return Ok(Vec::new());
        }
        let query = rewrite::search_query(&understood);
        let matches: Vec<Match> = self
            .inner
            .client
            .search_cancellable(query, self.inner.settings.options(), cancel.clone())
            .map_ok(Match::from)
            .try_collect()
            .await?;
        Ok(matches)
    }

    /// First page of matches with facets and a "did you mean" suggestion.
    pub async fn lookup_faceted(&self, term: &str) -> Result<FacetedMatches, LookupError> {
        let understood = self.understand(term)?;
        if understood.is_empty() {
            return Ok(FacetedMatches {
                matches: Vec::new(),
                facets: Vec::new(),
                did_you_mean: None,
            });
        }
        let query = rewrite::search_query(&understood);
        let page = self
            .inner
            .client
            .search_page(
                &query,
                &self.inner.settings.options(),
                0,
                &CancellationToken::new(),
            )
            .await?;

        Ok(FacetedMatches {
            matches: page.documents.into_iter().map(Match::from).collect(),
            facets: display_facets(page.facets),
            did_you_mean: did_you_mean(&understood.normalized, &page.corrections),
        })
    }

    /// Completion suggestions for a prefix.
    ///
    /// Does not need the pattern artifact, so it also works when degraded.
    pub async fn suggest(&self, prefix: &str) -> Result<Vec<String>, LookupError> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let suggestions = self
            .inner
            .client
            .suggest(
                &self.inner.settings.suggestions_index,
                SUGGEST_FIELD,
                prefix,
                SUGGEST_SIZE,
                &CancellationToken::new(),
            )
            .await?;
        Ok(suggestions)
    }

    /// The understood query and its DSL, without contacting the index.
    pub fn explain(&self, term: &str) -> Result<Explanation, LookupError> {
        let understood = self.understand(term)?;
        let query = rewrite::bool_query(&understood);
        Ok(Explanation {
            understood,
            index: self.inner.settings.products_index.clone(),
            query,
        })
    }
}

/// Renames aggregation facets for display and drops empty ones.
fn display_facets(facets: Vec<Facet>) -> Vec<Facet> {
    facets
        .into_iter()
        .filter(|f| !f.values.is_empty())
        .filter_map(|mut f| {
            f.name = match f.name.as_str() {
                CATEGORY_AGGREGATION => "Category".to_string(),
                BRAND_AGGREGATION => "Brand".to_string(),
                _ => return None,
            };
            Some(f)
        })
        .collect()
}

/// Applies term corrections; `None` if nothing changed.
fn did_you_mean(normalized: &str, corrections: &[Correction]) -> Option<String> {
    if corrections.is_empty() {
        return None;
    }
    let corrected = normalized
        .split(' ')
        .map(|token| {
            corrections
                .iter()
                .find(|c| c.original == token)
                .map_or(token, |c| c.suggested.as_str())
        })
        .collect::<Vec<_>>()
        .join(" ");
    (corrected != normalized).then_some(corrected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client_with, hits_response, Gated, Recorder};
    use qou_common::ContentHash;
    use qou_index::{FacetValue, WireBody, WireResponse};
    use qou_resource::ResourcePackager;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const PATTERNS: &str = r#"[
        {"label": "BRAND", "pattern": "fage"},
        {"label": "AISLE", "pattern": "yogurt"},
        {"label": "DIETARY_ATTRIBUTE", "pattern": "organic"}
    ]"#;

    fn artifact(payload: &str) -> Artifact {
        Artifact {
            name: "patterns".to_string(),
            version: "0.1.0".to_string(),
            fingerprint: ContentHash::from_bytes(b"inputs"),
            payload: payload.as_bytes().to_vec(),
        }
    }

    fn settings() -> ServiceSettings {
        ServiceSettings::from_config(&IndexConfig::default())
    }

    fn assert_send_sync_clone<T: Send + Sync + Clone>() {}

    #[test]
    fn service_is_shareable() {
        assert_send_sync_clone::<SearchService>();
    }

    #[tokio::test]
    async fn missing_artifact_degrades_without_crashing() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(|_| WireResponse::ok(hits_response(&[])));
        let service = SearchService::start(
            client_with(recorder.clone(), 2, 1_000),
            settings(),
            dir.path(),
            "patterns.qou",
        );

        assert!(matches!(service.state(), ServiceState::Degraded { .. }));
        assert!(service.artifact().is_none());
        for _ in 0..2 {
            let err = service.lookup("fage yogurt").await.unwrap_err();
            assert!(matches!(err, LookupError::ArtifactUnavailable { .. }));
            assert_eq!(err.kind(), "artifact_unavailable");
        }
        assert!(service.explain("fage").is_err());
        assert_eq!(recorder.calls(), 0);
    }

    #[tokio::test]
    async fn unparseable_patterns_degrade() {
        let recorder = Recorder::new(|_| WireResponse::ok(hits_response(&[])));
        let service = SearchService::from_artifact(
            client_with(recorder, 2, 1_000),
            settings(),
            artifact("[]"),
        );
        assert!(matches!(service.state(), ServiceState::Degraded { .. }));
    }

    #[tokio::test]
    async fn lookup_from_packaged_artifact() {
        let dir = tempfile::tempdir().unwrap();
        ResourcePackager::new(dir.path(), "patterns.qou", "0.1.0")
            .package(&artifact(PATTERNS))
            .unwrap();

        let recorder = Recorder::new(|_| {
            WireResponse::ok(hits_response(&[
                ("instacart-7", 4.2, "Fage Total 2% Greek Yogurt"),
                ("instacart-9", 2.1, "Fage Plain Yogurt"),
            ]))
        });
        let service = SearchService::start(
            client_with(recorder.clone(), 2, 1_000),
            settings(),
            dir.path(),
            "patterns.qou",
        );
        assert_eq!(service.state(), &ServiceState::Serving);

        let matches = service.lookup("FAGE Yogurt").await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "instacart-7");
        assert_eq!(matches[0].name, "Fage Total 2% Greek Yogurt");
        assert!(matches[0].score > matches[1].score);

        let request = recorder.request(0);
        assert_eq!(request.path, "products_index/_search");
        match request.body {
            Some(WireBody::Json(body)) => {
                let filter = &body["query"]["bool"]["filter"];
                assert_eq!(filter[0]["term"]["brand"]["value"], "fage");
                assert_eq!(filter[1]["term"]["categories"]["value"], "yogurt");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_term_makes_no_request() {
        let recorder = Recorder::new(|_| WireResponse::ok(hits_response(&[])));
        let service =
            SearchService::from_artifact(client_with(recorder.clone(), 2, 1_000), settings(), artifact(PATTERNS));
        assert!(service.lookup("  ?! ").await.unwrap().is_empty());
        assert_eq!(recorder.calls(), 0);
    }

    #[tokio::test]
    async fn faceted_lookup_renames_facets_and_suggests() {
        let recorder = Recorder::new(|_| {
            let mut body = hits_response(&[("instacart-1", 1.0, "Organic Yogurt")]);
            body["aggregations"] = json!({
                "by_category": {"buckets": [{"key": "yogurt", "doc_count": 12}]},
                "by_brand": {"buckets": []}
            });
            body["suggest"] = json!({
                "spell-check": [
                    {"text": "organc", "options": [{"text": "organic", "score": 0.8}]},
                    {"text": "yogurt", "options": []}
                ]
            });
            WireResponse::ok(body)
        });
        let service =
            SearchService::from_artifact(client_with(recorder, 2, 1_000), settings(), artifact(PATTERNS));

        let result = service.lookup_faceted("organc yogurt").await.unwrap();
        assert_eq!(result.matches.len(), 1);
        assert_eq!(
            result.facets,
            vec![Facet {
                name: "Category".to_string(),
                values: vec![FacetValue {
                    value: "yogurt".to_string(),
                    count: 12
                }]
            }]
        );
        assert_eq!(result.did_you_mean.as_deref(), Some("organic yogurt"));
    }

    #[tokio::test]
    async fn suggest_queries_suggestions_index() {
        let recorder = Recorder::new(|_| {
            WireResponse::ok(json!({
                "suggest": {"product-suggester": [{"text": "gre", "options": [{"text": "Greek Yogurt"}]}]}
            }))
        });
        let service = SearchService::from_artifact(
            client_with(recorder.clone(), 2, 1_000),
            settings(),
            artifact(PATTERNS),
        );
        assert_eq!(service.suggest("gre").await.unwrap(), vec!["Greek Yogurt"]);
        assert_eq!(recorder.request(0).path, "suggestions_index/_search");
        assert!(service.suggest("   ").await.unwrap().is_empty());
        assert_eq!(recorder.calls(), 1);
    }

    #[test]
    fn explain_shows_understood_query() {
        let recorder = Recorder::new(|_| WireResponse::ok(hits_response(&[])));
        let service = SearchService::from_artifact(
            client_with(recorder.clone(), 2, 1_000),
            settings(),
            artifact(PATTERNS),
        );
        let e = service.explain("Show me organic yogurt").unwrap();
        assert_eq!(e.index, "products_index");
        assert_eq!(e.understood.normalized, "show me organic yogurt");
        assert_eq!(e.understood.entities.len(), 2);
        assert_eq!(
            e.query["bool"]["filter"][0]["term"]["grocery_attributes.is_organic"]["value"],
            true
        );
        assert_eq!(recorder.calls(), 0);
    }

    #[tokio::test]
    async fn third_lookup_waits_for_a_free_connection() {
        let transport = Gated::new();
        let service = SearchService::from_artifact(
            client_with(transport.clone(), 2, 5_000),
            settings(),
            artifact(PATTERNS),
        );

        let handles: Vec<_> = ["fage", "yogurt", "organic"]
            .into_iter()
            .map(|term| {
                let s = service.clone();
                tokio::spawn(async move { s.lookup(term).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.started.load(Ordering::SeqCst), 2);

        transport.gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.started.load(Ordering::SeqCst), 3);

        transport.gate.add_permits(2);
        for h in handles {
            assert!(h.await.unwrap().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn third_lookup_times_out_when_pool_stays_full() {
        let transport = Gated::new();
        let service = SearchService::from_artifact(
            client_with(transport.clone(), 2, 30),
            settings(),
            artifact(PATTERNS),
        );

        let held: Vec<_> = ["fage", "yogurt"]
            .into_iter()
            .map(|term| {
                let s = service.clone();
                tokio::spawn(async move { s.lookup(term).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let err = service.lookup("organic").await.unwrap_err();
        assert!(matches!(err, LookupError::Index(IndexError::Timeout { .. })));
        assert_eq!(err.kind(), "timeout");

        transport.gate.add_permits(2);
        for h in held {
            assert!(h.await.unwrap().is_ok());
        }
    }

    #[test]
    fn did_you_mean_only_when_changed() {
        let c = vec![Correction {
            original: "yoghurt".to_string(),
            suggested: "yogurt".to_string(),
        }];
        assert_eq!(did_you_mean("greek yoghurt", &c).as_deref(), Some("greek yogurt"));
        assert_eq!(did_you_mean("greek yogurt", &c), None);
        assert_eq!(did_you_mean("greek yogurt", &[]), None);
    }
}
