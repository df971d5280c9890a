//! The search index client.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use qou_config::{PoolConfig, ProjectConfig, RequestConfig, RetryConfig};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::IndexError;
use crate::pool::ConnectionPool;
use crate::query::{SearchOptions, SearchQuery};
use crate::response::{self, IndexAck, IndexDocument, SearchPage};
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, IndexTransport, WireRequest, WireResponse};

/// Name of the completion suggester in suggestion requests.
pub const COMPLETION_SUGGESTER: &str = "product-suggester";

/// Pool, retry and timeout settings for a client.
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    /// Connection pool settings.
    pub pool: PoolConfig,
    /// Retry policy settings.
    pub retry: RetryConfig,
    /// Per-request settings.
    pub request: RequestConfig,
}

impl ClientSettings {
    /// Extracts the client settings from a project configuration.
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            pool: config.pool.clone(),
            retry: config.retry.clone(),
            request: config.request.clone(),
        }
    }
}

struct Inner {
    transport: Arc<dyn IndexTransport>,
    pool: ConnectionPool,
    retry: RetryPolicy,
    request_timeout: Duration,
}

/// Client for the search index.
///
/// Cheap to clone; clones share the transport and the connection pool.
#[derive(Clone)]
pub struct SearchIndexClient {
    inner: Arc<Inner>,
}

impl SearchIndexClient {
    /// Creates a client over an arbitrary transport.
    pub fn new(transport: Arc<dyn IndexTransport>, settings: &ClientSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                pool: ConnectionPool::new(settings.pool.max_connections, settings.pool.timeout()),
                retry: RetryPolicy::from_config(&settings.retry),
                request_timeout: settings.request.timeout(),
            }),
        }
    }

    /// Creates an HTTP client for the configured index.
    pub fn connect(config: &ProjectConfig) -> Result<Self, IndexError> {
        let settings = ClientSettings::from_config(config);
        let transport = HttpTransport::new(&config.index, settings.request.timeout())?;
        Ok(Self::new(Arc::new(transport), &settings))
    }

    /// The connection pool shared by all clones of this client.
    pub fn pool(&self) -> &ConnectionPool {
        &self.inner.pool
    }

    /// Streams up to `options.limit` matching documents in rank order.
    ///
    /// Pages are fetched lazily as the stream is polled; nothing is sent
    /// before the first poll. The stream ends after the limit, after a short
    /// page, or after the first error.
    pub fn search(
        &self,
        query: SearchQuery,
        options: SearchOptions,
    ) -> BoxStream<'static, Result<IndexDocument, IndexError>> {
        self.search_cancellable(query, options, CancellationToken::new())
    }

    /// Like [`search`](Self::search), with a caller-owned cancellation token.
    pub fn search_cancellable(
        &self,
        query: SearchQuery,
        options: SearchOptions,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<IndexDocument, IndexError>> {
        let state = Paging {
            client: self.clone(),
            query,
            options,
            cancel,
            from: 0,
            yielded: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        };
        stream::unfold(state, Paging::next).boxed()
    }

    /// Fetches one page with facets and corrections, starting at `from`.
    pub async fn search_page(
        &self,
        query: &SearchQuery,
        options: &SearchOptions,
        from: usize,
        cancel: &CancellationToken,
    ) -> Result<SearchPage, IndexError> {
        self.fetch_page(query, &options.index, from, options.page_size, true, cancel)
            .await
    }

    async fn fetch_page(
        &self,
        query: &SearchQuery,
        index: &str,
        from: usize,
        size: usize,
        with_extras: bool,
        cancel: &CancellationToken,
    ) -> Result<SearchPage, IndexError> {
        let request = WireRequest::post_json(
            format!("{index}/_search"),
            query.to_body(from, size, with_extras),
        );
        let response = self.execute("search", request, cancel).await?;
        let suggester = query
            .suggestion
            .as_ref()
            .filter(|_| with_extras)
            .map(|s| s.name.as_str());
        let aggregations = if with_extras {
            query.aggregations.as_slice()
        } else {
            &[]
        };
        response::parse_search_page(&response.body, aggregations, suggester)
    }

    /// Indexes documents into `index` with one `_bulk` request.
    pub async fn index(
        &self,
        index: &str,
        documents: &[IndexDocument],
        cancel: &CancellationToken,
    ) -> Result<IndexAck, IndexError> {
        if documents.is_empty() {
            return Ok(IndexAck { indexed: 0 });
        }

        let mut body = String::new();
        for doc in documents {
            body.push_str(&json!({ "index": { "_index": index, "_id": doc.id } }).to_string());
            body.push('\n');
            body.push_str(&doc.payload.to_string());
            body.push('\n');
        }

        let response = self
            .execute("bulk", WireRequest::post_ndjson("_bulk", body), cancel)
            .await?;
        let ack = response::parse_bulk(&response.body, documents.len())?;
        debug!(index, indexed = ack.indexed, "bulk request acknowledged");
        Ok(ack)
    }

    /// Returns completion suggestions for `prefix` from a completion field.
    pub async fn suggest(
        &self,
        index: &str,
        field: &str,
        prefix: &str,
        size: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, IndexError> {
        let body = json!({
            "suggest": {
                COMPLETION_SUGGESTER: {
                    "prefix": prefix,
                    "completion": { "field": field, "size": size, "skip_duplicates": true }
                }
            }
        });
        let response = self
            .execute("suggest", WireRequest::post_json(format!("{index}/_search"), body), cancel)
            .await?;
        response::parse_completion(&response.body, COMPLETION_SUGGESTER)
    }

    /// Returns `true` if `index` exists.
    pub async fn index_exists(
        &self,
        index: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, IndexError> {
        match self.execute("exists", WireRequest::head(index), cancel).await {
            Ok(_) => Ok(true),
            Err(IndexError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Creates `index` with the given mappings.
    pub async fn create_index(
        &self,
        index: &str,
        mappings: Value,
        cancel: &CancellationToken,
    ) -> Result<(), IndexError> {
        self.execute(
            "create index",
            WireRequest::put_json(index, json!({ "mappings": mappings })),
            cancel,
        )
        .await?;
        debug!(index, "index created");
        Ok(())
    }

    /// Sends a request under the retry policy.
    async fn execute(
        &self,
        operation: &str,
        request: WireRequest,
        cancel: &CancellationToken,
    ) -> Result<WireResponse, IndexError> {
        let request = &request;
        self.inner
            .retry
            .run(operation, cancel, move |attempt| {
                self.attempt(operation, attempt, request, cancel)
            })
            .await
    }

    /// One attempt: take a pool slot, send with a timeout, classify the status.
    async fn attempt(
        &self,
        operation: &str,
        attempt: u32,
        request: &WireRequest,
        cancel: &CancellationToken,
    ) -> Result<WireResponse, IndexError> {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IndexError::Cancelled),
            permit = self.inner.pool.acquire() => permit.inspect_err(|e| {
                if matches!(e, IndexError::Timeout { .. }) {
                    warn!(
                        operation,
                        endpoint = %self.inner.transport.endpoint(),
                        capacity = self.inner.pool.capacity(),
                        "connection pool exhausted"
                    );
                }
            })?,
        };

        let timeout = self.inner.request_timeout;
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IndexError::Cancelled),
            sent = tokio::time::timeout(timeout, self.inner.transport.send(request)) => sent,
        };
        let response = sent.map_err(|_| IndexError::Timeout {
            operation: format!("waiting for {operation} response"),
            after_ms: timeout.as_millis() as u64,
        })??;

        debug!(
            operation,
            attempt,
            path = %request.path,
            status = response.status,
            "index responded"
        );

        if (200..300).contains(&response.status) {
            Ok(response)
        } else {
            Err(IndexError::from_status(response.status, &response.body))
        }
    }
}

/// State of a lazily paged search stream.
struct Paging {
    client: SearchIndexClient,
    query: SearchQuery,
    options: SearchOptions,
    cancel: CancellationToken,
    from: usize,
    yielded: usize,
    buffer: VecDeque<IndexDocument>,
    exhausted: bool,
}

impl Paging {
    async fn next(mut self) -> Option<(Result<IndexDocument, IndexError>, Self)> {
        if self.yielded >= self.options.limit {
            return None;
        }

        if self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            let size = self
                .options
                .page_size
                .max(1)
                .min(self.options.limit - self.yielded);
            let page = self
                .client
                .fetch_page(
                    &self.query,
                    &self.options.index,
                    self.from,
                    size,
                    false,
                    &self.cancel,
                )
                .await;
            match page {
                Ok(page) => {
                    let fetched = page.documents.len();
                    self.exhausted = fetched < size;
                    self.from += fetched;
                    self.buffer.extend(page.documents);
                }
                Err(error) => {
                    self.exhausted = true;
                    self.yielded = self.options.limit;
                    return Some((Err(error), self));
                }
            }
        }

        let document = self.buffer.pop_front()?;
        self.yielded += 1;
        Some((Ok(document), self))
    }
}
