//! Mock index transports shared by the service tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use qou_config::{PoolConfig, RequestConfig, RetryConfig};
use qou_index::{
    ClientSettings, IndexError, IndexTransport, SearchIndexClient, WireRequest, WireResponse,
};
use serde_json::{json, Value};
use tokio::sync::Semaphore;

type Reply = dyn Fn(&WireRequest) -> WireResponse + Send + Sync;

/// Answers every request with `reply` and records what was sent.
pub struct Recorder {
    reply: Box<Reply>,
    requests: Mutex<Vec<WireRequest>>,
}

impl Recorder {
    pub fn new(reply: impl Fn(&WireRequest) -> WireResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, i: usize) -> WireRequest {
        self.requests.lock().unwrap()[i].clone()
    }

    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndexTransport for Recorder {
    async fn send(&self, request: &WireRequest) -> Result<WireResponse, IndexError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok((self.reply)(request))
    }

    fn endpoint(&self) -> String {
        "recorder".to_string()
    }
}

/// Blocks every request until the test adds permits to `gate`.
pub struct Gated {
    pub gate: Semaphore,
    pub started: AtomicUsize,
}

impl Gated {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            started: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl IndexTransport for Gated {
    async fn send(&self, _request: &WireRequest) -> Result<WireResponse, IndexError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.gate
            .acquire()
            .await
            .map_err(|_| IndexError::Cancelled)?
            .forget();
        Ok(WireResponse::ok(hits_response(&[])))
    }

    fn endpoint(&self) -> String {
        "gated".to_string()
    }
}

/// A client over `transport` with a pool of `max_connections` and fast retries.
pub fn client_with(
    transport: Arc<dyn IndexTransport>,
    max_connections: usize,
    pool_wait_ms: u64,
) -> SearchIndexClient {
    let settings = ClientSettings {
        pool: PoolConfig {
            max_connections,
            timeout_ms: pool_wait_ms,
        },
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
        },
        request: RequestConfig { timeout_ms: 5_000 },
    };
    SearchIndexClient::new(transport, &settings)
}

/// A `_search` body with `(id, score, name)` hits.
pub fn hits_response(hits: &[(&str, f64, &str)]) -> Value {
    let hits: Vec<Value> = hits
        .iter()
        .map(|(id, score, name)| json!({"_id": id, "_score": score, "_source": {"name": name}}))
        .collect();
    json!({"hits": {"total": {"value": hits.len()}, "hits": hits}})
}

/// A `_bulk` body acknowledging `n` documents.
pub fn bulk_ok(n: usize) -> Value {
    let items: Vec<Value> = (0..n)
        .map(|i| json!({"index": {"_id": i.to_string(), "status": 201}}))
        .collect();
    json!({"errors": false, "items": items})
}
