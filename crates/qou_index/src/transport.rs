//! Wire transport for the index's HTTP/JSON protocol.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use qou_config::{Credentials, IndexConfig};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;

use crate::error::IndexError;

/// HTTP method of a wire request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `HEAD`
    Head,
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum WireBody {
    /// A JSON document.
    Json(Value),
    /// Newline-delimited JSON, as taken by `_bulk`.
    NdJson(String),
}

/// A single request to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the index base URL, e.g. `products_index/_search`.
    pub path: String,
    /// Optional body.
    pub body: Option<WireBody>,
}

impl WireRequest {
    /// A `POST` with a JSON body.
    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(WireBody::Json(body)),
        }
    }

    /// A `POST` with an NDJSON body.
    pub fn post_ndjson(path: impl Into<String>, body: String) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(WireBody::NdJson(body)),
        }
    }

    /// A `PUT` with a JSON body.
    pub fn put_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body: Some(WireBody::Json(body)),
        }
    }

    /// A bodiless `HEAD`.
    pub fn head(path: impl Into<String>) -> Self {
        Self {
            method: Method::Head,
            path: path.into(),
            body: None,
        }
    }
}

/// A response as received, before status classification.
#[derive(Debug, Clone, PartialEq)]
pub struct WireResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body; [`Value::Null`] when empty.
    pub body: Value,
}

impl WireResponse {
    /// A `200 OK` response with the given body.
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }
}

/// Sends requests to the index.
///
/// Implementations report only transport-level failures as errors; any HTTP
/// response, whatever its status, is returned as a [`WireResponse`].
#[async_trait]
pub trait IndexTransport: Send + Sync {
    /// Sends one request and waits for its response.
    async fn send(&self, request: &WireRequest) -> Result<WireResponse, IndexError>;

    /// Base URL used in error messages.
    fn endpoint(&self) -> String;
}

/// [`IndexTransport`] over HTTP using `reqwest`.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl HttpTransport {
    /// Builds a transport for the configured index.
    pub fn new(config: &IndexConfig, timeout: Duration) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Unexpected {
                status: None,
                reason: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url(),
            credentials: config.credentials.clone(),
            timeout,
        })
    }

    fn classify(&self, error: reqwest::Error) -> IndexError {
        if error.is_timeout() {
            IndexError::Timeout {
                operation: "waiting for the index".to_string(),
                after_ms: self.timeout.as_millis() as u64,
            }
        } else if error.is_connect() {
            IndexError::ConnectionRefused {
                endpoint: self.base_url.clone(),
                reason: error.to_string(),
            }
        } else {
            IndexError::Unexpected {
                status: error.status().map(|s| s.as_u16()),
                reason: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl IndexTransport for HttpTransport {
    async fn send(&self, request: &WireRequest) -> Result<WireResponse, IndexError> {
        let url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Head => self.client.head(&url),
        };

        builder = match &self.credentials {
            Some(Credentials::Basic { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            Some(Credentials::ApiKey(key)) => {
                builder.header("Authorization", format!("ApiKey {key}"))
            }
            None => builder,
        };

        builder = match &request.body {
            Some(WireBody::Json(body)) => builder.json(body),
            Some(WireBody::NdJson(body)) => builder
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(body.clone()),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| self.classify(e))?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(WireResponse { status, body })
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}
