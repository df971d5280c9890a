//! Error types for index operations.

use serde_json::Value;

/// Errors returned by the search index client.
///
/// [`IndexError::is_transient`] separates failures worth retrying from those
/// that will fail the same way again.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndexError {
    /// A pooled connection or a response did not arrive in time.
    #[error("timed out {operation} after {after_ms}ms")]
    Timeout {
        /// What was being waited for.
        operation: String,
        /// The timeout that elapsed, in milliseconds.
        after_ms: u64,
    },

    /// The index host could not be reached.
    #[error("connection refused by {endpoint}: {reason}")]
    ConnectionRefused {
        /// Base URL of the index.
        endpoint: String,
        /// Transport-level description.
        reason: String,
    },

    /// The index rejected the credentials.
    #[error("authentication failed (HTTP {status})")]
    AuthFailure {
        /// HTTP status returned (401 or 403).
        status: u16,
    },

    /// The index rejected the request body.
    #[error("malformed query: {reason}")]
    MalformedQuery {
        /// Reason reported by the index.
        reason: String,
    },

    /// The index is overloaded or temporarily down.
    #[error("index unavailable (HTTP {status}): {reason}")]
    Unavailable {
        /// HTTP status returned.
        status: u16,
        /// Reason reported by the index.
        reason: String,
    },

    /// The index or document does not exist.
    #[error("not found: {reason}")]
    NotFound {
        /// Reason reported by the index.
        reason: String,
    },

    /// Some documents of a bulk request were rejected.
    #[error("bulk request rejected {failed} of {total} documents: {first_reason}")]
    BulkRejected {
        /// Number of rejected documents.
        failed: usize,
        /// Number of documents sent.
        total: usize,
        /// Reason for the first rejection.
        first_reason: String,
    },

    /// Any other response the client does not understand.
    #[error("unexpected index response{}: {reason}", status_suffix(.status))]
    Unexpected {
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Description of the failure.
        reason: String,
    },

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// A successful response did not have the expected shape.
    #[error("cannot decode index response: {reason}")]
    Decode {
        /// What was missing or malformed.
        reason: String,
    },
}

impl IndexError {
    /// Returns `true` for failures that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IndexError::Timeout { .. }
                | IndexError::ConnectionRefused { .. }
                | IndexError::Unavailable { .. }
        )
    }

    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16, body: &Value) -> Self {
        let reason = error_reason(body);
        match status {
            401 | 403 => IndexError::AuthFailure { status },
            400 => IndexError::MalformedQuery { reason },
            404 => IndexError::NotFound { reason },
            429 | 502 | 503 | 504 => IndexError::Unavailable { status, reason },
            _ => IndexError::Unexpected {
                status: Some(status),
                reason,
            },
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Extracts the most specific reason from an error body.
fn error_reason(body: &Value) -> String {
    let error = &body["error"];
    if let Some(reason) = error["root_cause"][0]["reason"].as_str() {
        return reason.to_string();
    }
    if let Some(reason) = error["reason"].as_str() {
        return reason.to_string();
    }
    if let Some(reason) = error.as_str() {
        return reason.to_string();
    }
    match body {
        Value::Null => "empty response".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
