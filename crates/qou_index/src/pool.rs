//! Bounded pool of outbound request slots.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::IndexError;

/// Limits the number of requests in flight to the index.
///
/// Each request holds a permit for its whole lifetime; dropping the permit,
/// including on cancellation, returns the slot.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    permits: Arc<Semaphore>,
    capacity: usize,
    wait: Duration,
}

impl ConnectionPool {
    /// Creates a pool of `capacity` slots; acquiring waits at most `wait`.
    pub fn new(capacity: usize, wait: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            wait,
        }
    }

    /// Waits for a free slot, failing with [`IndexError::Timeout`] after the
    /// configured wait.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, IndexError> {
        match tokio::time::timeout(self.wait, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(IndexError::Unexpected {
                status: None,
                reason: "connection pool closed".to_string(),
            }),
            Err(_) => Err(IndexError::Timeout {
                operation: "waiting for a pooled connection".to_string(),
                after_ms: self.wait.as_millis() as u64,
            }),
        }
    }

    /// Number of free slots.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permits_return_on_drop() {
        let pool = ConnectionPool::new(2, Duration::from_millis(50));
        let a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);
        drop(a);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn exhausted_pool_times_out() {
        let pool = ConnectionPool::new(1, Duration::from_millis(20));
        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, IndexError::Timeout { after_ms: 20, .. }));
    }
}
