//! Retrying requests, with subdivision of batches the server finds too large.

use crate::error::ClientError;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Retry policy for client requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Runs `f`, retrying errors that report themselves retryable.
    pub async fn run<T, F, Fut>(&self, mut f: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut retries = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    tracing::warn!(
                        "Request failed ({}), retry {}/{} in {:?}",
                        e,
                        retries,
                        self.max_retries,
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs `f` over `items`, halving any batch the server rejects as too
    /// large and concatenating the results in input order.
    ///
    /// Other failures are retried up to `max_retries` times per batch. A
    /// batch split in two hands its retry count to both halves.
    ///
    /// ```
    /// use arrowgate_client::{ClientError, RetryPolicy};
    /// use arrowgate_protocol::ErrorCode;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), ClientError> {
    /// let doubled = RetryPolicy::new()
    ///     .run_subdividing((1..=8).collect::<Vec<u32>>(), |batch: Vec<u32>| async move {
    ///         if batch.len() > 2 {
    ///             return Err(ClientError::Server {
    ///                 code: ErrorCode::PayloadTooLarge,
    ///                 message: "batch too large".into(),
    ///                 retryable: false,
    ///             });
    ///         }
    ///         Ok(batch.into_iter().map(|n| n * 2).collect::<Vec<u32>>())
    ///     })
    ///     .await?;
    /// assert_eq!(doubled, vec![2, 4, 6, 8, 10, 12, 14, 16]);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_subdividing<I, T, F, Fut>(
        &self,
        items: Vec<I>,
        f: F,
    ) -> Result<Vec<T>, ClientError>
    where
        I: Clone,
        F: Fn(Vec<I>) -> Fut,
        Fut: Future<Output = Result<Vec<T>, ClientError>>,
    {
        let mut pending: VecDeque<(Vec<I>, u32)> = VecDeque::new();
        pending.push_back((items, 0));
        let mut results = Vec::new();

        while let Some((batch, retries)) = pending.pop_front() {
            match f(batch.clone()).await {
                Ok(out) => results.extend(out),
                Err(e) if e.is_too_large() && batch.len() > 1 => {
                    let mut left = batch;
                    let right = left.split_off(left.len() / 2);
                    tracing::debug!(
                        "Batch too large, splitting into {} + {} items",
                        left.len(),
                        right.len()
                    );
                    pending.push_front((right, retries));
                    pending.push_front((left, retries));
                }
                Err(e) if retries < self.max_retries => {
                    tracing::warn!(
                        "Batch of {} items failed ({}), retry {}/{} in {:?}",
                        batch.len(),
                        e,
                        retries + 1,
                        self.max_retries,
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                    pending.push_front((batch, retries + 1));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrowgate_protocol::ErrorCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn too_large() -> ClientError {
        ClientError::Server {
            code: ErrorCode::PayloadTooLarge,
            message: "too big".into(),
            retryable: false,
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::new().with_delay(Duration::ZERO)
    }

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_run_retries_retryable() {
        let attempts = &AtomicU32::new(0);
        let result = fast()
            .run(|| async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ClientError::Timeout)
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_gives_up() {
        let attempts = &AtomicU32::new(0);
        let result: Result<(), _> = fast()
            .with_max_retries(2)
            .run(|| async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::ConnectionClosed)
            })
            .await;
        assert!(matches!(result, Err(ClientError::ConnectionClosed)));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_does_not_retry_fatal() {
        let attempts = &AtomicU32::new(0);
        let result: Result<(), _> = fast()
            .run(|| async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::NotConnected)
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subdivide_preserves_order() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let seen = batches.clone();

        let items: Vec<u32> = (0..10).collect();
        let out = fast()
            .run_subdividing(items, move |batch: Vec<u32>| {
                let seen = seen.clone();
                async move {
                    if batch.len() > 3 {
                        return Err(too_large());
                    }
                    seen.lock().unwrap().push(batch.len());
                    Ok(batch.into_iter().map(|i| i * 10).collect::<Vec<_>>())
                }
            })
            .await
            .unwrap();

        assert_eq!(out, (0..10).map(|i| i * 10).collect::<Vec<_>>());
        assert!(batches.lock().unwrap().iter().all(|&n| n <= 3));
    }

    #[tokio::test]
    async fn test_subdivide_single_item_too_large() {
        let result = fast()
            .with_max_retries(1)
            .run_subdividing(vec![1u32, 2], |_batch: Vec<u32>| async {
                Err::<Vec<u32>, _>(too_large())
            })
            .await;
        assert!(matches!(result, Err(ClientError::Server { .. })));
    }

    #[tokio::test]
    async fn test_subdivide_retries_other_errors() {
        let attempts = AtomicU32::new(0);
        let out = fast()
            .run_subdividing(vec!["a", "b"], |batch: Vec<&str>| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ClientError::Timeout)
                    } else {
                        Ok(batch)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(out, vec!["a", "b"]);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
