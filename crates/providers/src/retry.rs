//! Bounded-retry decorator around a provider.
//!
//! Retries transient failures (rate limits, timeouts, network errors, 5xx)
//! with a fixed backoff between attempts. Permanent failures such as bad
//! credentials are returned immediately.

use async_trait::async_trait;
use openmanus_core::error::ProviderError;
use openmanus_core::provider::{ProviderRequest, ProviderResponse};
use openmanus_core::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Wraps a provider and retries transient failures up to `retries` extra
/// attempts after the first.
pub struct RetryProvider {
    inner: Arc<dyn Provider>,
    retries: u32,
    backoff: Duration,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn Provider>, retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            retries,
            backoff,
        }
    }
}

#[async_trait]
impl Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut attempt = 0u32;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        provider = self.inner.name(),
                        attempt,
                        max = self.retries,
                        error = %e,
                        "Transient provider error, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmanus_core::message::Message;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with a configurable error `failures` times, then succeeds.
    struct FlakyProvider {
        failures: u32,
        calls: AtomicU32,
        error: fn() -> ProviderError,
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok(ProviderResponse {
                    message: Message::assistant("ok"),
                    usage: None,
                    model: "flaky-1".into(),
                })
            }
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            model: "flaky-1".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.0,
            max_tokens: None,
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn retries_transient_errors() {
        let inner = Arc::new(FlakyProvider {
            failures: 2,
            calls: AtomicU32::new(0),
            error: || ProviderError::Timeout("slow".into()),
        });
        let provider = RetryProvider::new(inner.clone(), 3, Duration::from_millis(1));

        let response = provider.complete(request()).await.unwrap();
        assert_eq!(response.message.content, "ok");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let inner = Arc::new(FlakyProvider {
            failures: 10,
            calls: AtomicU32::new(0),
            error: || ProviderError::Network("down".into()),
        });
        let provider = RetryProvider::new(inner.clone(), 2, Duration::from_millis(1));

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
        // Initial attempt plus two retries.
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_fail_fast() {
        let inner = Arc::new(FlakyProvider {
            failures: 10,
            calls: AtomicU32::new(0),
            error: || ProviderError::AuthenticationFailed("bad key".into()),
        });
        let provider = RetryProvider::new(inner.clone(), 5, Duration::from_millis(1));

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
