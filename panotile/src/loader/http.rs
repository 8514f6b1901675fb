//! HTTP client abstraction for testability.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;

use super::error::FetchError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for asynchronous HTTP GET requests.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    ///
    /// # Returns
    ///
    /// The response body or an error.
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>>;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for ReqwestClient {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(async move {
            let response =
                self.client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| FetchError::Transport {
                        url: url.to_string(),
                        message: e.to_string(),
                    })?;

            if !response.status().is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: response.status().as_u16(),
                });
            }

            response.bytes().await.map_err(|e| FetchError::Body {
                url: url.to_string(),
                message: e.to_string(),
            })
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    /// Mock HTTP client serving canned responses by URL.
    ///
    /// Unknown URLs answer with HTTP 404. Every request is counted, and an
    /// optional delay keeps requests in flight long enough to observe
    /// de-duplication.
    #[derive(Default)]
    pub struct MockHttpClient {
        responses: Mutex<HashMap<String, Result<Bytes, FetchError>>>,
        hits: Mutex<HashMap<String, usize>>,
        total: AtomicUsize,
        delay: Option<Duration>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn respond(&self, url: &str, body: impl Into<Bytes>) {
            self.responses
                .lock()
                .insert(url.to_string(), Ok(body.into()));
        }

        pub fn fail(&self, url: &str, error: FetchError) {
            self.responses.lock().insert(url.to_string(), Err(error));
        }

        pub fn hits(&self, url: &str) -> usize {
            self.hits.lock().get(url).copied().unwrap_or(0)
        }

        pub fn total_hits(&self) -> usize {
            self.total.load(Ordering::SeqCst)
        }
    }

    impl AsyncHttpClient for MockHttpClient {
        fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
            Box::pin(async move {
                *self.hits.lock().entry(url.to_string()).or_default() += 1;
                self.total.fetch_add(1, Ordering::SeqCst);
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                self.responses
                    .lock()
                    .get(url)
                    .cloned()
                    .unwrap_or_else(|| {
                        Err(FetchError::Status {
                            url: url.to_string(),
                            status: 404,
                        })
                    })
            })
        }
    }

    #[tokio::test]
    async fn test_mock_client_success() {
        let mock = MockHttpClient::new();
        mock.respond("http://example.com/a", vec![1, 2, 3, 4]);

        let result = mock.get("http://example.com/a").await;
        assert_eq!(result.unwrap().as_ref(), &[1, 2, 3, 4]);
        assert_eq!(mock.hits("http://example.com/a"), 1);
    }

    #[tokio::test]
    async fn test_mock_client_unknown_url_is_404() {
        let mock = MockHttpClient::new();
        let result = mock.get("http://example.com/missing").await;
        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestClient::with_timeout(5).is_ok());
    }
}
