//! De-duplicating asynchronous resource loader.
//!
//! The [`ResourceLoader`] fetches tile images and descriptor documents through
//! an [`AsyncHttpClient`]. Concurrent requests for the same URL share one
//! fetch: the first request spawns a task, later ones only queue their
//! callback. When the fetch settles every queued callback fires exactly once,
//! in the order it was queued.
//!
//! # Failure Handling
//!
//! Transient failures are retried according to the configured
//! [`RetryPolicy`]. Once retries are exhausted, or the body is not a
//! decodable image, the callbacks receive `None`. Nothing is remembered about
//! the failure: the next request for the same URL starts a fresh fetch.
//!
//! # Example
//!
//! ```ignore
//! let loader = ResourceLoader::new(client, LoaderConfig::default(), Handle::current());
//! loader.load_image("https://tiles.example.com/0/0_0.jpg", Box::new(|image| {
//!     if let Some(image) = image {
//!         println!("{}x{}", image.width(), image.height());
//!     }
//! }));
//! ```

mod error;
pub mod http;
mod retry;

pub use error::FetchError;
pub use http::{AsyncHttpClient, BoxFuture, ReqwestClient};
pub use retry::{RetryPolicy, DEFAULT_RETRY_STEP_MS};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use image::RgbaImage;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Callback invoked once when an image fetch settles.
pub type ImageCallback = Box<dyn FnOnce(Option<Arc<RgbaImage>>) + Send + 'static>;

/// Configuration for the resource loader.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::None,
            timeout_secs: http::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LoaderConfig {
    /// Build from the `[loader]` section of the config file.
    pub fn from_settings(settings: &crate::config::LoaderSettings) -> Self {
        Self {
            retry: RetryPolicy::linear_with_step(
                settings.max_retries,
                std::time::Duration::from_millis(settings.retry_step_ms),
            ),
            timeout_secs: settings.timeout_secs,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Counters describing loader activity.
#[derive(Debug, Default)]
pub struct LoaderStats {
    requests: AtomicU64,
    fetches: AtomicU64,
    deduplicated: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of [`LoaderStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStatsSnapshot {
    /// Calls to `load_image`.
    pub requests: u64,
    /// Fetches actually started.
    pub fetches: u64,
    /// Requests that joined an in-flight fetch.
    pub deduplicated: u64,
    /// Fetches that settled without an image.
    pub failures: u64,
}

impl LoaderStats {
    pub fn snapshot(&self) -> LoaderStatsSnapshot {
        LoaderStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Fetches and decodes resources, sharing one fetch per URL.
///
/// Cloning is cheap; clones share the in-flight set and statistics.
#[derive(Clone)]
pub struct ResourceLoader {
    client: Arc<dyn AsyncHttpClient>,
    retry: RetryPolicy,
    runtime: Handle,
    in_flight: Arc<Mutex<HashMap<String, Vec<ImageCallback>>>>,
    stats: Arc<LoaderStats>,
}

impl ResourceLoader {
    /// Creates a loader that spawns its fetch tasks on `runtime`.
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for every request
    /// * `config` - Retry configuration
    /// * `runtime` - Handle of the tokio runtime that runs fetch tasks
    pub fn new(client: Arc<dyn AsyncHttpClient>, config: LoaderConfig, runtime: Handle) -> Self {
        Self {
            client,
            retry: config.retry,
            runtime,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(LoaderStats::default()),
        }
    }

    /// Creates a loader backed by [`ReqwestClient`].
    pub fn with_reqwest(config: LoaderConfig, runtime: Handle) -> Result<Self, FetchError> {
        let client = ReqwestClient::with_timeout(config.timeout_secs)?;
        Ok(Self::new(Arc::new(client), config, runtime))
    }

    /// Requests an image, invoking `callback` once the fetch settles.
    ///
    /// Returns `true` if this call started a new fetch, `false` if it joined
    /// one already in flight for the same URL.
    pub fn load_image(&self, url: &str, callback: ImageCallback) -> bool {
        self.stats.requests.fetch_add(1, Ordering::Relaxed);

        {
            let mut in_flight = self.in_flight.lock();
            if let Some(waiting) = in_flight.get_mut(url) {
                waiting.push(callback);
                self.stats.deduplicated.fetch_add(1, Ordering::Relaxed);
                debug!(url = %url, waiting = waiting.len(), "Joined in-flight fetch");
                return false;
            }
            in_flight.insert(url.to_string(), vec![callback]);
        }

        self.stats.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(url = %url, "Fetch issued");

        let url = url.to_string();
        let client = Arc::clone(&self.client);
        let retry = self.retry.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let stats = Arc::clone(&self.stats);

        self.runtime.spawn(async move {
            let image = match fetch_with_retry(client.as_ref(), &retry, &url).await {
                Ok(body) => decode_image(&url, &body),
                Err(e) => Err(e),
            };
            let image = match image {
                Ok(image) => Some(image),
                Err(e) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(url = %url, error = %e, "Image fetch failed");
                    None
                }
            };

            let callbacks = in_flight.lock().remove(&url).unwrap_or_default();
            for callback in callbacks {
                callback(image.clone());
            }
        });

        true
    }

    /// Fetches a text document, retrying transient failures.
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let body = self.fetch_bytes(url).await?;
        String::from_utf8(body.to_vec()).map_err(|_| FetchError::Utf8 {
            url: url.to_string(),
        })
    }

    /// Fetches raw bytes, retrying transient failures.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        fetch_with_retry(self.client.as_ref(), &self.retry, url).await
    }

    /// Whether a fetch for `url` is outstanding.
    pub fn is_loading(&self, url: &str) -> bool {
        self.in_flight.lock().contains_key(url)
    }

    /// Number of distinct URLs with an outstanding fetch.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn stats(&self) -> LoaderStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }
}

async fn fetch_with_retry(
    client: &dyn AsyncHttpClient,
    retry: &RetryPolicy,
    url: &str,
) -> Result<Bytes, FetchError> {
    let mut attempt = 0;
    loop {
        match client.get(url).await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_transient() => {
                attempt += 1;
                match retry.delay_for_attempt(attempt) {
                    Some(delay) => {
                        debug!(url = %url, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying fetch");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

fn decode_image(url: &str, body: &[u8]) -> Result<Arc<RgbaImage>, FetchError> {
    image::load_from_memory(body)
        .map(|decoded| Arc::new(decoded.to_rgba8()))
        .map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
}

/// Upper bound on how long tests wait for a fetch to settle.
#[cfg(test)]
pub(crate) const TEST_SETTLE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

#[cfg(test)]
pub(crate) fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("png encoding");
    out.into_inner()
}
