use thiserror::Error;

/// Errors raised while fetching or decoding a resource.
///
/// These never cross the cache boundary. The loader logs them and resolves
/// the request to "no data".
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    /// The request could not be sent or the connection failed.
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The response body could not be read.
    #[error("Failed to read response from {url}: {message}")]
    Body { url: String, message: String },

    /// The body is not a decodable image. Never retried.
    #[error("Failed to decode image from {url}: {message}")]
    Decode { url: String, message: String },

    /// A text resource is not valid UTF-8.
    #[error("Response from {url} is not valid UTF-8")]
    Utf8 { url: String },

    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Status { .. } | Self::Body { .. }
        )
    }
}
