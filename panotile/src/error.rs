//! Top-level error type for viewer setup.

use thiserror::Error;

use crate::config::ConfigError;
use crate::filesystem::DescriptorError;
use crate::loader::FetchError;

/// Errors that abort opening an image or panorama.
///
/// Fetch failures during rendering never surface here; the caches absorb
/// them and keep showing fallback imagery.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A cube panorama was given the wrong number of face sources.
    #[error("Expected {expected} cube faces, got {found}")]
    FaceCount { expected: usize, found: usize },
}
