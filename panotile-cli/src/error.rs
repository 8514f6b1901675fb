//! CLI error type.

use panotile::config::ConfigError;
use panotile::filesystem::DescriptorError;
use panotile::loader::FetchError;
use panotile::ViewerError;
use thiserror::Error;

/// Errors reported to the user before exiting with a non-zero status.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Viewer(#[from] ViewerError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(std::io::Error),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}
