//! Tile file systems: where tiles, posters and descriptors live.
//!
//! A [`TileFileSystem`] maps a tile coordinate to a fetchable URL. Three
//! layouts are supported:
//!
//! - [`FolderFileSystem`]: one file per tile under `{zoom}/{x}_{y}{suffix}`
//! - [`ArchiveFileSystem`]: a single packed file addressed by byte ranges
//! - [`DeepZoomFileSystem`]: the Deep Zoom (DZI) layout
//!
//! Loading a descriptor is the only fallible step. A malformed descriptor or
//! archive header aborts setup with a [`DescriptorError`].

mod archive;
mod descriptor;
mod dzi;
mod folder;

pub use archive::ArchiveFileSystem;
pub use descriptor::{Descriptor, DescriptorError};
pub use dzi::DeepZoomFileSystem;
pub use folder::FolderFileSystem;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::loader::{BoxFuture, ResourceLoader};

/// Maps tile coordinates to resource URLs.
pub trait TileFileSystem: Send + Sync {
    /// Scope every subsequent path under `prefix` (used for cube faces).
    fn set_prefix(&mut self, prefix: Option<&str>);

    /// Fetch and parse the image descriptor.
    ///
    /// Adapters that need extra state to build URLs (archive index, DZI zoom
    /// offset) capture it here, so this must complete before any URL is built.
    fn load_descriptor<'a>(
        &'a mut self,
        loader: &'a ResourceLoader,
    ) -> BoxFuture<'a, Result<Descriptor, DescriptorError>>;

    /// URL of the tile at `(x, y)` on zoom level `zoom` (0 = full resolution).
    fn image_url(&self, x: i64, y: i64, zoom: i32) -> String;

    /// URL of the low-resolution poster image.
    fn poster_url(&self) -> String;
}

/// Supported file system layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileSystemKind {
    #[default]
    Folder,
    Archive,
    DeepZoom,
}

impl FromStr for FileSystemKind {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "folder" => Ok(Self::Folder),
            "archive" => Ok(Self::Archive),
            "dzi" => Ok(Self::DeepZoom),
            other => Err(DescriptorError::UnknownFileSystem(other.to_string())),
        }
    }
}

impl fmt::Display for FileSystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Folder => write!(f, "folder"),
            Self::Archive => write!(f, "archive"),
            Self::DeepZoom => write!(f, "dzi"),
        }
    }
}

/// An initialized file system together with its descriptor.
#[derive(Clone)]
pub struct TileSource {
    pub file_system: Arc<dyn TileFileSystem>,
    pub descriptor: Descriptor,
}

impl fmt::Debug for TileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileSource")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Build a file system of the given kind and load its descriptor.
///
/// # Arguments
///
/// * `kind` - File system layout
/// * `base_path` - Base URL of the image
/// * `prefix` - Optional sub-path (e.g. `face_f` for a cube face)
/// * `loader` - Loader used for descriptor and index requests
///
/// # Errors
///
/// Returns [`DescriptorError`] when the descriptor, archive header or index
/// cannot be fetched or parsed.
pub async fn open_file_system(
    kind: FileSystemKind,
    base_path: &str,
    prefix: Option<&str>,
    loader: &ResourceLoader,
) -> Result<TileSource, DescriptorError> {
    let mut file_system: Box<dyn TileFileSystem> = match kind {
        FileSystemKind::Folder => Box::new(FolderFileSystem::new(base_path)),
        FileSystemKind::Archive => Box::new(ArchiveFileSystem::new(base_path)),
        FileSystemKind::DeepZoom => Box::new(DeepZoomFileSystem::new(base_path)),
    };
    file_system.set_prefix(prefix);
    let descriptor = file_system.load_descriptor(loader).await?;

    info!(
        kind = %kind,
        base = %base_path,
        prefix = prefix.unwrap_or(""),
        width = descriptor.width,
        height = descriptor.height,
        tile_size = descriptor.tile_size,
        "Descriptor loaded"
    );

    Ok(TileSource {
        file_system: Arc::from(file_system),
        descriptor,
    })
}

/// Render an optional prefix as a path segment with a trailing slash.
pub(crate) fn prefix_segment(prefix: Option<&str>) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{}/", p),
        _ => String::new(),
    }
}
