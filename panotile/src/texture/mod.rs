//! Tile imagery as handed to renderers.
//!
//! - [`TileImage`]: decoded pixels tagged as authoritative, partial or empty
//! - [`TextureFactory`] / [`TextureRegistry`]: renderer-owned texture handles
//! - [`placeholder`]: the shared transparent image for missing tiles

pub mod placeholder;
mod registry;
mod tile_image;

pub use registry::{TextureFactory, TextureHandle, TextureRegistry};
pub use tile_image::{TileImage, TileKind};
