//! Renderer backends.
//!
//! The face subdivider only needs to project points and emit textured quads,
//! so both backends sit behind [`Renderer`]:
//!
//! - [`MeshRenderer`]: immediate-mode 3D. Quads become four-vertex meshes
//!   textured with handles from a [`TextureRegistry`](crate::texture::TextureRegistry).
//! - [`CompositorRenderer`]: 2D compositing. Quads become affine transforms
//!   applied to decoded tile images.
//!
//! Each backend also picks the tile cache flavor its textures come from.

mod compositor;
mod mesh;
mod projection;

pub use compositor::{CompositedQuad, CompositorFrame, CompositorRenderer};
pub use mesh::{Mesh, MeshFrame, MeshRenderer, QUAD_INDICES, QUAD_TEX_COORDS};
pub use projection::{Camera, Projection, TransformOffsets, Viewport, FAR_PLANE, NEAR_PLANE};

use std::fmt;
use std::str::FromStr;

use glam::{DVec2, DVec3};

use crate::cache::FaceTileCache;
use crate::face::FaceQuad;
use crate::filesystem::TileSource;
use crate::loader::ResourceLoader;

/// Backend that draws the quads produced by face subdivision.
pub trait Renderer: Send {
    /// Tile cache supplying this backend's textures.
    type Cache: FaceTileCache;

    /// Create the tile cache for one face.
    fn create_tile_cache(&self, source: TileSource, loader: ResourceLoader) -> Self::Cache;

    fn viewport(&self) -> Viewport;

    fn resize(&mut self, viewport: Viewport);

    /// Start a frame for `camera`. Projections use this camera until the
    /// next call.
    fn begin_frame(&mut self, camera: &Camera);

    /// Project a world point to viewport pixels, or `None` when it is behind
    /// the camera.
    fn project(&self, point: DVec3) -> Option<DVec2>;

    /// Add a textured quad to the current frame.
    fn add_quad(&mut self, quad: &FaceQuad, texture: <Self::Cache as FaceTileCache>::Texture);

    fn end_frame(&mut self);

    /// Number of frames completed.
    fn frames(&self) -> u64;
}

/// Renderer backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RendererKind {
    #[default]
    Mesh,
    Compositor,
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RendererKind::Mesh => write!(f, "mesh"),
            RendererKind::Compositor => write!(f, "compositor"),
        }
    }
}

impl FromStr for RendererKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mesh" | "webgl" => Ok(RendererKind::Mesh),
            "compositor" | "css" => Ok(RendererKind::Compositor),
            other => Err(format!("unknown renderer '{}'", other)),
        }
    }
}
