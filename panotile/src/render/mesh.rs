//! Immediate-mode mesh renderer.

use std::sync::Arc;

use glam::{DVec2, DVec3};
use tracing::trace;

use super::{Camera, Projection, Renderer, Viewport};
use crate::cache::{FaceTexture, TextureCacheConfig, TextureTileCache};
use crate::face::FaceQuad;
use crate::filesystem::TileSource;
use crate::loader::ResourceLoader;
use crate::texture::{TextureHandle, TextureRegistry};

/// Texture coordinates of a quad's four vertices.
pub const QUAD_TEX_COORDS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// Two triangles covering a quad.
pub const QUAD_INDICES: [u16; 6] = [0, 2, 1, 0, 3, 2];

/// One textured quad as four world-space vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Top-left, top-right, bottom-right, bottom-left.
    pub positions: [DVec3; 4],
    pub texture: TextureHandle,
}

impl Mesh {
    fn from_quad(quad: &FaceQuad, texture: TextureHandle) -> Self {
        let p = quad.top_left;
        Self {
            positions: [p, p + quad.u, p + quad.u + quad.v, p + quad.v],
            texture,
        }
    }
}

/// Everything submitted during one frame.
#[derive(Debug, Clone, Default)]
pub struct MeshFrame {
    pub meshes: Vec<Mesh>,
    /// Quads dropped because no texture was available yet.
    pub skipped: usize,
    pub camera: Option<Camera>,
}

/// Renders faces as textured meshes.
///
/// Textures live in a shared [`TextureRegistry`]; the last completed frame is
/// kept for inspection.
pub struct MeshRenderer {
    registry: TextureRegistry,
    cache_config: TextureCacheConfig,
    projection: Projection,
    camera: Camera,
    current: MeshFrame,
    last: MeshFrame,
    frames: u64,
}

impl MeshRenderer {
    pub fn new(viewport: Viewport) -> Self {
        Self::with_cache_config(viewport, TextureCacheConfig::default())
    }

    pub fn with_cache_config(viewport: Viewport, cache_config: TextureCacheConfig) -> Self {
        let camera = Camera::default();
        Self {
            registry: TextureRegistry::new(),
            cache_config,
            projection: Projection::new(&camera, viewport),
            camera,
            current: MeshFrame::default(),
            last: MeshFrame::default(),
            frames: 0,
        }
    }

    pub fn registry(&self) -> &TextureRegistry {
        &self.registry
    }

    /// The most recently completed frame.
    pub fn last_frame(&self) -> &MeshFrame {
        &self.last
    }
}

impl Renderer for MeshRenderer {
    type Cache = TextureTileCache;

    fn create_tile_cache(&self, source: TileSource, loader: ResourceLoader) -> TextureTileCache {
        TextureTileCache::new(
            source,
            loader,
            Arc::new(self.registry.clone()),
            self.cache_config.clone(),
        )
    }

    fn viewport(&self) -> Viewport {
        self.projection.viewport()
    }

    fn resize(&mut self, viewport: Viewport) {
        self.projection = Projection::new(&self.camera, viewport);
    }

    fn begin_frame(&mut self, camera: &Camera) {
        self.camera = *camera;
        self.projection = Projection::new(camera, self.projection.viewport());
        self.current = MeshFrame {
            camera: Some(*camera),
            ..Default::default()
        };
    }

    fn project(&self, point: DVec3) -> Option<DVec2> {
        self.projection.project(point)
    }

    fn add_quad(&mut self, quad: &FaceQuad, texture: FaceTexture) {
        match texture {
            Some(handle) => self.current.meshes.push(Mesh::from_quad(quad, handle)),
            None => self.current.skipped += 1,
        }
    }

    fn end_frame(&mut self) {
        self.frames += 1;
        trace!(
            frame = self.frames,
            meshes = self.current.meshes.len(),
            skipped = self.current.skipped,
            "Mesh frame complete"
        );
        self.last = std::mem::take(&mut self.current);
    }

    fn frames(&self) -> u64 {
        self.frames
    }
}
