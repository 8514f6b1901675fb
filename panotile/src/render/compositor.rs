//! 2D compositing renderer.
//!
//! Every quad becomes an image plus an affine transform that maps the unit
//! square onto the quad's projected top-left, top-right and bottom-left
//! corners. A quad with one of those corners behind the camera cannot be
//! expressed that way and is dropped for the frame.

use glam::{DAffine2, DVec2, DVec3};
use tracing::trace;

use super::{Camera, Projection, Renderer, Viewport};
use crate::cache::{ImageCacheConfig, ImageVrTileCache};
use crate::face::FaceQuad;
use crate::filesystem::TileSource;
use crate::loader::ResourceLoader;
use crate::texture::TileImage;

/// One tile image placed on screen.
#[derive(Debug, Clone)]
pub struct CompositedQuad {
    /// Maps unit-square image coordinates to viewport pixels.
    pub transform: DAffine2,
    pub image: TileImage,
}

impl CompositedQuad {
    /// Viewport position of an image-relative point (`0..1` on both axes).
    pub fn map(&self, s: f64, t: f64) -> DVec2 {
        self.transform.transform_point2(DVec2::new(s, t))
    }
}

/// Everything composited during one frame.
#[derive(Debug, Clone, Default)]
pub struct CompositorFrame {
    pub quads: Vec<CompositedQuad>,
    /// Quads dropped because a reference corner did not project.
    pub clipped: usize,
    pub camera: Option<Camera>,
}

/// Renders faces as transformed tile images.
pub struct CompositorRenderer {
    cache_config: ImageCacheConfig,
    projection: Projection,
    camera: Camera,
    current: CompositorFrame,
    last: CompositorFrame,
    frames: u64,
}

impl CompositorRenderer {
    pub fn new(viewport: Viewport) -> Self {
        Self::with_cache_config(viewport, ImageCacheConfig::default())
    }

    pub fn with_cache_config(viewport: Viewport, cache_config: ImageCacheConfig) -> Self {
        let camera = Camera::default();
        Self {
            cache_config,
            projection: Projection::new(&camera, viewport),
            camera,
            current: CompositorFrame::default(),
            last: CompositorFrame::default(),
            frames: 0,
        }
    }

    pub fn last_frame(&self) -> &CompositorFrame {
        &self.last
    }

    /// Affine transform for `quad`, if its reference corners project.
    pub fn quad_transform(&self, quad: &FaceQuad) -> Option<DAffine2> {
        let origin = self.projection.project(quad.top_left)?;
        let right = self.projection.project(quad.top_left + quad.u)?;
        let down = self.projection.project(quad.top_left + quad.v)?;
        Some(DAffine2::from_cols(right - origin, down - origin, origin))
    }
}

impl Renderer for CompositorRenderer {
    type Cache = ImageVrTileCache;

    fn create_tile_cache(&self, source: TileSource, loader: ResourceLoader) -> ImageVrTileCache {
        ImageVrTileCache::new(source, loader, self.cache_config.clone())
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
        self.current = CompositorFrame {
            camera: Some(*camera),
            ..Default::default()
        };
    }

    fn project(&self, point: DVec3) -> Option<DVec2> {
        self.projection.project(point)
    }

    fn add_quad(&mut self, quad: &FaceQuad, texture: TileImage) {
        match self.quad_transform(quad) {
            Some(transform) => self.current.quads.push(CompositedQuad {
                transform,
                image: texture,
            }),
            None => self.current.clipped += 1,
        }
    }

    fn end_frame(&mut self) {
        self.frames += 1;
        trace!(
            frame = self.frames,
            quads = self.current.quads.len(),
            clipped = self.current.clipped,
            "Compositor frame complete"
        );
        self.last = std::mem::take(&mut self.current);
    }

    fn frames(&self) -> u64 {
        self.frames
    }
}
