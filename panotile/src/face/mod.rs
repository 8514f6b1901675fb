//! Cube faces of a panorama.
//!
//! Each [`VrFace`] owns the tile cache for one side of the cube and turns the
//! current camera pose into textured quads through [`subdivide`].

mod subdivide;

pub use subdivide::{max_divisions, subdivide, FaceQuad, SubdivisionParams};

use glam::DVec3;
use tracing::trace;

use crate::cache::FaceTileCache;
use crate::render::Renderer;

/// Edge length of the cube in world units.
pub const CUBE_SIZE: f64 = 2.0;

/// Placement of one cube face in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeFace {
    /// Single-letter face name, also used for the `face_{key}` tile prefix.
    pub key: &'static str,
    pub top_left: DVec3,
    pub u: DVec3,
    pub v: DVec3,
}

impl CubeFace {
    /// File system prefix holding this face's tiles.
    pub fn prefix(&self) -> String {
        format!("face_{}", self.key)
    }
}

/// The six faces in rendering order: front, back, left, right, up, down.
pub const CUBE_FACES: [CubeFace; 6] = [
    CubeFace {
        key: "f",
        top_left: DVec3::new(-1.0, 1.0, -1.0),
        u: DVec3::new(1.0, 0.0, 0.0),
        v: DVec3::new(0.0, -1.0, 0.0),
    },
    CubeFace {
        key: "b",
        top_left: DVec3::new(1.0, 1.0, 1.0),
        u: DVec3::new(-1.0, 0.0, 0.0),
        v: DVec3::new(0.0, -1.0, 0.0),
    },
    CubeFace {
        key: "l",
        top_left: DVec3::new(-1.0, 1.0, 1.0),
        u: DVec3::new(0.0, 0.0, -1.0),
        v: DVec3::new(0.0, -1.0, 0.0),
    },
    CubeFace {
        key: "r",
        top_left: DVec3::new(1.0, 1.0, -1.0),
        u: DVec3::new(0.0, 0.0, 1.0),
        v: DVec3::new(0.0, -1.0, 0.0),
    },
    CubeFace {
        key: "u",
        top_left: DVec3::new(-1.0, 1.0, 1.0),
        u: DVec3::new(1.0, 0.0, 0.0),
        v: DVec3::new(0.0, 0.0, -1.0),
    },
    CubeFace {
        key: "d",
        top_left: DVec3::new(-1.0, -1.0, -1.0),
        u: DVec3::new(1.0, 0.0, 0.0),
        v: DVec3::new(0.0, 0.0, 1.0),
    },
];

/// One cube face with its tile cache.
pub struct VrFace<C: FaceTileCache> {
    face: CubeFace,
    cache: C,
    tile_size: u32,
    overlap: u32,
    min_divisions: u32,
    max_divisions: u32,
    max_tesselation: u32,
}

impl<C: FaceTileCache> VrFace<C> {
    /// Create a face whose geometry comes from the cache's descriptor.
    ///
    /// # Arguments
    ///
    /// * `face` - Placement on the cube
    /// * `cache` - Tile cache for this face's tiles
    /// * `max_tesselation` - Depth cap; `None` uses the face's full depth
    pub fn new(face: CubeFace, cache: C, max_tesselation: Option<u32>) -> Self {
        let descriptor = &cache.source().descriptor;
        let tile_size = descriptor.tile_size;
        let overlap = descriptor.overlap;
        let max_divisions = max_divisions(descriptor.width, tile_size, overlap);

        Self {
            face,
            cache,
            tile_size,
            overlap,
            min_divisions: 0,
            max_divisions,
            max_tesselation: max_tesselation.unwrap_or(max_divisions),
        }
    }

    pub fn face(&self) -> &CubeFace {
        &self.face
    }

    pub fn max_divisions(&self) -> u32 {
        self.max_divisions
    }

    pub fn max_tesselation(&self) -> u32 {
        self.max_tesselation
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut C {
        &mut self.cache
    }

    /// Subdivide the face for the renderer's current frame and emit a quad
    /// per visible leaf.
    ///
    /// Returns the number of quads emitted.
    pub fn render<R>(&mut self, renderer: &mut R, magnification: f64, device_pixel_ratio: f64) -> usize
    where
        R: Renderer<Cache = C>,
    {
        let params = SubdivisionParams {
            tile_size: self.tile_size,
            overlap: self.overlap,
            min_divisions: self.min_divisions,
            max_divisions: self.max_divisions,
            max_tesselation: self.max_tesselation,
            magnification,
            device_pixel_ratio,
            viewport: renderer.viewport(),
        };
        let leaves = subdivide(
            &params,
            |p| renderer.project(p),
            self.face.top_left,
            CUBE_SIZE,
            self.face.u,
            self.face.v,
        );

        for quad in &leaves {
            let texture = self.cache.get_texture(quad.tile_x, quad.tile_y, quad.zoom);
            renderer.add_quad(quad, texture);
        }

        trace!(face = self.face.key, quads = leaves.len(), "Face rendered");
        leaves.len()
    }

    /// Finish the frame for this face.
    pub fn end_render(&mut self) {
        self.cache.purge();
    }

    pub fn dispose(&mut self) {
        self.cache.dispose();
    }
}
