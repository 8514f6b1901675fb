//! Quadtree subdivision of one cube face against the view frustum.
//!
//! Starting from the whole face, each quad is projected to the screen. Quads
//! that miss the viewport are dropped. Visible quads are split into four
//! children while their longest projected edge exceeds the allowed texture
//! stretch and the depth limits permit it. Whatever remains is a leaf that
//! maps to exactly one tile.

use glam::{DVec2, DVec3};

use crate::render::Viewport;

/// Leaf of the face quadtree: one textured quad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceQuad {
    /// World position of the quad's top-left corner.
    pub top_left: DVec3,
    /// Edge vector along the tile's x axis, overlap compensation included.
    pub u: DVec3,
    /// Edge vector along the tile's y axis, overlap compensation included.
    pub v: DVec3,
    pub depth: u32,
    pub tile_x: i64,
    pub tile_y: i64,
    /// Tile zoom level: `depth - max_divisions`.
    pub zoom: i32,
}

/// Limits and thresholds for one subdivision pass.
#[derive(Debug, Clone, Copy)]
pub struct SubdivisionParams {
    pub tile_size: u32,
    pub overlap: u32,
    pub min_divisions: u32,
    pub max_divisions: u32,
    pub max_tesselation: u32,
    /// Maximum texture stretch before finer tiles are required.
    pub magnification: f64,
    pub device_pixel_ratio: f64,
    pub viewport: Viewport,
}

impl SubdivisionParams {
    fn step(&self) -> f64 {
        f64::from(self.tile_size.saturating_sub(self.overlap).max(1))
    }

    fn should_split(&self, depth: u32, edge_pixels: f64) -> bool {
        depth < self.min_divisions
            || (edge_pixels > self.magnification * self.step()
                && depth < self.max_divisions
                && depth < self.max_tesselation)
    }
}

/// Number of halvings from a whole face to single tiles.
///
/// `floor(log2(face_size - overlap) - log2(tile_size - overlap))`, never
/// negative.
pub fn max_divisions(face_size: u32, tile_size: u32, overlap: u32) -> u32 {
    let full = f64::from(face_size.saturating_sub(overlap).max(1)).log2();
    let single = f64::from(tile_size.saturating_sub(overlap).max(1)).log2();
    (full - single).floor().max(0.0) as u32
}

/// Projected corners in order: top-left, top-right, bottom-right, bottom-left.
type Corners = [Option<DVec2>; 4];

/// Whether any part of the projected quad overlaps the viewport.
fn intersects_viewport(corners: &Corners, viewport: Viewport) -> bool {
    let mut points = corners.iter().flatten();
    let Some(first) = points.next() else {
        return false;
    };
    let (min, max) = points.fold((*first, *first), |(min, max), p| (min.min(*p), max.max(*p)));

    let lo = min.max(DVec2::ZERO);
    let hi = max.min(DVec2::new(viewport.width, viewport.height));
    lo.x <= hi.x && lo.y <= hi.y
}

fn screen_distance(a: Option<DVec2>, b: Option<DVec2>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => {
            let d = (a - b).abs();
            d.x.max(d.y)
        }
        _ => 0.0,
    }
}

/// Longest projected edge of the quad.
fn max_edge(corners: &Corners) -> f64 {
    (0..4)
        .map(|i| screen_distance(corners[i], corners[(i + 1) % 4]))
        .fold(0.0, f64::max)
}

/// Subdivide a face and return its visible leaves in traversal order.
///
/// # Arguments
///
/// * `params` - Depth limits, tile geometry and stretch threshold
/// * `project` - World-to-screen projection for the current frame
/// * `top_left` - Face corner
/// * `width` - Face edge length
/// * `u`, `v` - Unit vectors along the face's x and y axes
pub fn subdivide<P>(
    params: &SubdivisionParams,
    project: P,
    top_left: DVec3,
    width: f64,
    u: DVec3,
    v: DVec3,
) -> Vec<FaceQuad>
where
    P: Fn(DVec3) -> Option<DVec2>,
{
    let corners = [
        project(top_left),
        project(top_left + u * width),
        project(top_left + (u + v) * width),
        project(top_left + v * width),
    ];
    let mut walker = Walker {
        params,
        project: &project,
        u,
        v,
        leaves: Vec::new(),
    };
    walker.visit(top_left, width, 0, 0, 0, corners);
    walker.leaves
}

struct Walker<'a, P> {
    params: &'a SubdivisionParams,
    project: &'a P,
    u: DVec3,
    v: DVec3,
    leaves: Vec<FaceQuad>,
}

impl<P> Walker<'_, P>
where
    P: Fn(DVec3) -> Option<DVec2>,
{
    fn visit(&mut self, top_left: DVec3, width: f64, depth: u32, tx: i64, ty: i64, corners: Corners) {
        if !intersects_viewport(&corners, self.params.viewport) {
            return;
        }

        let edge = max_edge(&corners) * self.params.device_pixel_ratio;
        if !self.params.should_split(depth, edge) {
            self.emit(top_left, width, depth, tx, ty);
            return;
        }

        let half = width / 2.0;
        let (u, v) = (self.u, self.v);
        let center = top_left + (u + v) * half;
        let mid_top = top_left + u * half;
        let mid_left = top_left + v * half;

        let p_center = (self.project)(center);
        let p_mid_top = (self.project)(mid_top);
        let p_mid_left = (self.project)(mid_left);
        let p_mid_right = (self.project)(mid_left + u * width);
        let p_mid_bottom = (self.project)(mid_top + v * width);
        let [tl, tr, br, bl] = corners;

        let (cx, cy, d) = (tx * 2, ty * 2, depth + 1);
        self.visit(top_left, half, d, cx, cy, [tl, p_mid_top, p_center, p_mid_left]);
        self.visit(mid_top, half, d, cx + 1, cy, [p_mid_top, tr, p_mid_right, p_center]);
        self.visit(mid_left, half, d, cx, cy + 1, [p_mid_left, p_center, p_mid_bottom, bl]);
        self.visit(center, half, d, cx + 1, cy + 1, [p_center, p_mid_right, br, p_mid_bottom]);
    }

    fn emit(&mut self, top_left: DVec3, width: f64, depth: u32, tx: i64, ty: i64) {
        let step = self.params.step();
        let width = width * f64::from(self.params.tile_size) / step;
        self.leaves.push(FaceQuad {
            top_left,
            u: self.u * width,
            v: self.v * width,
            depth,
            tile_x: tx,
            tile_y: ty,
            zoom: depth as i32 - self.params.max_divisions as i32,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_divisions: u32, magnification: f64) -> SubdivisionParams {
        SubdivisionParams {
            tile_size: 256,
            overlap: 0,
            min_divisions: 0,
            max_divisions,
            max_tesselation: max_divisions,
            magnification,
            device_pixel_ratio: 1.0,
            viewport: Viewport::new(1000.0, 1000.0),
        }
    }

    /// Flat projection of the z = 0 plane: `scale` pixels per world unit.
    fn flat(scale: f64, offset: DVec2) -> impl Fn(DVec3) -> Option<DVec2> {
        move |p| Some(DVec2::new(p.x * scale, -p.y * scale) + offset)
    }

    fn face() -> (DVec3, f64, DVec3, DVec3) {
        (DVec3::new(0.0, 0.0, 0.0), 1.0, DVec3::X, DVec3::NEG_Y)
    }

    #[test]
    fn test_max_divisions() {
        assert_eq!(max_divisions(1024, 256, 0), 2);
        assert_eq!(max_divisions(1000, 256, 0), 1);
        assert_eq!(max_divisions(256, 256, 0), 0);
        assert_eq!(max_divisions(2050, 258, 2), 3);
        assert_eq!(max_divisions(100, 256, 0), 0);
    }

    #[test]
    fn test_small_quad_is_single_leaf() {
        let (tl, w, u, v) = face();
        let leaves = subdivide(&params(2, 1.0), flat(100.0, DVec2::ZERO), tl, w, u, v);
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].zoom, -2);
        assert_eq!((leaves[0].tile_x, leaves[0].tile_y), (0, 0));
    }

    #[test]
    fn test_depth_cap_stops_subdivision() {
        let (tl, w, u, v) = face();
        // 100000 px per unit would ask for far more than two levels.
        let leaves = subdivide(&params(2, 1.0), flat(100_000.0, DVec2::ZERO), tl, w, u, v);
        assert!(!leaves.is_empty());
        assert!(leaves.iter().all(|q| q.depth == 2 && q.zoom == 0));
    }

    #[test]
    fn test_full_split_tile_indices() {
        let (tl, w, u, v) = face();
        // Everything in view: 1 unit = 900 px, stretch threshold 256 px.
        let leaves = subdivide(&params(2, 1.0), flat(900.0, DVec2::new(50.0, 50.0)), tl, w, u, v);
        assert_eq!(leaves.len(), 16);
        let mut indices: Vec<_> = leaves.iter().map(|q| (q.tile_x, q.tile_y)).collect();
        indices.sort();
        let expected: Vec<_> = (0..4).flat_map(|x| (0..4).map(move |y| (x, y))).collect();
        assert_eq!(indices, expected);
    }

    #[test]
    fn test_quad_outside_viewport_emits_nothing() {
        let (tl, w, u, v) = face();
        let leaves = subdivide(
            &params(2, 1.0),
            flat(100.0, DVec2::new(5000.0, 5000.0)),
            tl,
            w,
            u,
            v,
        );
        assert!(leaves.is_empty());
    }

    #[test]
    fn test_quad_behind_camera_emits_nothing() {
        let (tl, w, u, v) = face();
        let leaves = subdivide(&params(2, 1.0), |_| None, tl, w, u, v);
        assert!(leaves.is_empty());
    }

    #[test]
    fn test_min_divisions_forces_split() {
        let (tl, w, u, v) = face();
        let mut p = params(2, 1.0);
        p.min_divisions = 1;
        let leaves = subdivide(&p, flat(10.0, DVec2::ZERO), tl, w, u, v);
        assert_eq!(leaves.len(), 4);
        assert!(leaves.iter().all(|q| q.depth == 1));
    }

    #[test]
    fn test_tesselation_cap() {
        let (tl, w, u, v) = face();
        let mut p = params(3, 1.0);
        p.max_tesselation = 1;
        let leaves = subdivide(&p, flat(100_000.0, DVec2::ZERO), tl, w, u, v);
        assert!(leaves.iter().all(|q| q.depth == 1 && q.zoom == -2));
    }

    #[test]
    fn test_higher_magnification_means_fewer_leaves() {
        let (tl, w, u, v) = face();
        let project = flat(900.0, DVec2::new(50.0, 50.0));
        let sharp = subdivide(&params(2, 1.0), &project, tl, w, u, v);
        let coarse = subdivide(&params(2, 4.0), &project, tl, w, u, v);
        assert!(coarse.len() < sharp.len());
    }

    #[test]
    fn test_overlap_widens_leaf() {
        let (tl, w, u, v) = face();
        let mut p = params(0, 1.0);
        p.tile_size = 258;
        p.overlap = 2;
        let leaves = subdivide(&p, flat(10.0, DVec2::ZERO), tl, w, u, v);
        let expected = 258.0 / 256.0;
        assert!((leaves[0].u.length() - expected).abs() < 1e-12);
        assert!((leaves[0].v.length() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_device_pixel_ratio_scales_edges() {
        let (tl, w, u, v) = face();
        let project = flat(300.0, DVec2::ZERO);
        let low = subdivide(&params(2, 1.0), &project, tl, w, u, v);
        let mut hidpi = params(2, 1.0);
        hidpi.device_pixel_ratio = 2.0;
        let high = subdivide(&hidpi, &project, tl, w, u, v);
        assert!(high.len() > low.len());
    }
}
