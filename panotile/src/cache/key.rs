//! Tile addressing: cache keys and tile-grid bounds.
//!
//! # Key Format
//!
//! Keys render as `I{x}_{y}_{zoom}` for debuggability, e.g. `I3_5_-2`.
//! Zoom levels are zero or negative: `0` is full resolution, each step down
//! halves the resolution.

use std::fmt;

/// Canonical identity of one tile in the image pyramid.
///
/// Equality is exact. Wrap-around normalization happens in [`TileGrid`]
/// before a key is built, so two keys never alias the same tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub x: i64,
    pub y: i64,
    pub zoom: i32,
}

/// Which quarter of its parent a tile covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quadrant {
    pub right: bool,
    pub bottom: bool,
}

impl TileKey {
    pub fn new(x: i64, y: i64, zoom: i32) -> Self {
        Self { x, y, zoom }
    }

    /// The tile one zoom level coarser that contains this tile, together with
    /// the quadrant of the parent this tile corresponds to.
    pub fn parent(&self) -> (TileKey, Quadrant) {
        let quadrant = Quadrant {
            right: self.x.rem_euclid(2) == 1,
            bottom: self.y.rem_euclid(2) == 1,
        };
        let parent = TileKey {
            x: self.x.div_euclid(2),
            y: self.y.div_euclid(2),
            zoom: self.zoom - 1,
        };
        (parent, quadrant)
    }

    /// The four tiles one zoom level finer that this tile splits into, in
    /// top-left, top-right, bottom-left, bottom-right order.
    pub fn children(&self) -> [TileKey; 4] {
        let (x, y, zoom) = (self.x * 2, self.y * 2, self.zoom + 1);
        [
            TileKey::new(x, y, zoom),
            TileKey::new(x + 1, y, zoom),
            TileKey::new(x, y + 1, zoom),
            TileKey::new(x + 1, y + 1, zoom),
        ]
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I{}_{}_{}", self.x, self.y, self.zoom)
    }
}

/// Valid tile-index bounds for the current zoom configuration.
///
/// A tile is inside the grid when `0 <= x < max_x` and `0 <= y < max_y`.
/// An axis with wrapping enabled folds any index back into range modulo the
/// tile count on that axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub max_x: i64,
    pub max_y: i64,
    pub wrap_x: bool,
    pub wrap_y: bool,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self {
            max_x: 0,
            max_y: 0,
            wrap_x: false,
            wrap_y: false,
        }
    }
}

impl TileGrid {
    /// A grid with the given bounds and no wrapping.
    pub fn new(max_x: i64, max_y: i64) -> Self {
        Self {
            max_x,
            max_y,
            ..Default::default()
        }
    }

    /// A grid large enough that no realistic index falls outside it.
    pub fn unbounded() -> Self {
        Self::new(999_999, 999_999)
    }

    pub fn with_wrap(mut self, wrap_x: bool, wrap_y: bool) -> Self {
        self.wrap_x = wrap_x;
        self.wrap_y = wrap_y;
        self
    }

    /// Normalize wrapped axes and build the key.
    ///
    /// Returns `None` when the (normalized) coordinate lies outside the grid.
    pub fn key(&self, x: i64, y: i64, zoom: i32) -> Option<TileKey> {
        let x = Self::fold(x, self.max_x, self.wrap_x);
        let y = Self::fold(y, self.max_y, self.wrap_y);
        if x < 0 || y < 0 || x >= self.max_x || y >= self.max_y {
            return None;
        }
        Some(TileKey::new(x, y, zoom))
    }

    fn fold(index: i64, count: i64, wrap: bool) -> i64 {
        if wrap && count > 0 {
            index.rem_euclid(count)
        } else {
            index
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_display() {
        assert_eq!(TileKey::new(3, 5, -2).to_string(), "I3_5_-2");
    }

    #[test]
    fn test_parent_tracks_quadrant() {
        let (parent, quadrant) = TileKey::new(5, 2, 0).parent();
        assert_eq!(parent, TileKey::new(2, 1, -1));
        assert!(quadrant.right);
        assert!(!quadrant.bottom);
    }

    #[test]
    fn test_children_round_trip_to_parent() {
        let key = TileKey::new(3, 4, -3);
        for child in key.children() {
            assert_eq!(child.parent().0, key);
        }
    }

    #[test]
    fn test_grid_rejects_out_of_bounds() {
        let grid = TileGrid::new(4, 3);
        assert!(grid.key(-1, 0, 0).is_none());
        assert!(grid.key(4, 0, 0).is_none());
        assert!(grid.key(0, 3, 0).is_none());
        assert_eq!(grid.key(3, 2, 0), Some(TileKey::new(3, 2, 0)));
    }

    #[test]
    fn test_grid_wraps_enabled_axis_only() {
        let grid = TileGrid::new(4, 3).with_wrap(true, false);
        assert_eq!(grid.key(-1, 1, 0), Some(TileKey::new(3, 1, 0)));
        assert_eq!(grid.key(9, 1, 0), Some(TileKey::new(1, 1, 0)));
        assert!(grid.key(1, -1, 0).is_none());
    }

    #[test]
    fn test_empty_grid_has_no_tiles() {
        let grid = TileGrid::default().with_wrap(true, true);
        assert!(grid.key(0, 0, 0).is_none());
    }

    proptest! {
        #[test]
        fn prop_wrapped_keys_are_in_bounds(x in -10_000i64..10_000, y in -10_000i64..10_000, mx in 1i64..64, my in 1i64..64) {
            let grid = TileGrid::new(mx, my).with_wrap(true, true);
            let key = grid.key(x, y, 0).unwrap();
            prop_assert!(key.x >= 0 && key.x < mx);
            prop_assert!(key.y >= 0 && key.y < my);
            prop_assert_eq!((key.x - x).rem_euclid(mx), 0);
        }
    }
}
