//! Flat zoomable image layer.
//!
//! A [`TileLayer`] lays out the tiles of one pyramid level so that a given
//! image point sits in the center of the viewport. Zoom is continuous: `0`
//! shows the image at full resolution, `-1` at half size, and so on. The
//! tile level is chosen so that no tile is stretched by more than the
//! maximum texture magnification.

use tracing::trace;

use crate::cache::ImageTileCache;
use crate::texture::TileImage;

/// One tile positioned in viewport pixels.
#[derive(Debug, Clone)]
pub struct TilePlacement {
    pub tile_x: i64,
    pub tile_y: i64,
    pub zoom: i32,
    /// Left edge in viewport pixels.
    pub x: f64,
    /// Top edge in viewport pixels.
    pub y: f64,
    /// Edge length in viewport pixels.
    pub size: f64,
    pub image: TileImage,
}

/// Tiled view of a flat image.
pub struct TileLayer {
    cache: ImageTileCache,
    width: f64,
    height: f64,
    max_texture_magnification: f64,
    device_pixel_ratio: f64,
}

impl TileLayer {
    pub fn new(cache: ImageTileCache, width: f64, height: f64) -> Self {
        Self {
            cache,
            width,
            height,
            max_texture_magnification: 1.0,
            device_pixel_ratio: 1.0,
        }
    }

    pub fn with_magnification(mut self, max_texture_magnification: f64, device_pixel_ratio: f64) -> Self {
        self.max_texture_magnification = max_texture_magnification;
        self.device_pixel_ratio = device_pixel_ratio;
        self
    }

    pub fn cache(&self) -> &ImageTileCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ImageTileCache {
        &mut self.cache
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    /// Allowed texture stretch as a zoom offset.
    fn stretch(&self) -> f64 {
        (self.max_texture_magnification / self.device_pixel_ratio).log2()
    }

    /// Pyramid level used to display the image at `zoom`.
    pub fn zoom_level(&self, zoom: f64) -> i32 {
        let min_zoom = f64::from(self.cache.source().descriptor.min_zoom);
        let zoom_with_stretch = (zoom - self.stretch()).max(min_zoom);
        zoom_with_stretch.ceil().min(0.0) as i32
    }

    /// Declare the tile grid of `level` to the cache.
    pub fn update_max_tiles(&mut self, level: i32) {
        let descriptor = &self.cache.source().descriptor;
        let scale = 2f64.powi(level);
        let tile_size = f64::from(descriptor.tile_size);
        let max_x = (scale * f64::from(descriptor.width) / tile_size).ceil() as i64;
        let max_y = (scale * f64::from(descriptor.height) / tile_size).ceil() as i64;
        self.cache.set_max_tiles(max_x, max_y);
    }

    /// Place the tiles covering the viewport.
    ///
    /// `(center_x, center_y)` is the image point, in full-resolution pixels,
    /// that appears in the middle of the viewport.
    pub fn layout(&mut self, center_x: f64, center_y: f64, zoom: f64) -> Vec<TilePlacement> {
        let level = self.zoom_level(zoom);
        self.update_max_tiles(level);
        self.cache.reset_used();

        let tile_size = f64::from(self.cache.source().descriptor.tile_size);
        let tile_real = tile_size / 2f64.powi(level);
        let display = tile_size * (zoom - f64::from(level)).exp2();
        let size = display.ceil();

        let (x0, tx0, cols) = Self::axis(center_x, self.width, tile_real, display);
        let (y0, ty0, rows) = Self::axis(center_y, self.height, tile_real, display);

        let mut placements = Vec::new();
        for row in 0..rows {
            let y = y0 + row as f64 * size;
            if y + size <= 0.0 || y >= self.height {
                continue;
            }
            for col in 0..cols {
                let x = x0 + col as f64 * size;
                if x + size <= 0.0 || x >= self.width {
                    continue;
                }
                let (tile_x, tile_y) = (tx0 + col, ty0 + row);
                let image = self.cache.get_texture(tile_x, tile_y, level);
                placements.push(TilePlacement {
                    tile_x,
                    tile_y,
                    zoom: level,
                    x,
                    y,
                    size,
                    image,
                });
            }
        }

        trace!(level, tiles = placements.len(), "Layer laid out");
        placements
    }

    /// First slot position, first tile index and slot count along one axis.
    fn axis(center: f64, extent: f64, tile_real: f64, display: f64) -> (f64, i64, i64) {
        let top_left = center / tile_real - (extent / 2.0) / display;
        let first = top_left.floor();
        let offset = ((top_left - first) * display).round();
        let count = (extent / display).ceil() as i64 + 2;
        (-offset - display, first as i64 - 1, count)
    }

    /// Apply settled fetches. Returns `true` when the layer should redraw.
    pub fn process_completions(&mut self) -> bool {
        self.cache.process_completions()
    }

    pub async fn settle(&mut self) {
        self.cache.settle().await;
    }

    pub fn dispose(&mut self) {
        self.cache.dispose();
    }
}
