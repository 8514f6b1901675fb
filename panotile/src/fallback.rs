//! Provisional imagery for tiles that have not arrived yet.
//!
//! When a tile is missing, the [`FallbackSynthesizer`] walks up the pyramid
//! looking for a cached ancestor. Each step halves the tile coordinates and
//! tracks which quadrant of the parent the original tile occupies, so that
//! once an ancestor is found only the matching sub-rectangle is cropped and
//! scaled up. If the walk reaches the poster's resolution (or the coarsest
//! zoom level) first, the poster is cropped instead.
//!
//! Results are deliberately small (a fraction of the tile size); the renderer
//! stretches them over the tile's footprint.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::cache::key::TileKey;
use crate::filesystem::Descriptor;
use crate::texture::placeholder::generate_transparent;

/// Where a synthesized image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackSource {
    /// Cropped from a cached ancestor tile.
    Ancestor(TileKey),
    /// Cropped from the poster.
    Poster,
    /// Nothing was available.
    None,
}

/// Result of one synthesis attempt.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub image: Option<RgbaImage>,
    pub source: FallbackSource,
    /// Ancestors visited on the way up that are not cached. Requesting them
    /// improves the next synthesis for this and neighbouring tiles.
    pub missing_ancestors: Vec<TileKey>,
}

/// Builds partial tiles from coarser imagery.
#[derive(Debug, Clone)]
pub struct FallbackSynthesizer {
    tile_size: f64,
    /// Distance between the origins of neighbouring tiles, `tile_size - overlap`.
    step: f64,
    image_width: f64,
    min_zoom: i32,
    poster_zoom_level: f64,
    partial_size: u32,
}

impl FallbackSynthesizer {
    /// Create a synthesizer for an image described by `descriptor`.
    ///
    /// # Arguments
    ///
    /// * `descriptor` - Image geometry
    /// * `partial_divisor` - Partial images are `tile_size / partial_divisor`
    ///   pixels square
    pub fn new(descriptor: &Descriptor, partial_divisor: u32) -> Self {
        let partial_size = (descriptor.tile_size / partial_divisor.max(1)).max(1);
        Self {
            tile_size: descriptor.tile_size as f64,
            step: (descriptor.tile_size - descriptor.overlap) as f64,
            image_width: descriptor.width as f64,
            min_zoom: descriptor.min_zoom,
            poster_zoom_level: descriptor.poster_zoom_level(),
            partial_size,
        }
    }

    pub fn partial_size(&self) -> u32 {
        self.partial_size
    }

    /// Synthesize an image for `key`.
    ///
    /// # Arguments
    ///
    /// * `key` - The missing tile
    /// * `lookup` - Returns the authoritative pixels of a cached tile
    /// * `poster` - The poster image, if loaded
    pub fn synthesize<F>(&self, key: TileKey, lookup: F, poster: Option<&RgbaImage>) -> Synthesis
    where
        F: Fn(&TileKey) -> Option<Arc<RgbaImage>>,
    {
        let mut missing_ancestors = Vec::new();

        let (mut x, mut y, mut zoom) = (key.x, key.y, key.zoom);
        let (mut x0, mut y0) = (0.0, 0.0);
        let (mut w, mut h) = (self.tile_size, self.tile_size);

        while !(f64::from(zoom) < self.poster_zoom_level || zoom < self.min_zoom) {
            let current = TileKey::new(x, y, zoom);
            if let Some(source) = lookup(&current) {
                if current != key {
                    if let Some(image) = self.crop(&source, self.tile_size, x0, y0, w, h) {
                        return Synthesis {
                            image: Some(image),
                            source: FallbackSource::Ancestor(current),
                            missing_ancestors,
                        };
                    }
                }
            } else if current != key {
                missing_ancestors.push(current);
            }

            w /= 2.0;
            h /= 2.0;
            x0 /= 2.0;
            y0 /= 2.0;
            if x.rem_euclid(2) == 1 {
                x0 += self.step / 2.0;
            }
            if y.rem_euclid(2) == 1 {
                y0 += self.step / 2.0;
            }
            x = x.div_euclid(2);
            y = y.div_euclid(2);
            zoom -= 1;
        }

        let image = poster.and_then(|poster| self.from_poster(poster, key));
        let source = if image.is_some() {
            FallbackSource::Poster
        } else {
            FallbackSource::None
        };
        Synthesis {
            image,
            source,
            missing_ancestors,
        }
    }

    fn from_poster(&self, poster: &RgbaImage, key: TileKey) -> Option<RgbaImage> {
        let poster_scale = poster.width() as f64 / self.image_width;
        let size_at_zoom = poster_scale * self.step / 2f64.powi(key.zoom);
        let x0 = (size_at_zoom * key.x as f64).floor();
        let y0 = (size_at_zoom * key.y as f64).floor();
        let size = size_at_zoom.floor();
        self.crop(poster, poster.width() as f64, x0, y0, size, size)
    }

    /// Crop `(x0, y0, w, h)`, given in a coordinate space where the source is
    /// `expected_width` wide, and scale it onto a partial-size canvas.
    ///
    /// A crop running past the source edge is clipped and drawn proportionally
    /// smaller, leaving the rest of the canvas transparent.
    fn crop(
        &self,
        source: &RgbaImage,
        expected_width: f64,
        x0: f64,
        y0: f64,
        w: f64,
        h: f64,
    ) -> Option<RgbaImage> {
        let (src_w, src_h) = (source.width() as f64, source.height() as f64);
        let scale = src_w / expected_width;
        let sx = (x0 * scale).floor();
        let sy = (y0 * scale).floor();
        if sx < 0.0 || sy < 0.0 || sx >= src_w || sy >= src_h {
            return None;
        }

        let mut sw = w * scale;
        let mut sh = h * scale;
        let mut dw = self.partial_size as f64;
        let mut dh = self.partial_size as f64;
        if sw <= 0.0 || sh <= 0.0 {
            return None;
        }
        if sx + sw > src_w {
            let full = sw;
            sw = src_w - sx;
            dw *= sw / full;
        }
        if sy + sh > src_h {
            let full = sh;
            sh = src_h - sy;
            dh *= sh / full;
        }

        let cw = (sw.round() as u32).clamp(1, source.width() - sx as u32);
        let ch = (sh.round() as u32).clamp(1, source.height() - sy as u32);
        let dw = (dw.round() as u32).clamp(1, self.partial_size);
        let dh = (dh.round() as u32).clamp(1, self.partial_size);

        let region = imageops::crop_imm(source, sx as u32, sy as u32, cw, ch).to_image();
        let scaled = imageops::resize(&region, dw, dh, FilterType::Triangle);

        let mut canvas = generate_transparent(self.partial_size, self.partial_size);
        imageops::replace(&mut canvas, &scaled, 0, 0);
        Some(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::collections::HashMap;

    fn descriptor() -> Descriptor {
        // 1024x1024 image, 256px tiles: zoom 0 is 4x4 tiles, zoom -2 is one tile.
        Descriptor {
            width: 1024,
            height: 1024,
            tile_size: 256,
            overlap: 0,
            min_zoom: -2,
            poster_size: 128,
            suffix: ".png".to_string(),
        }
    }

    /// 256x256 tile split into four solid-colour quadrants.
    fn quadrant_tile() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_fn(256, 256, |x, y| match (x < 128, y < 128) {
            (true, true) => Rgba([255, 0, 0, 255]),
            (false, true) => Rgba([0, 255, 0, 255]),
            (true, false) => Rgba([0, 0, 255, 255]),
            (false, false) => Rgba([255, 255, 255, 255]),
        }))
    }

    fn no_tiles(_: &TileKey) -> Option<Arc<RgbaImage>> {
        None
    }

    #[test]
    fn test_partial_size() {
        assert_eq!(FallbackSynthesizer::new(&descriptor(), 4).partial_size(), 64);
        assert_eq!(FallbackSynthesizer::new(&descriptor(), 8).partial_size(), 32);
    }

    #[test]
    fn test_nearest_ancestor_wins_over_poster() {
        let synth = FallbackSynthesizer::new(&descriptor(), 4);
        let mut cache = HashMap::new();
        cache.insert(TileKey::new(0, 0, -2), quadrant_tile());
        let poster = RgbaImage::from_pixel(128, 128, Rgba([9, 9, 9, 255]));

        let result = synth.synthesize(TileKey::new(2, 2, 0), |k| cache.get(k).cloned(), Some(&poster));
        assert_eq!(result.source, FallbackSource::Ancestor(TileKey::new(0, 0, -2)));
        // (2,2,0) lies in the bottom-right quadrant of (0,0,-2).
        let image = result.image.unwrap();
        assert_eq!(image.dimensions(), (64, 64));
        assert_eq!(image.get_pixel(32, 32), &Rgba([255, 255, 255, 255]));
        assert_eq!(result.missing_ancestors, vec![TileKey::new(1, 1, -1)]);
    }

    #[test]
    fn test_closer_ancestor_is_preferred() {
        let synth = FallbackSynthesizer::new(&descriptor(), 4);
        let mut cache = HashMap::new();
        cache.insert(TileKey::new(0, 0, -2), quadrant_tile());
        cache.insert(TileKey::new(1, 0, -1), quadrant_tile());

        let result = synth.synthesize(TileKey::new(3, 0, 0), |k| cache.get(k).cloned(), None);
        assert_eq!(result.source, FallbackSource::Ancestor(TileKey::new(1, 0, -1)));
        // (3,0,0) is the top-right quadrant of (1,0,-1).
        assert_eq!(result.image.unwrap().get_pixel(10, 10), &Rgba([0, 255, 0, 255]));
        assert!(result.missing_ancestors.is_empty());
    }

    #[test]
    fn test_poster_fallback_crops_matching_region() {
        let synth = FallbackSynthesizer::new(&descriptor(), 4);
        // Poster is 128px for a 1024px image: tile (1,0,-1) covers x 64..128.
        let poster = RgbaImage::from_fn(128, 128, |x, _| {
            if x < 64 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([200, 100, 50, 255])
            }
        });

        let result = synth.synthesize(TileKey::new(1, 0, -1), no_tiles, Some(&poster));
        assert_eq!(result.source, FallbackSource::Poster);
        let image = result.image.unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([200, 100, 50, 255]));
        assert_eq!(image.get_pixel(63, 63), &Rgba([200, 100, 50, 255]));
        assert_eq!(result.missing_ancestors, vec![TileKey::new(0, 0, -2)]);
    }

    #[test]
    fn test_nothing_available() {
        let synth = FallbackSynthesizer::new(&descriptor(), 4);
        let result = synth.synthesize(TileKey::new(0, 0, 0), no_tiles, None);
        assert_eq!(result.source, FallbackSource::None);
        assert!(result.image.is_none());
    }

    #[test]
    fn test_walk_stops_at_poster_resolution() {
        // Poster as large as the image: no ancestor is ever consulted.
        let mut d = descriptor();
        d.poster_size = 1024;
        let synth = FallbackSynthesizer::new(&d, 4);
        let poster = RgbaImage::from_pixel(1024, 1024, Rgba([1, 2, 3, 255]));

        let result = synth.synthesize(
            TileKey::new(0, 0, -1),
            |_| Some(quadrant_tile()),
            Some(&poster),
        );
        assert_eq!(result.source, FallbackSource::Poster);
        assert!(result.missing_ancestors.is_empty());
    }

    #[test]
    fn test_edge_crop_is_clipped() {
        // 1000px wide image: the right-most zoom-0 tile extends past the poster.
        let mut d = descriptor();
        d.width = 1000;
        d.height = 1000;
        let synth = FallbackSynthesizer::new(&d, 4);
        let poster = RgbaImage::from_pixel(125, 125, Rgba([7, 7, 7, 255]));

        let image = synth
            .synthesize(TileKey::new(3, 3, 0), no_tiles, Some(&poster))
            .image
            .unwrap();
        assert_eq!(image.dimensions(), (64, 64));
        assert_eq!(image.get_pixel(0, 0), &Rgba([7, 7, 7, 255]));
        assert_eq!(image.get_pixel(63, 63)[3], 0);
    }
}
