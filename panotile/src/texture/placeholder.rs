//! Transparent placeholder for tiles with no imagery.
//!
//! Out-of-bounds coordinates and tiles with neither a cached ancestor nor a
//! poster resolve to this image instead of an error, so a frame can always be
//! drawn.
//!
//! # Static Placeholder
//!
//! The 1×1 transparent image is generated once at first access and shared for
//! the lifetime of the process. Every empty tile points at the same buffer.

use std::sync::{Arc, OnceLock};

use image::{Rgba, RgbaImage};

static EMPTY_PIXELS: OnceLock<Arc<RgbaImage>> = OnceLock::new();

/// Generate a fully transparent image of the given size.
pub fn generate_transparent(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]))
}

/// The shared 1×1 transparent pixel buffer.
pub fn empty_pixels() -> Arc<RgbaImage> {
    Arc::clone(EMPTY_PIXELS.get_or_init(|| Arc::new(generate_transparent(1, 1))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pixels_are_shared() {
        assert!(Arc::ptr_eq(&empty_pixels(), &empty_pixels()));
    }

    #[test]
    fn test_empty_pixels_are_transparent() {
        let pixels = empty_pixels();
        assert_eq!(pixels.dimensions(), (1, 1));
        assert_eq!(pixels.get_pixel(0, 0)[3], 0);
    }
}
