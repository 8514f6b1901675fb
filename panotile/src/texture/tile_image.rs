//! Decoded tile pixels tagged with where they came from.

use std::sync::Arc;

use image::RgbaImage;

use super::placeholder::empty_pixels;

/// Provenance of the pixels held by a [`TileImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    /// Fetched tile at its own resolution.
    Authoritative,
    /// Synthesized from a coarser ancestor or the poster while the real tile
    /// is in flight.
    Partial,
    /// Transparent placeholder: nothing better is available.
    Empty,
}

/// A tile image handed out by the caches.
///
/// Pixels are shared behind an [`Arc`]; cloning a `TileImage` shares the same
/// resource. Use [`deep_copy`](TileImage::deep_copy) to obtain a distinct one.
#[derive(Debug, Clone)]
pub struct TileImage {
    pixels: Arc<RgbaImage>,
    kind: TileKind,
}

impl TileImage {
    pub fn authoritative(pixels: Arc<RgbaImage>) -> Self {
        Self {
            pixels,
            kind: TileKind::Authoritative,
        }
    }

    pub fn partial(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
            kind: TileKind::Partial,
        }
    }

    /// The shared transparent placeholder.
    pub fn empty() -> Self {
        Self {
            pixels: empty_pixels(),
            kind: TileKind::Empty,
        }
    }

    pub fn kind(&self) -> TileKind {
        self.kind
    }

    /// Whether this image stands in for a tile that has not arrived.
    pub fn is_partial(&self) -> bool {
        self.kind != TileKind::Authoritative
    }

    pub fn is_empty(&self) -> bool {
        self.kind == TileKind::Empty
    }

    pub fn pixels(&self) -> &Arc<RgbaImage> {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Whether both images share the same underlying pixel buffer.
    pub fn same_resource(&self, other: &TileImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// A copy with its own pixel buffer and the same kind.
    pub fn deep_copy(&self) -> Self {
        Self {
            pixels: Arc::new(self.pixels.as_ref().clone()),
            kind: self.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_kinds() {
        let pixels = Arc::new(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255])));
        assert!(!TileImage::authoritative(pixels).is_partial());
        assert!(TileImage::partial(RgbaImage::new(1, 1)).is_partial());
        assert!(TileImage::empty().is_partial());
        assert!(TileImage::empty().is_empty());
    }

    #[test]
    fn test_deep_copy_is_distinct_resource() {
        let image = TileImage::authoritative(Arc::new(RgbaImage::new(4, 4)));
        let copy = image.deep_copy();
        assert!(!copy.same_resource(&image));
        assert!(image.clone().same_resource(&image));
        assert_eq!(copy.kind(), TileKind::Authoritative);
        assert_eq!(copy.pixels().as_ref(), image.pixels().as_ref());
    }
}
