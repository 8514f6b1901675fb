//! Per-face tile caches for cube-map panoramas.
//!
//! A cube face asks its cache for textures while subdividing and calls
//! [`FaceTileCache::purge`] once its part of the frame is drawn. Each renderer
//! picks the cache flavor matching its texture type.

use super::image_cache::{ImageCacheConfig, ImageTileCache};
use super::key::TileGrid;
use super::texture_cache::TextureTileCache;
use super::CacheStats;
use crate::filesystem::TileSource;
use crate::loader::{BoxFuture, ResourceLoader};
use crate::texture::{TextureHandle, TileImage};

/// Texture source for one cube face.
pub trait FaceTileCache: Send {
    /// What the renderer draws a quad with.
    type Texture: Clone + Send;

    /// Best texture currently available for a tile. Never blocks.
    fn get_texture(&mut self, x: i64, y: i64, zoom: i32) -> Self::Texture;

    /// Called before the face is drawn.
    fn reset_used(&mut self);

    /// Called after the face is drawn.
    fn purge(&mut self);

    /// Apply settled fetches. Returns `true` when new data became visible.
    fn process_completions(&mut self) -> bool;

    /// Wait for every outstanding fetch.
    fn settle(&mut self) -> BoxFuture<'_, ()>;

    fn dispose(&mut self);

    fn stats(&self) -> CacheStats;

    fn source(&self) -> &TileSource;
}

/// Texture returned for a mesh quad: `None` when nothing can be drawn yet.
pub type FaceTexture = Option<TextureHandle>;

impl FaceTileCache for TextureTileCache {
    type Texture = FaceTexture;

    fn get_texture(&mut self, x: i64, y: i64, zoom: i32) -> FaceTexture {
        TextureTileCache::get_texture(self, x, y, zoom)
    }

    fn reset_used(&mut self) {}

    fn purge(&mut self) {
        TextureTileCache::purge(self);
    }

    fn process_completions(&mut self) -> bool {
        TextureTileCache::process_completions(self)
    }

    fn settle(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(TextureTileCache::settle(self))
    }

    fn dispose(&mut self) {
        TextureTileCache::dispose(self);
    }

    fn stats(&self) -> CacheStats {
        TextureTileCache::stats(self)
    }

    fn source(&self) -> &TileSource {
        TextureTileCache::source(self)
    }
}

/// Flat image cache adapted to cube faces.
///
/// Face subdivision only produces valid tile indices, so the grid is made
/// effectively unbounded and never wraps.
pub struct ImageVrTileCache {
    inner: ImageTileCache,
}

impl ImageVrTileCache {
    pub fn new(source: TileSource, loader: ResourceLoader, config: ImageCacheConfig) -> Self {
        let mut inner = ImageTileCache::new(source, loader, config.with_wrap(false, false));
        let grid = TileGrid::unbounded();
        inner.set_max_tiles(grid.max_x, grid.max_y);
        Self { inner }
    }

    pub fn inner(&self) -> &ImageTileCache {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut ImageTileCache {
        &mut self.inner
    }
}

impl FaceTileCache for ImageVrTileCache {
    type Texture = TileImage;

    fn get_texture(&mut self, x: i64, y: i64, zoom: i32) -> TileImage {
        self.inner.get_texture(x, y, zoom)
    }

    fn reset_used(&mut self) {
        self.inner.reset_used();
    }

    fn purge(&mut self) {
        self.inner.reset_used();
        self.inner.purge();
    }

    fn process_completions(&mut self) -> bool {
        self.inner.process_completions()
    }

    fn settle(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(self.inner.settle())
    }

    fn dispose(&mut self) {
        self.inner.dispose();
    }

    fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    fn source(&self) -> &TileSource {
        self.inner.source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::{descriptor, png, source_with, TILE_BASE};
    use crate::loader::http::tests::MockHttpClient;
    use crate::loader::LoaderConfig;
    use std::sync::Arc;
    use tokio::runtime::Handle;

    #[tokio::test]
    async fn test_vr_cache_accepts_any_face_tile() {
        let mock = Arc::new(MockHttpClient::new());
        mock.respond(&format!("{}/0/3_3.png", TILE_BASE), png(256, [9, 9, 9, 255]));
        let loader = ResourceLoader::new(mock, LoaderConfig::default(), Handle::current());
        let mut cache = ImageVrTileCache::new(
            source_with(descriptor()),
            loader,
            ImageCacheConfig::default().with_wrap(true, true),
        );

        cache.get_texture(3, 3, 0);
        FaceTileCache::settle(&mut cache).await;
        FaceTileCache::purge(&mut cache);
        assert!(!cache.get_texture(3, 3, 0).is_partial());
        assert!(!cache.inner().grid().wrap_x);
    }

    #[tokio::test]
    async fn test_purge_resets_used_marks() {
        let mock = Arc::new(MockHttpClient::new());
        mock.respond(&format!("{}/0/0_0.png", TILE_BASE), png(256, [9, 9, 9, 255]));
        let loader = ResourceLoader::new(mock, LoaderConfig::default(), Handle::current());
        let mut cache = ImageVrTileCache::new(source_with(descriptor()), loader, ImageCacheConfig::default());
        cache.get_texture(0, 0, 0);
        FaceTileCache::settle(&mut cache).await;
        FaceTileCache::purge(&mut cache);

        let a = cache.get_texture(0, 0, 0);
        FaceTileCache::purge(&mut cache);
        let b = cache.get_texture(0, 0, 0);
        assert!(a.same_resource(&b));
    }
}
