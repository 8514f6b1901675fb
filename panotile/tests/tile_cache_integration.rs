//! Integration tests for the tile cache.
//!
//! These tests drive the public API end to end:
//! - descriptor loading through a folder file system
//! - provisional imagery followed by authoritative tiles
//! - fetch de-duplication, bounds checks and LRU eviction
//!
//! Run with: `cargo test --test tile_cache_integration`

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use image::Rgba;
use panotile::cache::{ImageCacheConfig, ImageTileCache, TileKey};
use panotile::filesystem::{open_file_system, FileSystemKind};

use common::{
    descriptor_url, loader, poster_url, solid_png, tile_url, StaticServer, BASE, DESCRIPTOR,
};

const GREEN: [u8; 4] = [0, 200, 0, 255];
const BLUE: [u8; 4] = [0, 0, 220, 255];
const GREY: [u8; 4] = [90, 90, 90, 255];

async fn open_cache(server: &Arc<StaticServer>, config: ImageCacheConfig) -> ImageTileCache {
    server.serve(descriptor_url(), DESCRIPTOR);
    let loader = loader(server);
    let source = open_file_system(FileSystemKind::Folder, BASE, None, &loader)
        .await
        .expect("descriptor should load");
    let mut cache = ImageTileCache::new(source, loader, config);
    cache.set_max_tiles(4, 4);
    cache
}

// ============================================================================
// Integration Tests
// ============================================================================

#[tokio::test]
async fn test_poster_partial_then_authoritative_tile() {
    let server = Arc::new(StaticServer::new());
    server.serve(poster_url(), solid_png(128, GREY));
    server.serve(tile_url(2, 2, 0), solid_png(256, GREEN));
    let mut cache = open_cache(&server, ImageCacheConfig::default()).await;

    assert_eq!(cache.source().descriptor.width, 1024);
    cache.settle().await;
    assert!(cache.has_poster());

    // First frame: cropped from the poster.
    cache.reset_used();
    let first = cache.get_texture(2, 2, 0);
    assert!(first.is_partial());
    assert_eq!(first.pixels().get_pixel(0, 0), &Rgba(GREY));

    cache.settle().await;

    // Next frame: the real tile.
    cache.reset_used();
    let second = cache.get_texture(2, 2, 0);
    assert!(!second.is_partial());
    assert_eq!(second.width(), 256);
    assert_eq!(second.pixels().get_pixel(128, 128), &Rgba(GREEN));
    assert_eq!(server.requests(&tile_url(2, 2, 0)), 1);
}

#[tokio::test]
async fn test_repeated_requests_share_one_fetch() {
    let server = Arc::new(StaticServer::new().with_latency(Duration::from_millis(20)));
    server.serve(tile_url(1, 3, 0), solid_png(256, GREEN));
    let config = ImageCacheConfig::default().with_request_ancestors(false);
    let mut cache = open_cache(&server, config).await;

    for _ in 0..5 {
        cache.reset_used();
        cache.get_texture(1, 3, 0);
    }
    assert_eq!(cache.outstanding(), 1);

    cache.settle().await;
    assert_eq!(server.requests(&tile_url(1, 3, 0)), 1);
    assert!(cache.contains_authoritative(&TileKey::new(1, 3, 0)));
}

#[tokio::test]
async fn test_out_of_bounds_tiles_are_never_fetched() {
    let server = Arc::new(StaticServer::new());
    let mut cache = open_cache(&server, ImageCacheConfig::default()).await;
    cache.settle().await;
    let before = server.total_requests();

    for (x, y) in [(-1, 0), (0, -1), (4, 0), (0, 4), (7, 9)] {
        assert!(cache.get_texture(x, y, 0).is_empty());
    }

    cache.settle().await;
    assert_eq!(server.total_requests(), before);
    assert_eq!(cache.stats().out_of_bounds, 5);
}

#[tokio::test]
async fn test_partial_uses_nearest_cached_ancestor() {
    let server = Arc::new(StaticServer::new());
    server.serve(tile_url(1, 1, -1), solid_png(256, BLUE));
    let config = ImageCacheConfig::default().with_request_ancestors(false);
    let mut cache = open_cache(&server, config).await;

    // Load the zoom -1 parent first.
    cache.set_max_tiles(2, 2);
    cache.get_texture(1, 1, -1);
    cache.settle().await;
    assert!(cache.contains_authoritative(&TileKey::new(1, 1, -1)));

    // (2, 2, 0) is the top-left quadrant of (1, 1, -1).
    cache.set_max_tiles(4, 4);
    cache.reset_used();
    let partial = cache.get_texture(2, 2, 0);
    assert!(partial.is_partial());
    assert_eq!(partial.width(), 64);
    assert_eq!(partial.pixels().get_pixel(0, 0), &Rgba(BLUE));
    assert_eq!(partial.pixels().get_pixel(63, 63), &Rgba(BLUE));
}

#[tokio::test]
async fn test_least_recently_used_tile_is_evicted() {
    let server = Arc::new(StaticServer::new());
    for x in 0..4 {
        server.serve(tile_url(x, 0, 0), solid_png(256, GREEN));
    }
    let config = ImageCacheConfig::default()
        .with_capacity(3)
        .with_request_ancestors(false);
    let mut cache = open_cache(&server, config).await;

    cache.reset_used();
    for x in 0..3 {
        cache.get_texture(x, 0, 0);
    }
    cache.settle().await;

    // Touch tile 0 again, then bring in tile 3: tile 1 is now the oldest.
    cache.reset_used();
    assert!(!cache.get_texture(0, 0, 0).is_partial());
    cache.get_texture(3, 0, 0);
    cache.settle().await;
    cache.purge();

    let cached: HashSet<TileKey> = cache.cached_keys().copied().collect();
    let expected: HashSet<TileKey> = [0, 2, 3].into_iter().map(|x| TileKey::new(x, 0, 0)).collect();
    assert_eq!(cached, expected);
    assert!(cache.stats().evictions >= 1);
}

#[tokio::test]
async fn test_missing_descriptor_fails_to_open() {
    let server = Arc::new(StaticServer::new());
    let loader = loader(&server);

    let result = open_file_system(FileSystemKind::Folder, BASE, None, &loader).await;
    assert!(result.is_err());
    assert_eq!(server.requests(&descriptor_url()), 1);
}
