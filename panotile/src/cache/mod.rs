//! Tile caches.
//!
//! Two cache flavors share one design: an LRU ledger bounds the number of
//! entries, misses are answered with synthesized partial imagery, fetches are
//! de-duplicated through the [`ResourceLoader`](crate::loader::ResourceLoader)
//! and applied between frames.
//!
//! - [`ImageTileCache`]: decoded images, for flat images and the compositor
//!   renderer (via [`ImageVrTileCache`])
//! - [`TextureTileCache`]: renderer textures backed by a decoded-image cache,
//!   for the mesh renderer
//!
//! # Frame Protocol
//!
//! ```text
//! reset_used() -> get_texture(..) x N -> purge() -> process_completions()
//! ```
//!
//! Purging never happens mid-pass, so a tile used earlier in the pass is never
//! evicted before the pass completes.

mod image_cache;
pub mod key;
pub mod lru;
mod notify;
mod texture_cache;
mod vr;

pub use image_cache::{
    ImageCacheConfig, ImageTileCache, DEFAULT_EVICTIONS_PER_PURGE, DEFAULT_IMAGE_CAPACITY,
};
pub use key::{TileGrid, TileKey};
pub use lru::LruLedger;
pub use notify::{LoadListener, LoadNotifier, DEFAULT_NOTIFY_INTERVAL};
pub use texture_cache::{TextureCacheConfig, TextureTileCache};
pub use vr::{FaceTexture, FaceTileCache, ImageVrTileCache};

use std::fmt;

/// Counters describing cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fetches issued by the cache (after de-duplication).
    pub requests: u64,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups with nothing cached.
    pub misses: u64,
    /// Partial images synthesized.
    pub partials: u64,
    /// Second lookups of a tile within one frame.
    pub duplicate_uses: u64,
    /// Authoritative tiles stored.
    pub insertions: u64,
    /// Fetches that settled without data.
    pub failures: u64,
    /// Entries evicted by purges.
    pub evictions: u64,
    /// Lookups outside the tile grid.
    pub out_of_bounds: u64,
}

impl CacheStats {
    /// Combine counters from several caches.
    pub fn merge(&self, other: &CacheStats) -> CacheStats {
        CacheStats {
            requests: self.requests + other.requests,
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            partials: self.partials + other.partials,
            duplicate_uses: self.duplicate_uses + other.duplicate_uses,
            insertions: self.insertions + other.insertions,
            failures: self.failures + other.failures,
            evictions: self.evictions + other.evictions,
            out_of_bounds: self.out_of_bounds + other.out_of_bounds,
        }
    }

    /// Fraction of lookups answered from the cache.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hits, {} misses ({:.1}% hit rate), {} fetches, {} loaded, {} failed, {} evicted",
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.requests,
            self.insertions,
            self.failures,
            self.evictions
        )
    }
}
