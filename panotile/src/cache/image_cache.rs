//! Tile cache for flat image rendering.
//!
//! [`ImageTileCache`] serves the best imagery available for a tile without
//! ever blocking:
//!
//! 1. Out-of-bounds coordinates get the empty placeholder and no fetch.
//! 2. A cached tile is returned as is. If the same tile is asked for twice in
//!    one frame (which happens at wrap-around seams) the second caller gets a
//!    distinct copy and a refresh fetch is issued.
//! 3. A missing tile is requested, and a partial image is synthesized from a
//!    cached ancestor or the poster and cached in its place until the real
//!    tile arrives.
//!
//! # Completion Model
//!
//! Fetches run on tokio tasks. Their results are sent over a channel and
//! applied only when the owner calls [`process_completions`], between frames,
//! so cache state is never mutated in the middle of a render pass.
//!
//! [`process_completions`]: ImageTileCache::process_completions

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::key::{TileGrid, TileKey};
use super::lru::LruLedger;
use super::notify::{LoadListener, LoadNotifier, DEFAULT_NOTIFY_INTERVAL};
use super::CacheStats;
use crate::fallback::FallbackSynthesizer;
use crate::filesystem::TileSource;
use crate::loader::ResourceLoader;
use crate::texture::TileImage;

/// Default number of tiles kept by the flat cache.
pub const DEFAULT_IMAGE_CAPACITY: usize = 512;

/// Default upper bound on evictions per purge.
pub const DEFAULT_EVICTIONS_PER_PURGE: usize = 4;

/// Configuration for [`ImageTileCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCacheConfig {
    /// Tiles kept before purging starts evicting.
    pub capacity: usize,
    /// Maximum evictions performed by one purge.
    pub evictions_per_purge: usize,
    /// Coalescing window for load notifications.
    pub notify_interval: Duration,
    /// Partial images are `tile_size / partial_divisor` pixels square.
    pub partial_divisor: u32,
    /// Request uncached ancestors found while synthesizing partial images.
    pub request_ancestors: bool,
    pub wrap_x: bool,
    pub wrap_y: bool,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_IMAGE_CAPACITY,
            evictions_per_purge: DEFAULT_EVICTIONS_PER_PURGE,
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
            partial_divisor: 4,
            request_ancestors: true,
            wrap_x: false,
            wrap_y: false,
        }
    }
}

impl ImageCacheConfig {
    /// Build from the `[cache]` section of the config file.
    pub fn from_settings(settings: &crate::config::CacheSettings) -> Self {
        Self {
            capacity: settings.image_capacity,
            evictions_per_purge: settings.evictions_per_purge,
            notify_interval: Duration::from_millis(settings.notify_interval_ms),
            wrap_x: settings.wrap_x,
            wrap_y: settings.wrap_y,
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_evictions_per_purge(mut self, evictions: usize) -> Self {
        self.evictions_per_purge = evictions;
        self
    }

    pub fn with_notify_interval(mut self, interval: Duration) -> Self {
        self.notify_interval = interval;
        self
    }

    pub fn with_request_ancestors(mut self, request: bool) -> Self {
        self.request_ancestors = request;
        self
    }

    pub fn with_wrap(mut self, wrap_x: bool, wrap_y: bool) -> Self {
        self.wrap_x = wrap_x;
        self.wrap_y = wrap_y;
        self
    }
}

/// Result of a settled fetch, sent from loader tasks back to the cache.
#[derive(Debug)]
pub(crate) enum Completion {
    Tile {
        key: TileKey,
        image: Option<Arc<RgbaImage>>,
    },
    Poster(Option<Arc<RgbaImage>>),
}

/// LRU cache of decoded tiles for one image.
pub struct ImageTileCache {
    source: TileSource,
    loader: ResourceLoader,
    synthesizer: FallbackSynthesizer,
    config: ImageCacheConfig,
    grid: TileGrid,
    entries: HashMap<TileKey, TileImage>,
    requested: HashSet<TileKey>,
    used: HashSet<TileKey>,
    lru: LruLedger<TileKey>,
    poster: Option<Arc<RgbaImage>>,
    poster_requested: bool,
    notifier: LoadNotifier,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    disposed: bool,
    stats: CacheStats,
}

impl ImageTileCache {
    /// Create a cache and start loading the poster.
    ///
    /// The tile grid starts empty; call [`set_max_tiles`](Self::set_max_tiles)
    /// before requesting tiles.
    pub fn new(source: TileSource, loader: ResourceLoader, config: ImageCacheConfig) -> Self {
        let synthesizer = FallbackSynthesizer::new(&source.descriptor, config.partial_divisor);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let grid = TileGrid::new(0, 0).with_wrap(config.wrap_x, config.wrap_y);
        let notifier = LoadNotifier::new(config.notify_interval);

        let mut cache = Self {
            source,
            loader,
            synthesizer,
            config,
            grid,
            entries: HashMap::new(),
            requested: HashSet::new(),
            used: HashSet::new(),
            lru: LruLedger::new(),
            poster: None,
            poster_requested: false,
            notifier,
            completions_tx,
            completions_rx,
            disposed: false,
            stats: CacheStats::default(),
        };
        cache.request_poster();
        cache
    }

    /// Register a callback raised (at most once per notify interval) when new
    /// tile data has been applied.
    pub fn set_on_loaded(&mut self, listener: LoadListener) {
        self.notifier.set_listener(listener);
    }

    /// Declare the valid tile index range for the current zoom level.
    pub fn set_max_tiles(&mut self, max_x: i64, max_y: i64) {
        self.grid.max_x = max_x;
        self.grid.max_y = max_y;
    }

    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    /// Clear the per-frame "used" marks. Call once before each render pass.
    pub fn reset_used(&mut self) {
        self.used.clear();
    }

    /// Best imagery currently available for a tile. Never blocks.
    pub fn get_texture(&mut self, x: i64, y: i64, zoom: i32) -> TileImage {
        if self.disposed {
            return TileImage::empty();
        }
        let Some(key) = self.grid.key(x, y, zoom) else {
            self.stats.out_of_bounds += 1;
            return TileImage::empty();
        };

        self.lru.access(&key);

        if let Some(entry) = self.entries.get(&key) {
            if self.used.contains(&key) {
                self.stats.duplicate_uses += 1;
                let copy = entry.deep_copy();
                if !entry.is_partial() {
                    self.request(key);
                }
                return copy;
            }
            self.stats.hits += 1;
            let entry = entry.clone();
            self.used.insert(key);
            return entry;
        }

        self.stats.misses += 1;
        self.request(key);
        if self.poster.is_none() {
            self.request_poster();
        }

        let entries = &self.entries;
        let synthesis = self.synthesizer.synthesize(
            key,
            |k| {
                entries
                    .get(k)
                    .filter(|e| !e.is_partial())
                    .map(|e| Arc::clone(e.pixels()))
            },
            self.poster.as_deref(),
        );

        if self.config.request_ancestors {
            for ancestor in &synthesis.missing_ancestors {
                self.request(*ancestor);
            }
        }

        match synthesis.image {
            Some(pixels) => {
                self.stats.partials += 1;
                let partial = TileImage::partial(pixels);
                self.entries.insert(key, partial.clone());
                self.used.insert(key);
                partial
            }
            None => TileImage::empty(),
        }
    }

    /// Evict least recently used tiles above capacity, at most
    /// `evictions_per_purge` per call.
    pub fn purge(&mut self) -> usize {
        let mut evicted = 0;
        while evicted < self.config.evictions_per_purge && self.lru.len() > self.config.capacity {
            let Some(key) = self.lru.pop_least_used() else {
                break;
            };
            self.entries.remove(&key);
            evicted += 1;
            debug!(key = %key, "Evicted tile");
        }
        self.stats.evictions += evicted as u64;
        evicted
    }

    /// Apply settled fetches. Returns `true` if a load notification fired.
    pub fn process_completions(&mut self) -> bool {
        self.process_completions_at(Instant::now())
    }

    /// [`process_completions`](Self::process_completions) with an explicit clock.
    pub fn process_completions_at(&mut self, now: Instant) -> bool {
        if self.disposed {
            while self.completions_rx.try_recv().is_ok() {}
            return false;
        }

        let mut fired = false;
        while let Ok(completion) = self.completions_rx.try_recv() {
            fired |= self.apply(completion, now);
        }
        if !fired && self.notifier.poll(self.requested.len(), now) {
            self.purge();
            fired = true;
        }
        fired
    }

    /// Apply one completion and poll the notifier.
    fn apply(&mut self, completion: Completion, now: Instant) -> bool {
        match completion {
            Completion::Poster(Some(poster)) => {
                info!(
                    width = poster.width(),
                    height = poster.height(),
                    "Poster loaded"
                );
                self.poster = Some(poster);
                self.notifier.record_arrival();
            }
            Completion::Poster(None) => {
                self.poster_requested = false;
            }
            Completion::Tile { key, image } => {
                self.requested.remove(&key);
                self.apply_tile(key, image);
            }
        }
        if self.notifier.poll(self.requested.len(), now) {
            self.purge();
            return true;
        }
        false
    }

    fn apply_tile(&mut self, key: TileKey, image: Option<Arc<RgbaImage>>) {
        match image {
            // A refresh of a tile that is already authoritative is not new
            // data and must not trigger another redraw.
            Some(_) if self.contains_authoritative(&key) => {
                debug!(key = %key, "Tile refreshed");
            }
            Some(pixels) => {
                self.entries.insert(key, TileImage::authoritative(pixels));
                if !self.lru.contains(&key) {
                    self.lru.access(&key);
                }
                self.stats.insertions += 1;
                self.notifier.record_arrival();
                debug!(key = %key, "Tile loaded");
            }
            None => {
                // Drop the stand-in so the next request retries the fetch.
                if self.entries.get(&key).is_some_and(TileImage::is_partial) {
                    self.entries.remove(&key);
                }
                self.stats.failures += 1;
            }
        }
    }

    /// Wait until every outstanding fetch has settled and been applied.
    pub async fn settle(&mut self) {
        while !self.disposed
            && (!self.requested.is_empty() || (self.poster_requested && self.poster.is_none()))
        {
            match self.completions_rx.recv().await {
                Some(completion) => {
                    self.apply(completion, Instant::now());
                }
                None => break,
            }
        }
        self.process_completions();
    }

    /// Stop serving tiles and ignore fetches that settle later.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.entries.clear();
        self.lru.clear();
        self.used.clear();
        self.requested.clear();
        info!(evictions = self.stats.evictions, "Tile cache disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn has_poster(&self) -> bool {
        self.poster.is_some()
    }

    /// Number of cached tiles, partial or authoritative.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` holds an authoritative tile.
    pub fn contains_authoritative(&self, key: &TileKey) -> bool {
        self.entries.get(key).is_some_and(|e| !e.is_partial())
    }

    pub fn cached_keys(&self) -> impl Iterator<Item = &TileKey> {
        self.entries.keys()
    }

    /// Number of distinct tiles with an outstanding fetch.
    pub fn outstanding(&self) -> usize {
        self.requested.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    fn request(&mut self, key: TileKey) {
        if !self.requested.insert(key) {
            return;
        }
        self.stats.requests += 1;
        let url = self.source.file_system.image_url(key.x, key.y, key.zoom);
        let tx = self.completions_tx.clone();
        self.loader.load_image(
            &url,
            Box::new(move |image| {
                let _ = tx.send(Completion::Tile { key, image });
            }),
        );
    }

    fn request_poster(&mut self) {
        if self.poster_requested {
            return;
        }
        self.poster_requested = true;
        let url = self.source.file_system.poster_url();
        let tx = self.completions_tx.clone();
        self.loader.load_image(
            &url,
            Box::new(move |image| {
                if image.is_none() {
                    warn!("Poster unavailable, partial tiles limited to cached ancestors");
                }
                let _ = tx.send(Completion::Poster(image));
            }),
        );
    }
}
