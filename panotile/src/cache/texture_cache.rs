//! Two-level tile cache for the mesh renderer.
//!
//! Level 1 holds renderer textures, level 2 the decoded images they were
//! created from. A texture evicted from level 1 is recreated from level 2
//! without a fetch. Each level has its own LRU ledger and budget.
//!
//! Unlike the flat cache, a texture may be drawn any number of times in one
//! frame, so there is no per-frame "used" tracking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::image_cache::Completion;
use super::key::{TileGrid, TileKey};
use super::lru::LruLedger;
use super::notify::{LoadListener, LoadNotifier, DEFAULT_NOTIFY_INTERVAL};
use super::CacheStats;
use crate::fallback::FallbackSynthesizer;
use crate::filesystem::TileSource;
use crate::loader::ResourceLoader;
use crate::texture::{TextureFactory, TextureHandle};

/// Configuration for [`TextureTileCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct TextureCacheConfig {
    /// Textures kept before purging starts deleting them.
    pub texture_capacity: usize,
    /// Decoded images kept before purging starts dropping them.
    pub image_capacity: usize,
    /// Maximum evictions per level performed by one purge.
    pub evictions_per_purge: usize,
    pub notify_interval: Duration,
    /// Partial textures are `tile_size / partial_divisor` pixels square.
    pub partial_divisor: u32,
}

impl Default for TextureCacheConfig {
    fn default() -> Self {
        Self {
            texture_capacity: 512,
            image_capacity: 2048,
            evictions_per_purge: 64,
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
            partial_divisor: 8,
        }
    }
}

impl TextureCacheConfig {
    /// Build from the `[cache]` section of the config file.
    pub fn from_settings(settings: &crate::config::CacheSettings) -> Self {
        Self {
            texture_capacity: settings.texture_capacity,
            image_capacity: settings.decoded_capacity,
            evictions_per_purge: settings.texture_evictions_per_purge,
            notify_interval: Duration::from_millis(settings.notify_interval_ms),
            ..Self::default()
        }
    }

    pub fn with_capacities(mut self, textures: usize, images: usize) -> Self {
        self.texture_capacity = textures;
        self.image_capacity = images;
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
}

#[derive(Debug, Clone, Copy)]
struct CachedTexture {
    handle: TextureHandle,
    partial: bool,
}

/// Texture cache for one cube face (or flat image) drawn as meshes.
pub struct TextureTileCache {
    source: TileSource,
    loader: ResourceLoader,
    factory: Arc<dyn TextureFactory>,
    synthesizer: FallbackSynthesizer,
    config: TextureCacheConfig,
    grid: TileGrid,
    textures: HashMap<TileKey, CachedTexture>,
    images: HashMap<TileKey, Arc<RgbaImage>>,
    texture_lru: LruLedger<TileKey>,
    image_lru: LruLedger<TileKey>,
    requested: HashSet<TileKey>,
    poster: Option<Arc<RgbaImage>>,
    poster_requested: bool,
    notifier: LoadNotifier,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    disposed: bool,
    stats: CacheStats,
}

impl TextureTileCache {
    pub fn new(
        source: TileSource,
        loader: ResourceLoader,
        factory: Arc<dyn TextureFactory>,
        config: TextureCacheConfig,
    ) -> Self {
        let synthesizer = FallbackSynthesizer::new(&source.descriptor, config.partial_divisor);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let notifier = LoadNotifier::new(config.notify_interval);

        let mut cache = Self {
            source,
            loader,
            factory,
            synthesizer,
            config,
            grid: TileGrid::unbounded(),
            textures: HashMap::new(),
            images: HashMap::new(),
            texture_lru: LruLedger::new(),
            image_lru: LruLedger::new(),
            requested: HashSet::new(),
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

    pub fn set_on_loaded(&mut self, listener: LoadListener) {
        self.notifier.set_listener(listener);
    }

    pub fn set_max_tiles(&mut self, max_x: i64, max_y: i64) {
        self.grid.max_x = max_x;
        self.grid.max_y = max_y;
    }

    /// Texture for a tile, or `None` when not even a partial one can be made.
    pub fn get_texture(&mut self, x: i64, y: i64, zoom: i32) -> Option<TextureHandle> {
        if self.disposed {
            return None;
        }
        let Some(key) = self.grid.key(x, y, zoom) else {
            self.stats.out_of_bounds += 1;
            return None;
        };

        self.texture_lru.access(&key);
        self.image_lru.access(&key);

        if let Some(cached) = self.textures.get(&key) {
            self.stats.hits += 1;
            return Some(cached.handle);
        }
        if let Some(image) = self.images.get(&key) {
            self.stats.hits += 1;
            let handle = self.factory.create_texture(image);
            self.set_cached_texture(key, handle, false);
            return Some(handle);
        }

        self.stats.misses += 1;
        self.request(key);
        if self.poster.is_none() {
            self.request_poster();
        }

        let images = &self.images;
        let synthesis = self.synthesizer.synthesize(
            key,
            |k| images.get(k).cloned(),
            self.poster.as_deref(),
        );
        let pixels = synthesis.image?;
        self.stats.partials += 1;
        let handle = self.factory.create_texture(&pixels);
        self.set_cached_texture(key, handle, true);
        Some(handle)
    }

    /// Replace the texture cached for `key`, deleting the previous one.
    fn set_cached_texture(&mut self, key: TileKey, handle: TextureHandle, partial: bool) {
        if let Some(previous) = self.textures.insert(key, CachedTexture { handle, partial }) {
            self.factory.delete_texture(previous.handle);
        }
    }

    /// Evict least recently used textures and images above their budgets.
    pub fn purge(&mut self) -> usize {
        let mut evicted = 0;
        for _ in 0..self.config.evictions_per_purge {
            if self.texture_lru.len() <= self.config.texture_capacity {
                break;
            }
            let Some(key) = self.texture_lru.pop_least_used() else {
                break;
            };
            if let Some(cached) = self.textures.remove(&key) {
                self.factory.delete_texture(cached.handle);
            }
            evicted += 1;
        }
        for _ in 0..self.config.evictions_per_purge {
            if self.image_lru.len() <= self.config.image_capacity {
                break;
            }
            let Some(key) = self.image_lru.pop_least_used() else {
                break;
            };
            self.images.remove(&key);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, "Purged texture cache");
        }
        self.stats.evictions += evicted as u64;
        evicted
    }

    pub fn process_completions(&mut self) -> bool {
        self.process_completions_at(Instant::now())
    }

    pub fn process_completions_at(&mut self, now: Instant) -> bool {
        if self.disposed {
            while self.completions_rx.try_recv().is_ok() {}
            return false;
        }
        let mut fired = false;
        while let Ok(completion) = self.completions_rx.try_recv() {
            fired |= self.apply(completion, now);
        }
        if !fired {
            fired = self.notifier.poll(self.requested.len(), now);
        }
        fired
    }

    fn apply(&mut self, completion: Completion, now: Instant) -> bool {
        match completion {
            Completion::Poster(Some(poster)) => {
                self.poster = Some(poster);
                self.notifier.record_arrival();
            }
            Completion::Poster(None) => self.poster_requested = false,
            Completion::Tile { key, image } => {
                self.requested.remove(&key);
                match image {
                    Some(pixels) => {
                        let handle = self.factory.create_texture(&pixels);
                        self.set_cached_texture(key, handle, false);
                        self.images.insert(key, pixels);
                        if !self.texture_lru.contains(&key) {
                            self.texture_lru.access(&key);
                        }
                        if !self.image_lru.contains(&key) {
                            self.image_lru.access(&key);
                        }
                        self.stats.insertions += 1;
                        self.notifier.record_arrival();
                        debug!(key = %key, texture = %handle, "Tile texture created");
                    }
                    None => {
                        if let Some(cached) = self.textures.get(&key).copied() {
                            if cached.partial {
                                self.textures.remove(&key);
                                self.factory.delete_texture(cached.handle);
                            }
                        }
                        self.stats.failures += 1;
                    }
                }
            }
        }
        self.notifier.poll(self.requested.len(), now)
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

    /// Delete every texture and ignore fetches that settle later.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for (_, cached) in self.textures.drain() {
            self.factory.delete_texture(cached.handle);
        }
        self.images.clear();
        self.texture_lru.clear();
        self.image_lru.clear();
        self.requested.clear();
        info!("Texture cache disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

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
        let tx = self.completions_tx.clone();
        self.loader.load_image(
            &self.source.file_system.poster_url(),
            Box::new(move |image| {
                let _ = tx.send(Completion::Poster(image));
            }),
        );
    }
}
