//! Cube-map panorama viewer.
//!
//! [`VrPanorama`] ties the six cube faces, the view state, a renderer backend
//! and the adaptive LOD monitor together. The host drives it:
//!
//! - [`render`](VrPanorama::render) after input or animation steps,
//! - [`pump`](VrPanorama::pump) every frame to apply settled fetches,
//! - [`hq_tick`](VrPanorama::hq_tick) on every tick from [`run_hq_timer`].

use std::time::{Duration, Instant};

use futures::future::try_join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{CacheStats, FaceTileCache};
use crate::config::ConfigFile;
use crate::error::ViewerError;
use crate::face::{VrFace, CUBE_FACES};
use crate::filesystem::{open_file_system, FileSystemKind, TileSource};
use crate::loader::ResourceLoader;
use crate::lod::{AdaptiveLodConfig, AdaptiveLodMonitor, RenderCause, RenderPhase};
use crate::render::{Renderer, Viewport};
use crate::view::{StepOutcome, ViewConfig, ViewState};

/// Panorama rendering options.
#[derive(Debug, Clone, PartialEq)]
pub struct PanoramaConfig {
    /// Starting texture magnification. The LOD monitor adjusts it from here.
    pub max_texture_magnification: f64,
    /// Subdivision depth cap; `None` uses each face's full depth.
    pub max_tesselation: Option<u32>,
    pub device_pixel_ratio: f64,
    /// Adaptive LOD tuning; `None` renders at a fixed magnification.
    pub lod: Option<AdaptiveLodConfig>,
    pub view: ViewConfig,
}

impl Default for PanoramaConfig {
    fn default() -> Self {
        Self {
            max_texture_magnification: 1.0,
            max_tesselation: None,
            device_pixel_ratio: 1.0,
            lod: Some(AdaptiveLodConfig::default()),
            view: ViewConfig::default(),
        }
    }
}

impl PanoramaConfig {
    /// Build from the `[view]` and `[lod]` sections of the config file.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        Self {
            max_texture_magnification: config.view.max_texture_magnification,
            max_tesselation: u32::try_from(config.view.max_tesselation).ok(),
            device_pixel_ratio: config.view.device_pixel_ratio,
            lod: config
                .lod
                .enabled
                .then(|| AdaptiveLodConfig::from_settings(&config.lod)),
            view: ViewConfig::from_settings(&config.view),
        }
    }

    pub fn with_lod(mut self, lod: Option<AdaptiveLodConfig>) -> Self {
        self.lod = lod;
        self
    }

    pub fn with_max_tesselation(mut self, max_tesselation: Option<u32>) -> Self {
        self.max_tesselation = max_tesselation;
        self
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }
}

/// A cube-map panorama bound to one renderer.
pub struct VrPanorama<R: Renderer> {
    renderer: R,
    faces: Vec<VrFace<R::Cache>>,
    view: ViewState,
    lod: Option<AdaptiveLodMonitor>,
    magnification: f64,
    device_pixel_ratio: f64,
    disposed: bool,
}

impl<R: Renderer> VrPanorama<R> {
    /// Open the six `face_{key}` file systems under `base_path` and build
    /// the panorama.
    ///
    /// # Errors
    ///
    /// Fails with [`ViewerError::Descriptor`] when any face descriptor cannot
    /// be loaded.
    pub async fn open(
        kind: FileSystemKind,
        base_path: &str,
        renderer: R,
        loader: ResourceLoader,
        config: PanoramaConfig,
    ) -> Result<Self, ViewerError> {
        let opens = CUBE_FACES.iter().map(|face| {
            let prefix = face.prefix();
            let loader = &loader;
            async move { open_file_system(kind, base_path, Some(prefix.as_str()), loader).await }
        });
        let sources = try_join_all(opens).await?;
        info!(base = %base_path, kind = %kind, "Panorama opened");
        Self::from_sources(sources, renderer, loader, config)
    }

    /// Build from already opened face sources, in `f, b, l, r, u, d` order.
    pub fn from_sources(
        sources: Vec<TileSource>,
        renderer: R,
        loader: ResourceLoader,
        config: PanoramaConfig,
    ) -> Result<Self, ViewerError> {
        if sources.len() != CUBE_FACES.len() {
            return Err(ViewerError::FaceCount {
                expected: CUBE_FACES.len(),
                found: sources.len(),
            });
        }

        let faces = CUBE_FACES
            .iter()
            .zip(sources)
            .map(|(face, source)| {
                let cache = renderer.create_tile_cache(source, loader.clone());
                VrFace::new(*face, cache, config.max_tesselation)
            })
            .collect();

        let magnification = config.max_texture_magnification;
        let lod = config
            .lod
            .map(|lod| AdaptiveLodMonitor::new(lod, magnification));

        Ok(Self {
            renderer,
            faces,
            view: ViewState::new(config.view),
            lod,
            magnification,
            device_pixel_ratio: config.device_pixel_ratio,
            disposed: false,
        })
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn faces(&self) -> &[VrFace<R::Cache>] {
        &self.faces
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn lod(&self) -> Option<&AdaptiveLodMonitor> {
        self.lod.as_ref()
    }

    pub fn lod_mut(&mut self) -> Option<&mut AdaptiveLodMonitor> {
        self.lod.as_mut()
    }

    /// Magnification the next frame is rendered with.
    pub fn magnification(&self) -> f64 {
        self.magnification
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.renderer.resize(viewport);
    }

    /// Render one frame at the current view.
    ///
    /// Returns the number of quads submitted to the renderer.
    pub fn render(&mut self, cause: RenderCause) -> usize {
        if self.disposed {
            return 0;
        }
        self.notify_lod(RenderPhase::Begin, cause);

        self.renderer.begin_frame(&self.view.camera());
        let mut quads = 0;
        for face in &mut self.faces {
            face.cache_mut().reset_used();
            quads += face.render(&mut self.renderer, self.magnification, self.device_pixel_ratio);
        }
        for face in &mut self.faces {
            face.end_render();
        }
        self.renderer.end_frame();

        self.notify_lod(RenderPhase::End, cause);
        quads
    }

    fn notify_lod(&mut self, phase: RenderPhase, cause: RenderCause) {
        if let Some(lod) = self.lod.as_mut() {
            if let Some(magnification) = lod.on_render(phase, cause, Instant::now()) {
                self.magnification = magnification;
            }
        }
    }

    /// Apply settled fetches on every face; re-render when new data arrived.
    ///
    /// Returns `true` when a frame was rendered.
    pub fn pump(&mut self) -> bool {
        let mut updated = false;
        for face in &mut self.faces {
            updated |= face.cache_mut().process_completions();
        }
        if updated {
            self.render(RenderCause::TextureUpdate);
        }
        updated
    }

    /// Advance the view animation and render if the view moved.
    pub fn animate(&mut self, now: Instant) -> StepOutcome {
        let outcome = self.view.animate(now);
        if outcome == StepOutcome::Continue {
            self.render(RenderCause::Interaction);
        }
        outcome
    }

    /// Idle check for the high-quality pass.
    ///
    /// Returns `true` when the HQ frame was rendered.
    pub fn hq_tick(&mut self, now: Instant) -> bool {
        let Some(magnification) = self.lod.as_mut().and_then(|lod| lod.tick(now)) else {
            return false;
        };
        self.magnification = magnification;
        self.render(RenderCause::HqPass);
        true
    }

    /// Wait until every face has settled its outstanding fetches.
    pub async fn settle(&mut self) {
        for face in &mut self.faces {
            face.cache_mut().settle().await;
        }
    }

    /// Combined cache counters of all faces.
    pub fn stats(&self) -> CacheStats {
        self.faces
            .iter()
            .fold(CacheStats::default(), |total, face| total.merge(&face.cache().stats()))
    }

    /// Release every face cache. Later renders draw nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for face in &mut self.faces {
            face.dispose();
        }
        self.view.cancel_animation();
        self.disposed = true;
        info!("Panorama disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Spawn the periodic HQ idle check.
///
/// Each tick sends the tick time; feed it to [`VrPanorama::hq_tick`]. The
/// task stops when `cancellation` fires or the receiver is dropped.
pub fn run_hq_timer(
    interval: Duration,
    cancellation: CancellationToken,
) -> (JoinHandle<()>, mpsc::UnboundedReceiver<Instant>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                _ = ticker.tick() => {
                    if tx.send(Instant::now()).is_err() {
                        break;
                    }
                }
            }
        }

        debug!("HQ timer stopped");
    });
    (handle, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::runtime::Handle;

    use crate::cache::test_support::png;
    use crate::loader::http::tests::MockHttpClient;
    use crate::loader::LoaderConfig;
    use crate::lod::LodState;
    use crate::render::MeshRenderer;

    const BASE: &str = "http://pano.test/p";

    fn mock_panorama(skip_face: Option<&str>) -> Arc<MockHttpClient> {
        let client = MockHttpClient::new();
        for face in CUBE_FACES.iter() {
            if Some(face.key) == skip_face {
                continue;
            }
            let dir = format!("{}/{}", BASE, face.prefix());
            client.respond(
                &format!("{}/descriptor", dir),
                "width:512:height:512:tileSize:256:overlap:0:minZoom:-1:posterSize:128:suffix:.png",
            );
            client.respond(&format!("{}/poster.png", dir), png(128, [0, 90, 200, 255]));
        }
        Arc::new(client)
    }

    fn loader(client: Arc<MockHttpClient>) -> ResourceLoader {
        ResourceLoader::new(client, LoaderConfig::default(), Handle::current())
    }

    async fn open(config: PanoramaConfig) -> VrPanorama<MeshRenderer> {
        let client = mock_panorama(None);
        VrPanorama::open(
            FileSystemKind::Folder,
            BASE,
            MeshRenderer::new(Viewport::new(480.0, 480.0)),
            loader(client),
            config,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_builds_six_faces() {
        let panorama = open(PanoramaConfig::default()).await;
        assert_eq!(panorama.faces().len(), 6);
        assert_eq!(panorama.faces()[0].face().key, "f");
        assert!(panorama.faces().iter().all(|f| f.max_divisions() == 1));
    }

    #[tokio::test]
    async fn test_missing_face_descriptor_fails() {
        let client = mock_panorama(Some("u"));
        let result = VrPanorama::open(
            FileSystemKind::Folder,
            BASE,
            MeshRenderer::new(Viewport::default()),
            loader(client),
            PanoramaConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(ViewerError::Descriptor(_))));
    }

    #[tokio::test]
    async fn test_from_sources_checks_face_count() {
        let client = mock_panorama(None);
        let result = VrPanorama::from_sources(
            Vec::new(),
            MeshRenderer::new(Viewport::default()),
            loader(client),
            PanoramaConfig::default(),
        );
        assert!(matches!(
            result,
            Err(ViewerError::FaceCount {
                expected: 6,
                found: 0
            })
        ));
    }

    #[tokio::test]
    async fn test_render_draws_after_posters_arrive() {
        let mut panorama = open(PanoramaConfig::default().with_lod(None)).await;

        let quads = panorama.render(RenderCause::Interaction);
        assert!(quads > 0);
        assert_eq!(panorama.renderer().frames(), 1);

        panorama.settle().await;
        panorama.render(RenderCause::Interaction);
        assert!(!panorama.renderer().last_frame().meshes.is_empty());
        assert!(panorama.stats().misses > 0);
    }

    #[tokio::test]
    async fn test_hq_pass_after_idle() {
        let lod = AdaptiveLodConfig::default().with_hq_timing(Duration::ZERO, Duration::ZERO);
        let mut panorama = open(PanoramaConfig::default().with_lod(Some(lod))).await;

        panorama.render(RenderCause::Interaction);
        let later = Instant::now() + Duration::from_millis(10);
        assert!(panorama.hq_tick(later));
        assert_eq!(panorama.renderer().frames(), 2);
        assert_eq!(panorama.lod().map(|l| l.state()), Some(LodState::HqActive));
        assert_eq!(panorama.magnification(), 1.5);

        panorama.render(RenderCause::Interaction);
        assert_ne!(panorama.lod().map(|l| l.state()), Some(LodState::HqActive));
    }

    #[tokio::test]
    async fn test_animate_renders_while_moving() {
        let mut panorama = open(PanoramaConfig::default().with_lod(None)).await;
        let now = Instant::now();
        panorama.view_mut().auto_rotate(now);
        assert_eq!(
            panorama.animate(now + Duration::from_millis(16)),
            StepOutcome::Continue
        );
        assert_eq!(panorama.renderer().frames(), 1);
        assert!(panorama.view().yaw() > 0.0);
    }

    #[tokio::test]
    async fn test_dispose_stops_rendering() {
        let mut panorama = open(PanoramaConfig::default()).await;
        panorama.dispose();
        assert_eq!(panorama.render(RenderCause::Interaction), 0);
        assert!(panorama.is_disposed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hq_timer_ticks_until_cancelled() {
        let token = CancellationToken::new();
        let (handle, mut ticks) = run_hq_timer(Duration::from_millis(100), token.clone());

        assert!(ticks.recv().await.is_some());
        assert!(ticks.recv().await.is_some());

        token.cancel();
        handle.await.unwrap();
        assert!(ticks.recv().await.is_none());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = ConfigFile::default();
        file.view.max_tesselation = 2;
        file.lod.enabled = false;
        let config = PanoramaConfig::from_config_file(&file);
        assert_eq!(config.max_tesselation, Some(2));
        assert!(config.lod.is_none());

        let config = PanoramaConfig::from_config_file(&ConfigFile::default());
        assert_eq!(config.max_tesselation, None);
        assert!(config.lod.is_some());
    }
}
