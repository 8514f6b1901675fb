//! Panotile - tiled viewer engine for zoomable images and cube-map panoramas
//!
//! This library decides which tiles of an image pyramid are needed for the
//! current view, fetches them asynchronously without duplicate requests,
//! shows degraded imagery while they load and keeps memory bounded with
//! LRU eviction. For panoramas it subdivides each cube face against the
//! camera frustum and adapts the level of detail to the measured frame time.
//!
//! # Architecture
//!
//! ```text
//! ViewState ─► VrPanorama ─► VrFace (x6) ─► subdivide ─► FaceTileCache ─► ResourceLoader
//!                  │                                         │
//!                  └─► AdaptiveLodMonitor                     └─► FallbackSynthesizer
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod face;
pub mod fallback;
pub mod filesystem;
pub mod layer;
pub mod loader;
pub mod lod;
pub mod logging;
pub mod panorama;
pub mod render;
pub mod texture;
pub mod view;

pub use error::ViewerError;
pub use layer::{TileLayer, TilePlacement};
pub use panorama::{run_hq_timer, PanoramaConfig, VrPanorama};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
