//! Typed sections of the configuration file.

use crate::filesystem::FileSystemKind;

/// `[source]`: which image to open.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceSettings {
    /// Base URL of the image or panorama. Empty when unset.
    pub base_path: String,
    pub filesystem: FileSystemKind,
}

/// `[loader]`: fetch behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderSettings {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Retry `n` waits `n * retry_step_ms`.
    pub retry_step_ms: u64,
    pub timeout_secs: u64,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_step_ms: 1000,
            timeout_secs: 30,
        }
    }
}

/// `[cache]`: tile cache sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub image_capacity: usize,
    pub evictions_per_purge: usize,
    pub texture_capacity: usize,
    pub decoded_capacity: usize,
    pub texture_evictions_per_purge: usize,
    pub notify_interval_ms: u64,
    pub wrap_x: bool,
    pub wrap_y: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            image_capacity: 512,
            evictions_per_purge: 4,
            texture_capacity: 512,
            decoded_capacity: 2048,
            texture_evictions_per_purge: 64,
            notify_interval_ms: 50,
            wrap_x: false,
            wrap_y: false,
        }
    }
}

/// `[lod]`: adaptive level-of-detail tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct LodSettings {
    pub enabled: bool,
    pub target_fps: f64,
    pub tolerance: f64,
    pub rate: f64,
    pub min_mag: f64,
    pub max_mag: f64,
    pub hq_render_mag: f64,
    pub hq_render_delay_ms: u64,
    pub hq_render_interval_ms: u64,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            target_fps: 30.0,
            tolerance: 0.3,
            rate: 0.1,
            min_mag: 1.5,
            max_mag: 16.0,
            hq_render_mag: 1.5,
            hq_render_delay_ms: 2000,
            hq_render_interval_ms: 1000,
        }
    }
}

/// `[view]`: camera limits and panorama rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSettings {
    pub min_fov: f64,
    pub max_fov: f64,
    pub min_pitch: f64,
    pub max_pitch: f64,
    pub min_yaw: f64,
    pub max_yaw: f64,
    pub fling: bool,
    pub fling_scale: f64,
    pub max_texture_magnification: f64,
    /// Negative means derive from the image size.
    pub max_tesselation: i32,
    pub device_pixel_ratio: f64,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            min_fov: 2.0,
            max_fov: 90.0,
            min_pitch: -90.0,
            max_pitch: 90.0,
            min_yaw: -360.0,
            max_yaw: 720.0,
            fling: true,
            fling_scale: 0.004,
            max_texture_magnification: 1.0,
            max_tesselation: -1,
            device_pixel_ratio: 1.0,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for the rolling log file. Empty disables file logging.
    pub directory: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: String::new(),
        }
    }
}
