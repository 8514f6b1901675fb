//! Configuration for the adaptive LOD monitor.
//!
//! ```ini
//! [lod]
//! enabled = true
//! target_fps = 30
//! tolerance = 0.3
//! rate = 0.1
//! min_mag = 1.5
//! max_mag = 16
//! hq_render_mag = 1.5
//! hq_render_delay_ms = 2000
//! hq_render_interval_ms = 1000
//! ```

use std::time::Duration;

use crate::config::LodSettings;

/// Tuning for [`AdaptiveLodMonitor`](super::AdaptiveLodMonitor).
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveLodConfig {
    /// Frame rate the monitor tries to hold.
    pub target_fps: f64,

    /// Accepted deviation from the target frame time, as a fraction.
    ///
    /// With 0.3 the window average may lie anywhere in
    /// `[target / 1.3, target * 1.3]` without an adjustment.
    pub tolerance: f64,

    /// Relative magnification change per adjustment.
    pub rate: f64,

    /// Sharpest magnification the monitor will choose.
    pub min_mag: f64,

    /// Blurriest magnification the monitor will choose.
    pub max_mag: f64,

    /// Magnification used for the idle high-quality pass.
    pub hq_render_mag: f64,

    /// Idle time after the last sampled render before the HQ pass.
    pub hq_render_delay: Duration,

    /// How often the idle check runs.
    pub hq_render_interval: Duration,
}

impl Default for AdaptiveLodConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            tolerance: 0.3,
            rate: 0.1,
            min_mag: 1.5,
            max_mag: 16.0,
            hq_render_mag: 1.5,
            hq_render_delay: Duration::from_millis(2000),
            hq_render_interval: Duration::from_millis(1000),
        }
    }
}

impl AdaptiveLodConfig {
    /// Build from the `[lod]` section of the config file.
    pub fn from_settings(settings: &LodSettings) -> Self {
        Self {
            target_fps: settings.target_fps,
            tolerance: settings.tolerance,
            rate: settings.rate,
            min_mag: settings.min_mag,
            max_mag: settings.max_mag,
            hq_render_mag: settings.hq_render_mag,
            hq_render_delay: Duration::from_millis(settings.hq_render_delay_ms),
            hq_render_interval: Duration::from_millis(settings.hq_render_interval_ms),
        }
    }

    pub fn with_target_fps(mut self, fps: f64) -> Self {
        self.target_fps = fps;
        self
    }

    pub fn with_magnification_range(mut self, min_mag: f64, max_mag: f64) -> Self {
        self.min_mag = min_mag;
        self.max_mag = max_mag;
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_hq_timing(mut self, delay: Duration, interval: Duration) -> Self {
        self.hq_render_delay = delay;
        self.hq_render_interval = interval;
        self
    }

    /// Target frame time in milliseconds.
    pub fn target_frame_ms(&self) -> f64 {
        1000.0 / self.target_fps
    }

    /// Window averages below this raise detail.
    pub fn lower_frame_ms(&self) -> f64 {
        self.target_frame_ms() / (1.0 + self.tolerance)
    }

    /// Window averages above this lower detail.
    pub fn upper_frame_ms(&self) -> f64 {
        self.target_frame_ms() * (1.0 + self.tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = AdaptiveLodConfig::default();
        assert!((config.target_frame_ms() - 33.333).abs() < 0.001);
        assert!((config.lower_frame_ms() - 25.641).abs() < 0.001);
        assert!((config.upper_frame_ms() - 43.333).abs() < 0.001);
    }

    #[test]
    fn test_from_settings() {
        let settings = LodSettings {
            target_fps: 60.0,
            hq_render_delay_ms: 500,
            ..Default::default()
        };
        let config = AdaptiveLodConfig::from_settings(&settings);
        assert_eq!(config.target_fps, 60.0);
        assert_eq!(config.hq_render_delay, Duration::from_millis(500));
        assert_eq!(config.max_mag, 16.0);
    }
}
