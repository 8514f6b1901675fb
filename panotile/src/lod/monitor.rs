//! Frame-time driven magnification control.
//!
//! The monitor watches render begin/end notifications, measures a decimated
//! subset of frames and nudges the maximum texture magnification so that the
//! average frame time stays inside the configured band. After the view has
//! been idle for a while it asks for one sharp render at
//! [`AdaptiveLodConfig::hq_render_mag`].
//!
//! # State Machine
//!
//! ```text
//!            sampled frame                 idle > delay
//! Normal ──────────────────► HqPending ──────────────────► HqActive
//!   ▲                                                        │
//!   └─────────────── render not caused by a texture update ──┘
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::config::AdaptiveLodConfig;

/// Every frame is measured until this many frames have been seen.
const WARMUP_FRAMES: u64 = 20;

/// After warm-up, one in this many frames is measured.
const SAMPLE_EVERY: u64 = 5;

/// Measurements averaged before each adjustment.
const SAMPLE_WINDOW: u32 = 5;

/// Which end of a render a notification marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Begin,
    End,
}

/// Why a render happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderCause {
    /// Camera moved or the host asked for a redraw.
    Interaction,
    /// Newly loaded tiles became available.
    TextureUpdate,
    /// The idle high-quality pass.
    HqPass,
}

impl fmt::Display for RenderCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderCause::Interaction => write!(f, "interaction"),
            RenderCause::TextureUpdate => write!(f, "texture-update"),
            RenderCause::HqPass => write!(f, "hq-pass"),
        }
    }
}

/// Monitor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LodState {
    /// No idle check scheduled.
    Normal,
    /// Waiting for the view to go idle.
    HqPending,
    /// The HQ pass has run; its magnification holds until the next
    /// render that is not a texture update.
    HqActive,
}

impl fmt::Display for LodState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LodState::Normal => write!(f, "normal"),
            LodState::HqPending => write!(f, "hq-pending"),
            LodState::HqActive => write!(f, "hq-active"),
        }
    }
}

/// Adaptive level-of-detail controller.
///
/// The monitor never renders by itself. [`on_render`](Self::on_render) and
/// [`tick`](Self::tick) return the magnification the caller should use; the
/// caller owns the render loop.
#[derive(Debug)]
pub struct AdaptiveLodMonitor {
    config: AdaptiveLodConfig,
    magnification: f64,
    enabled: bool,
    state: LodState,
    frames: u64,
    frame_start: Option<Instant>,
    last_render: Option<Instant>,
    next_hq_check: Option<Instant>,
    samples: u64,
    render_time_total: Duration,
    window_total: Duration,
    window_samples: u32,
}

impl AdaptiveLodMonitor {
    /// Create a monitor starting from `initial_magnification`.
    pub fn new(config: AdaptiveLodConfig, initial_magnification: f64) -> Self {
        Self {
            config,
            magnification: initial_magnification,
            enabled: true,
            state: LodState::Normal,
            frames: 0,
            frame_start: None,
            last_render: None,
            next_hq_check: None,
            samples: 0,
            render_time_total: Duration::ZERO,
            window_total: Duration::ZERO,
            window_samples: 0,
        }
    }

    pub fn config(&self) -> &AdaptiveLodConfig {
        &self.config
    }

    /// Current adaptive magnification.
    pub fn magnification(&self) -> f64 {
        self.magnification
    }

    pub fn state(&self) -> LodState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stop (or resume) influencing magnification. A disabled monitor keeps
    /// accepting notifications but ignores them.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Renders seen since creation, HQ passes excluded.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames measured since creation.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Mean measured frame time, if anything was measured.
    pub fn average_render_time(&self) -> Option<Duration> {
        if self.samples == 0 {
            return None;
        }
        Some(self.render_time_total.div_f64(self.samples as f64))
    }

    /// Handle a render notification.
    ///
    /// # Arguments
    ///
    /// * `phase` - Begin or end of the render
    /// * `cause` - Why the render happens
    /// * `now` - Time of the notification
    ///
    /// # Returns
    ///
    /// The magnification to render with, or `None` to leave it unchanged.
    pub fn on_render(&mut self, phase: RenderPhase, cause: RenderCause, now: Instant) -> Option<f64> {
        if !self.enabled || cause == RenderCause::HqPass {
            return None;
        }

        if self.state == LodState::HqActive {
            if cause == RenderCause::TextureUpdate {
                return Some(self.config.hq_render_mag);
            }
            self.state = LodState::Normal;
        }

        match phase {
            RenderPhase::Begin => {
                self.frames += 1;
                if self.frames < WARMUP_FRAMES || self.frames % SAMPLE_EVERY == 0 {
                    self.frame_start = Some(now);
                    self.last_render = Some(now);
                    if self.state == LodState::Normal {
                        self.state = LodState::HqPending;
                        self.next_hq_check = Some(now + self.config.hq_render_interval);
                    }
                }
            }
            RenderPhase::End => {
                if let Some(start) = self.frame_start.take() {
                    self.sample(now.saturating_duration_since(start));
                }
            }
        }

        Some(self.magnification)
    }

    /// Run the idle check.
    ///
    /// Returns the HQ magnification when the caller should render one
    /// [`RenderCause::HqPass`] frame now.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        if !self.enabled || self.state != LodState::HqPending {
            return None;
        }
        match self.next_hq_check {
            Some(due) if now < due => return None,
            _ => {}
        }

        let idle = self
            .last_render
            .map(|last| now.saturating_duration_since(last) > self.config.hq_render_delay)
            .unwrap_or(true);

        if idle {
            self.state = LodState::HqActive;
            self.next_hq_check = None;
            info!(magnification = self.config.hq_render_mag, "Idle, rendering high quality pass");
            Some(self.config.hq_render_mag)
        } else {
            self.next_hq_check = Some(now + self.config.hq_render_interval);
            None
        }
    }

    fn sample(&mut self, elapsed: Duration) {
        self.samples += 1;
        self.render_time_total += elapsed;
        self.window_total += elapsed;
        self.window_samples += 1;

        if self.window_samples < SAMPLE_WINDOW {
            return;
        }

        let average_ms = self.window_total.as_secs_f64() * 1000.0 / f64::from(self.window_samples);
        self.window_total = Duration::ZERO;
        self.window_samples = 0;

        let before = self.magnification;
        if average_ms < self.config.lower_frame_ms() {
            self.increase_detail();
        } else if average_ms > self.config.upper_frame_ms() {
            self.decrease_detail();
        }

        if self.magnification != before {
            debug!(
                average_ms = format!("{:.1}", average_ms),
                from = before,
                to = self.magnification,
                "Adjusted texture magnification"
            );
        }
    }

    fn increase_detail(&mut self) {
        self.magnification = (self.magnification / (1.0 + self.config.rate)).max(self.config.min_mag);
    }

    fn decrease_detail(&mut self) {
        self.magnification = (self.magnification * (1.0 + self.config.rate)).min(self.config.max_mag);
    }
}
