//! Camera state for panoramas.
//!
//! [`ViewState`] holds yaw, pitch, field of view and translation, applies the
//! configured limits on every change and runs the animated transitions
//! (smooth rotation, auto-rotation, fling). Animations are cancelled by
//! staleness: starting a new one or dragging bumps a generation counter, and
//! a step carrying an older generation does nothing.

mod animation;

pub use animation::StepOutcome;

use std::time::Instant;

use glam::DVec3;
use tracing::debug;

use crate::config::ViewSettings;
use crate::render::{Camera, TransformOffsets};
use animation::{Animation, Motion};

/// Field of view a new view starts with, and auto-rotation eases back to.
pub const DEFAULT_FOV: f64 = 45.0;

/// Fling is only started for releases at least this fast (pixels per ms).
const FLING_MIN_VELOCITY: f64 = 0.05;

/// Fling is only started if the pointer moved within this many ms of release.
const FLING_MAX_RELEASE_DELAY_MS: f64 = 250.0;

/// Minimum spacing between drag velocity samples, in ms.
const DRAG_SAMPLE_MS: f64 = 20.0;

/// Limits and behavior of a [`ViewState`].
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    pub min_fov: f64,
    pub max_fov: f64,
    pub min_pitch: f64,
    pub max_pitch: f64,
    /// Allowed yaw interval. When `min_yaw > max_yaw` the interval wraps
    /// through 0.
    pub min_yaw: f64,
    pub max_yaw: f64,
    /// Keep rotating after a quick drag release.
    pub fling: bool,
    /// Fling decay: velocity is scaled by `2^(-t * fling_scale)` after `t` ms.
    pub fling_scale: f64,
    pub offsets: TransformOffsets,
}

impl Default for ViewConfig {
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
            offsets: TransformOffsets::default(),
        }
    }
}

impl ViewConfig {
    /// Build from the `[view]` section of the config file.
    pub fn from_settings(settings: &ViewSettings) -> Self {
        Self {
            min_fov: settings.min_fov,
            max_fov: settings.max_fov,
            min_pitch: settings.min_pitch,
            max_pitch: settings.max_pitch,
            min_yaw: settings.min_yaw,
            max_yaw: settings.max_yaw,
            fling: settings.fling,
            fling_scale: settings.fling_scale,
            offsets: TransformOffsets::default(),
        }
    }

    pub fn with_yaw_range(mut self, min_yaw: f64, max_yaw: f64) -> Self {
        self.min_yaw = min_yaw;
        self.max_yaw = max_yaw;
        self
    }

    pub fn with_offsets(mut self, offsets: TransformOffsets) -> Self {
        self.offsets = offsets;
        self
    }

    pub fn with_fling(mut self, fling: bool) -> Self {
        self.fling = fling;
        self
    }
}

/// Signed shortest angular distance from `p0` to `p1`, in degrees.
pub fn circle_distance(p0: f64, p1: f64) -> f64 {
    let direct = p1 - p0;
    let around = if p1 > p0 {
        (p1 - 360.0) - p0
    } else {
        (360.0 - p0) + p1
    };
    if direct.abs() < around.abs() {
        direct
    } else {
        around
    }
}

/// Whichever of `p1` and `p2` is closer to `p` on the circle.
pub fn circle_snap_to(p: f64, p1: f64, p2: f64) -> f64 {
    if circle_distance(p, p1).abs() < circle_distance(p, p2).abs() {
        p1
    } else {
        p2
    }
}

/// Step that moves `current` toward `target`.
///
/// Far away the step is a constant `speed`; closer in it shrinks in
/// proportion to the distance, and within `snap_from` (default `speed / 5`)
/// it lands exactly on the target.
pub fn ease(current: f64, target: f64, speed: f64, snap_from: Option<f64>) -> f64 {
    let easing_from = speed * 40.0;
    let snap_from = snap_from.unwrap_or(speed / 5.0);
    let ignore_from = speed / 1000.0;
    let distance = current - target;

    if distance > easing_from {
        -speed
    } else if distance < -easing_from {
        speed
    } else if distance.abs() < snap_from {
        -distance
    } else if distance.abs() < ignore_from {
        0.0
    } else {
        -(speed * distance) / easing_from
    }
}

#[derive(Debug, Clone, Copy)]
struct DragSample {
    x: f64,
    y: f64,
    dx: f64,
    dy: f64,
    dt: f64,
    time: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    x: f64,
    y: f64,
    last: DragSample,
}

/// Camera pose with limits and animations.
#[derive(Debug, Clone)]
pub struct ViewState {
    config: ViewConfig,
    yaw: f64,
    pitch: f64,
    fov: f64,
    translation: DVec3,
    generation: u64,
    animation: Option<Animation>,
    drag: Option<Drag>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(ViewConfig::default())
    }
}

impl ViewState {
    pub fn new(config: ViewConfig) -> Self {
        let mut view = Self {
            config,
            yaw: 0.0,
            pitch: 0.0,
            fov: DEFAULT_FOV,
            translation: DVec3::ZERO,
            generation: 0,
            animation: None,
            drag: None,
        };
        view.set_pitch(0.0);
        view.set_yaw(0.0);
        view.set_fov(DEFAULT_FOV);
        view
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn yaw(&self) -> f64 {
        self.yaw
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn fov(&self) -> f64 {
        self.fov
    }

    pub fn translation(&self) -> DVec3 {
        self.translation
    }

    pub fn set_yaw(&mut self, yaw: f64) {
        self.yaw = self.snap_yaw(yaw);
    }

    pub fn set_pitch(&mut self, pitch: f64) {
        self.pitch = self.snap_pitch(pitch);
    }

    pub fn set_fov(&mut self, fov: f64) {
        self.fov = fov.min(self.config.max_fov).max(self.config.min_fov);
    }

    pub fn set_translation(&mut self, translation: DVec3) {
        self.translation = translation;
    }

    /// Camera for the current pose.
    pub fn camera(&self) -> Camera {
        Camera {
            yaw: self.yaw,
            pitch: self.pitch,
            fov: self.fov,
            translation: self.translation,
            offsets: self.config.offsets,
        }
    }

    pub fn snap_pitch(&self, pitch: f64) -> f64 {
        pitch.min(self.config.max_pitch).max(self.config.min_pitch)
    }

    /// Normalize `yaw` into `[0, 360)` and move it to the nearest end of the
    /// allowed interval when it falls outside.
    pub fn snap_yaw(&self, yaw: f64) -> f64 {
        let y = yaw.rem_euclid(360.0);
        let (min, max) = (self.config.min_yaw, self.config.max_yaw);
        if min < max {
            if y > max || y < min {
                return circle_snap_to(y, min, max);
            }
        } else if y <= min && y > max {
            // The interval wraps through 0 and y is on the excluded arc.
            return circle_snap_to(y, min, max);
        }
        y
    }

    /// Current animation generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Stop any running animation.
    pub fn cancel_animation(&mut self) {
        self.generation += 1;
        self.animation = None;
    }

    fn start(&mut self, motion: Motion, now: Instant) -> u64 {
        self.generation += 1;
        self.animation = Some(Animation::new(motion, now));
        self.generation
    }

    /// Ease toward a target pose.
    ///
    /// Returns the generation to pass to [`step_animation`](Self::step_animation).
    pub fn smooth_rotate_to(&mut self, yaw: f64, pitch: f64, fov: f64, speed: f64, now: Instant) -> u64 {
        let yaw = self.snap_yaw(yaw);
        let pitch = self.snap_pitch(pitch);
        debug!(yaw, pitch, fov, speed, "Smooth rotation started");
        self.start(Motion::RotateTo { yaw, pitch, fov, speed }, now)
    }

    /// Rotate slowly around the yaw axis, bouncing at the yaw limits, while
    /// easing pitch back to level and fov back to the default.
    pub fn auto_rotate(&mut self, now: Instant) -> u64 {
        let speed = self.fov / 400.0;
        self.start(Motion::AutoRotate { dy: speed, speed }, now)
    }

    /// Advance the animation started with `generation` to `now`.
    pub fn step_animation(&mut self, generation: u64, now: Instant) -> StepOutcome {
        if generation != self.generation {
            return StepOutcome::Stale;
        }
        let Some(mut animation) = self.animation.take() else {
            return StepOutcome::Finished;
        };
        let outcome = animation.step(self, now);
        if outcome == StepOutcome::Continue {
            self.animation = Some(animation);
        }
        outcome
    }

    /// Advance whatever animation is current.
    pub fn animate(&mut self, now: Instant) -> StepOutcome {
        self.step_animation(self.generation, now)
    }

    /// Pointer pressed. Cancels any running animation.
    pub fn drag_start(&mut self, x: f64, y: f64, now: Instant) {
        self.cancel_animation();
        self.drag = Some(Drag {
            x,
            y,
            last: DragSample {
                x,
                y,
                dx: 0.0,
                dy: 0.0,
                dt: 1_000_000.0,
                time: now,
            },
        });
    }

    /// Pointer moved while pressed: grab-pan the view.
    ///
    /// Returns `false` when no drag is in progress.
    pub fn drag_move(&mut self, x: f64, y: f64, now: Instant, viewport_height: f64) -> bool {
        let Some(mut drag) = self.drag else {
            return false;
        };
        self.cancel_animation();

        let scale = self.fov / viewport_height;
        self.set_yaw(self.yaw - (x - drag.x) * scale);
        self.set_pitch(self.pitch - (y - drag.y) * scale);
        drag.x = x;
        drag.y = y;

        let dt = millis_between(drag.last.time, now);
        if dt > DRAG_SAMPLE_MS {
            drag.last = DragSample {
                x,
                y,
                dx: drag.last.x - x,
                dy: drag.last.y - y,
                dt,
                time: now,
            };
        }
        self.drag = Some(drag);
        true
    }

    /// Pointer released.
    ///
    /// Starts a fling when the release was quick enough and returns its
    /// generation; otherwise stops all motion and returns `None`.
    pub fn drag_end(&mut self, now: Instant, viewport_height: f64) -> Option<u64> {
        let drag = self.drag.take()?;
        let DragSample { dx, dy, dt, time, .. } = drag.last;
        let distance = dx.hypot(dy);
        let since_last_move = millis_between(time, now);
        let velocity = if dt > 0.0 { distance / dt } else { 0.0 };

        if velocity > FLING_MIN_VELOCITY
            && since_last_move < FLING_MAX_RELEASE_DELAY_MS
            && dt > DRAG_SAMPLE_MS
            && self.config.fling
        {
            let motion = Motion::Fling {
                vx: dx / dt,
                vy: dy / dt,
                scale: self.fov / viewport_height,
                decay: self.config.fling_scale,
                started: now,
            };
            debug!(velocity, "Fling started");
            Some(self.start(motion, now))
        } else {
            self.cancel_animation();
            None
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }
}

pub(crate) fn millis_between(earlier: Instant, later: Instant) -> f64 {
    later.saturating_duration_since(earlier).as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_circle_distance_takes_short_way() {
        assert_eq!(circle_distance(350.0, 10.0), 20.0);
        assert_eq!(circle_distance(10.0, 350.0), -20.0);
        assert_eq!(circle_distance(0.0, 90.0), 90.0);
    }

    #[test]
    fn test_ease_regions() {
        assert_eq!(ease(0.0, 100.0, 1.0, None), 1.0);
        assert_eq!(ease(100.0, 0.0, 1.0, None), -1.0);
        assert!((ease(10.0, 9.9, 1.0, None) + 0.1).abs() < 1e-12);
        assert_eq!(ease(10.0, 5.0, 1.0, None), -0.125);
    }

    #[test]
    fn test_clamping() {
        let mut view = ViewState::default();
        view.set_fov(200.0);
        assert_eq!(view.fov(), 90.0);
        view.set_fov(0.5);
        assert_eq!(view.fov(), 2.0);
        view.set_pitch(-120.0);
        assert_eq!(view.pitch(), -90.0);
        view.set_yaw(-30.0);
        assert_eq!(view.yaw(), 330.0);
    }

    #[test]
    fn test_yaw_interval_through_zero() {
        let view = ViewState::new(ViewConfig::default().with_yaw_range(350.0, 10.0));
        assert_eq!(view.snap_yaw(5.0), 5.0);
        assert_eq!(view.snap_yaw(355.0), 355.0);
        assert_eq!(view.snap_yaw(180.0), 10.0);
        assert_eq!(view.snap_yaw(200.0), 350.0);
    }

    #[test]
    fn test_plain_yaw_interval() {
        let view = ViewState::new(ViewConfig::default().with_yaw_range(90.0, 180.0));
        assert_eq!(view.snap_yaw(120.0), 120.0);
        assert_eq!(view.snap_yaw(60.0), 90.0);
        assert_eq!(view.snap_yaw(200.0), 180.0);
    }

    #[test]
    fn test_smooth_rotate_to_converges() {
        let mut view = ViewState::default();
        let t0 = Instant::now();
        let generation = view.smooth_rotate_to(10.0, 5.0, 45.0, 45.0 / 200.0, t0);

        let mut steps = 0;
        while view.step_animation(generation, t0 + ms(steps * 16)) == StepOutcome::Continue {
            steps += 1;
            assert!(steps < 10_000, "animation never finished");
        }
        assert!((view.yaw() - 10.0).abs() <= 0.5);
        assert!((view.pitch() - 5.0).abs() <= 0.5);
        assert!(!view.is_animating());
    }

    #[test]
    fn test_new_animation_makes_old_one_stale() {
        let mut view = ViewState::default();
        let t0 = Instant::now();
        let first = view.smooth_rotate_to(90.0, 0.0, 45.0, 1.0, t0);
        let second = view.auto_rotate(t0);
        assert_eq!(view.step_animation(first, t0 + ms(16)), StepOutcome::Stale);
        assert_eq!(view.step_animation(second, t0 + ms(16)), StepOutcome::Continue);
    }

    #[test]
    fn test_drag_cancels_animation() {
        let mut view = ViewState::default();
        let t0 = Instant::now();
        let generation = view.auto_rotate(t0);
        view.drag_start(10.0, 10.0, t0);
        assert_eq!(view.step_animation(generation, t0 + ms(16)), StepOutcome::Stale);
        assert!(!view.is_animating());
    }

    #[test]
    fn test_drag_pans_view() {
        let mut view = ViewState::default();
        let t0 = Instant::now();
        view.drag_start(100.0, 100.0, t0);
        assert!(view.drag_move(52.0, 100.0, t0 + ms(10), 480.0));
        // 48 px left at 45 degrees per 480 px.
        assert!((view.yaw() - 4.5).abs() < 1e-9);
        assert_eq!(view.pitch(), 0.0);
    }

    #[test]
    fn test_slow_release_does_not_fling() {
        let mut view = ViewState::default();
        let t0 = Instant::now();
        view.drag_start(0.0, 0.0, t0);
        view.drag_move(-30.0, 0.0, t0 + ms(30), 480.0);
        assert_eq!(view.drag_end(t0 + ms(600), 480.0), None);
        assert!(!view.is_animating());
    }

    #[test]
    fn test_fling_decays_and_finishes() {
        let mut view = ViewState::default();
        let t0 = Instant::now();
        view.drag_start(0.0, 0.0, t0);
        view.drag_move(-30.0, 0.0, t0 + ms(30), 480.0);
        let yaw_after_drag = view.yaw();

        let released = t0 + ms(40);
        let generation = view.drag_end(released, 480.0).expect("fling");
        assert_eq!(view.step_animation(generation, released + ms(16)), StepOutcome::Continue);
        assert!(view.yaw() > yaw_after_drag);

        assert_eq!(
            view.step_animation(generation, released + ms(2000)),
            StepOutcome::Finished
        );
        assert_eq!(
            view.step_animation(generation, released + ms(2016)),
            StepOutcome::Finished
        );
    }

    #[test]
    fn test_fling_disabled() {
        let mut view = ViewState::new(ViewConfig::default().with_fling(false));
        let t0 = Instant::now();
        view.drag_start(0.0, 0.0, t0);
        view.drag_move(-30.0, 0.0, t0 + ms(30), 480.0);
        assert_eq!(view.drag_end(t0 + ms(40), 480.0), None);
    }

    #[test]
    fn test_auto_rotate_bounces_at_limit() {
        let mut view = ViewState::new(ViewConfig::default().with_yaw_range(0.0, 10.0));
        view.set_yaw(9.95);
        let t0 = Instant::now();
        let generation = view.auto_rotate(t0);
        view.step_animation(generation, t0 + ms(16));
        assert!(view.yaw() < 9.95);
        view.step_animation(generation, t0 + ms(32));
        assert!(view.yaw() < 9.9);
    }
}
