//! Per-frame motion of a [`ViewState`].

use std::time::Instant;

use super::{circle_distance, ease, millis_between, ViewState, DEFAULT_FOV};

/// Components stop once their step falls to this size.
const STOP_DELTA: f64 = 0.01;

/// Fling stops once its decay factor falls to this.
const FLING_STOP_FACTOR: f64 = 0.01;

/// Auto-rotation eases the field of view back at this speed.
const AUTO_ROTATE_FOV_SPEED: f64 = 0.1;

/// Result of one animation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The view moved and the animation wants another step.
    Continue,
    /// Nothing moved; the animation is over.
    Finished,
    /// A newer animation or a drag superseded this one.
    Stale,
}

#[derive(Debug, Clone, Copy)]
pub(super) enum Motion {
    RotateTo { yaw: f64, pitch: f64, fov: f64, speed: f64 },
    AutoRotate { dy: f64, speed: f64 },
    Fling { vx: f64, vy: f64, scale: f64, decay: f64, started: Instant },
}

#[derive(Debug, Clone, Copy)]
enum Component {
    Yaw,
    Pitch,
    Fov,
}

#[derive(Debug, Clone)]
pub(super) struct Animation {
    motion: Motion,
    last_step: Instant,
    active: [bool; 3],
}

impl Animation {
    pub(super) fn new(motion: Motion, now: Instant) -> Self {
        Self {
            motion,
            last_step: now,
            active: [true; 3],
        }
    }

    /// Apply one step to `view`.
    pub(super) fn step(&mut self, view: &mut ViewState, now: Instant) -> StepOutcome {
        let elapsed_ms = millis_between(self.last_step, now);
        self.last_step = now;

        let mut moved = false;
        for (index, component) in [Component::Yaw, Component::Pitch, Component::Fov]
            .into_iter()
            .enumerate()
        {
            if !self.active[index] {
                continue;
            }
            match self.delta(view, component, elapsed_ms, now) {
                Some(delta) => {
                    moved = true;
                    match component {
                        Component::Yaw => view.set_yaw(view.yaw + delta),
                        Component::Pitch => view.set_pitch(view.pitch + delta),
                        Component::Fov => view.set_fov(view.fov + delta),
                    }
                }
                None => self.active[index] = false,
            }
        }

        if moved {
            StepOutcome::Continue
        } else {
            StepOutcome::Finished
        }
    }

    fn delta(&mut self, view: &ViewState, component: Component, elapsed_ms: f64, now: Instant) -> Option<f64> {
        match (self.motion, component) {
            (Motion::RotateTo { yaw, speed, .. }, Component::Yaw) => {
                let distance = circle_distance(yaw, view.yaw);
                significant(-ease(0.0, distance, speed, None))
            }
            (Motion::RotateTo { pitch, speed, .. }, Component::Pitch) => {
                significant(ease(view.pitch, pitch, speed, None))
            }
            (Motion::RotateTo { fov, speed, .. }, Component::Fov) => {
                significant(ease(view.fov, fov, speed, None))
            }

            (Motion::AutoRotate { dy, speed }, Component::Yaw) => {
                let next = view.yaw + dy;
                let config = &view.config;
                let outside = if config.min_yaw < config.max_yaw {
                    next > config.max_yaw || next < config.min_yaw
                } else {
                    let wrapped = next.rem_euclid(360.0);
                    wrapped <= config.min_yaw && wrapped > config.max_yaw
                };
                let dy = if outside { -dy } else { dy };
                self.motion = Motion::AutoRotate { dy, speed };
                Some(dy)
            }
            (Motion::AutoRotate { speed, .. }, Component::Pitch) => {
                Some(ease(view.pitch, 0.0, speed, None))
            }
            (Motion::AutoRotate { .. }, Component::Fov) => {
                Some(ease(view.fov, DEFAULT_FOV, AUTO_ROTATE_FOV_SPEED, None))
            }

            (Motion::Fling { .. }, Component::Fov) => None,
            (Motion::Fling { vx, vy, scale, decay, started }, axis) => {
                let t = millis_between(started, now);
                let factor = (-t * decay).exp2();
                if factor <= FLING_STOP_FACTOR {
                    return None;
                }
                let velocity = if matches!(axis, Component::Yaw) { vx } else { vy };
                Some(velocity * elapsed_ms * scale * factor)
            }
        }
    }
}

fn significant(delta: f64) -> Option<f64> {
    (delta.abs() > STOP_DELTA).then_some(delta)
}
