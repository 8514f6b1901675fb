//! World-to-screen projection shared by both renderer backends.

use glam::{DMat4, DVec2, DVec3, DVec4};

/// Near clip plane distance.
pub const NEAR_PLANE: f64 = 0.1;

/// Far clip plane distance.
pub const FAR_PLANE: f64 = 100.0;

/// Clip-space `w` values closer to zero than this are treated as degenerate.
pub const W_EPSILON: f64 = 1e-6;

/// Viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(480.0, 480.0)
    }
}

/// Fixed rotation applied to the whole panorama, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransformOffsets {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

/// Camera pose for one frame. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub yaw: f64,
    pub pitch: f64,
    pub fov: f64,
    pub translation: DVec3,
    pub offsets: TransformOffsets,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            fov: 45.0,
            translation: DVec3::ZERO,
            offsets: TransformOffsets::default(),
        }
    }
}

/// Model-view-projection for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    mvp: DMat4,
    viewport: Viewport,
}

impl Projection {
    /// Build the projection for `camera` rendered into `viewport`.
    ///
    /// The model-view matrix is
    /// `translate * rotZ(roll) * rotX(pitch offset) * rotY(yaw offset) * rotY(yaw) * rotX(pitch)`.
    pub fn new(camera: &Camera, viewport: Viewport) -> Self {
        let perspective = DMat4::perspective_rh_gl(
            camera.fov.to_radians(),
            viewport.aspect(),
            NEAR_PLANE,
            FAR_PLANE,
        );
        let model_view = DMat4::from_translation(camera.translation)
            * DMat4::from_rotation_z(camera.offsets.roll.to_radians())
            * DMat4::from_rotation_x(camera.offsets.pitch.to_radians())
            * DMat4::from_rotation_y(camera.offsets.yaw.to_radians())
            * DMat4::from_rotation_y(camera.yaw.to_radians())
            * DMat4::from_rotation_x(camera.pitch.to_radians());

        Self {
            mvp: perspective * model_view,
            viewport,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn matrix(&self) -> DMat4 {
        self.mvp
    }

    /// Project a world point to viewport pixels (y down).
    ///
    /// Returns `None` for points behind the camera or with a degenerate `w`.
    pub fn project(&self, point: DVec3) -> Option<DVec2> {
        let clip: DVec4 = self.mvp * point.extend(1.0);
        if clip.z < 0.0 || clip.w.abs() < W_EPSILON {
            return None;
        }
        let half_w = self.viewport.width / 2.0;
        let half_h = self.viewport.height / 2.0;
        Some(DVec2::new(
            half_w * clip.x / clip.w + half_w,
            -half_h * clip.y / clip.w + half_h,
        ))
    }
}
