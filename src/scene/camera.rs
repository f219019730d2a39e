use glam::{Mat4, Vec3};

/// Camera state consumed by the pipeline.
///
/// The projection matrix is public and mutable: the orchestrator jitters it
/// during temporal accumulation and restores the saved value before returning,
/// so callers never observe the jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Clip-from-view matrix (wgpu depth range `[0, 1]`).
    pub projection_matrix: Mat4,
    /// World-from-camera transform. The view matrix is its inverse.
    pub world_matrix: Mat4,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(45.0_f32.to_radians(), 1.0, 0.1, 1000.0)
    }
}

impl Camera {
    /// Creates a right-handed perspective camera at the origin looking down -Z.
    #[must_use]
    pub fn perspective(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection_matrix: Mat4::perspective_rh(fov_y_radians, aspect, near, far),
            world_matrix: Mat4::IDENTITY,
            near,
            far,
        }
    }

    /// Places the camera at `eye` looking at `target`.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.world_matrix = Mat4::look_at_rh(eye, target, up).inverse();
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.world_matrix.inverse()
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix()
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.world_matrix.w_axis.truncate()
    }
}
