//! Camera and the per-frame shader parameter block.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// The per-frame parameter block pushed to the vertex stage.
///
/// Layout must match the push-constant block in `particle.vert`; the total
/// size must be a multiple of 4 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct FrameParams {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

/// Fixed-eye camera looking into the particle cloud, with a slow model spin.
///
/// Vulkan clip space is z in [0, 1] with +y down; the down-pointing up vector
/// below keeps world space y-up while matching that convention.
#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
    /// Accumulated model rotation around +y, in radians.
    pub spin: f32,
    /// Spin rate in radians per second.
    pub spin_rate: f32,
}

impl Camera {
    /// Camera framing the default simulation volume.
    pub fn new() -> Self {
        Self {
            eye: Vec3::new(0.0, 50.0, 110.0),
            target: Vec3::new(0.0, -100.0, 0.0),
            fov_y_radians: 90.0_f32.to_radians(),
            near: 0.001,
            far: 1000.0,
            spin: 0.0,
            spin_rate: 0.1_f32.to_radians() * 60.0,
        }
    }

    /// Advance the model spin by one frame of `delta` seconds.
    pub fn update(&mut self, delta: f32) {
        self.spin += self.spin_rate * delta;
    }

    /// Build the parameter block for the given viewport aspect ratio.
    pub fn frame_params(&self, aspect: f32) -> FrameParams {
        FrameParams {
            model: Mat4::from_rotation_y(self.spin),
            view: Mat4::look_at_rh(self.eye, self.target, Vec3::new(0.0, -1.0, 0.0)),
            proj: Mat4::perspective_rh(self.fov_y_radians, aspect, self.near, self.far),
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_frame_params_size() {
        // Push-constant blocks must be 4-byte granular.
        assert_eq!(size_of::<FrameParams>(), 192);
        assert_eq!(size_of::<FrameParams>() % 4, 0);
    }

    #[test]
    fn test_update_accumulates_spin() {
        let mut camera = Camera::new();
        let before = camera.spin;
        camera.update(1.0);
        assert!(camera.spin > before);
    }

    #[test]
    fn test_frame_params_identity_free() {
        let camera = Camera::new();
        let params = camera.frame_params(800.0 / 600.0);
        // A fresh camera has no spin: model is the identity.
        assert_eq!(params.model, Mat4::IDENTITY);
        assert_ne!(params.view, Mat4::IDENTITY);
        assert_ne!(params.proj, Mat4::IDENTITY);
    }
}
