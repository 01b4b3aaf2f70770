//! The particle record shared by the simulation and rendering stages.
//!
//! The layout is a hard contract: the compute stage reads and writes whole
//! records, the graphics stage reads `position`, `color` and `radius` as
//! vertex attributes from the same bytes. Everything is kept 16-byte aligned;
//! `vec3` fields are widened to `Vec4` since std430 packing would pad them to
//! 16 bytes anyway.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use rand::Rng;

/// One simulated particle. SI units throughout.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// World position, `w` fixed at 1.
    pub position: Vec4,
    /// Velocity in m/s, `w` unused.
    pub velocity: Vec4,
    /// Accumulated force in N, `w` unused.
    pub force: Vec4,
    /// RGBA color, each channel in [0, 1].
    pub color: Vec4,
    /// Mass in kg.
    pub mass: f32,
    /// Radius in m.
    pub radius: f32,
    _pad: [f32; 2],
}

/// Byte stride of one particle record in the device buffers.
pub const PARTICLE_STRIDE: u64 = std::mem::size_of::<Particle>() as u64;

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec4::new(0.0, 0.0, 0.0, 1.0),
            velocity: Vec4::new(0.0, 0.0, 0.0, 1.0),
            force: Vec4::new(0.0, 0.0, 0.0, 1.0),
            color: Vec4::ONE,
            mass: 1.0,
            radius: 1.0,
            _pad: [0.0; 2],
        }
    }
}

/// Create the initial particle set with randomized state.
///
/// Positions and velocities are uniform in a 20 m cube around the origin,
/// masses span [0.1, 100] kg, colors are uniform RGB. This runs exactly once
/// at startup; afterwards the compute stage owns all mutation.
pub fn seed_particles<R: Rng>(count: u32, rng: &mut R) -> Vec<Particle> {
    (0..count)
        .map(|_| Particle {
            position: Vec4::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                1.0,
            ),
            velocity: Vec4::new(
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                rng.gen_range(-10.0..10.0),
                1.0,
            ),
            color: Vec4::new(
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
                rng.gen_range(0.0..1.0),
                1.0,
            ),
            mass: rng.gen_range(0.1..100.0),
            ..Default::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, offset_of, size_of};

    #[test]
    fn test_particle_layout_contract() {
        // Four vec4 fields plus four scalars, no implicit padding.
        assert_eq!(size_of::<Particle>(), 80);
        assert_eq!(align_of::<Particle>(), 16);
        assert_eq!(size_of::<Particle>() % 16, 0);
    }

    #[test]
    fn test_vertex_attribute_offsets() {
        // The graphics pipeline binds these three fields by offset.
        assert_eq!(offset_of!(Particle, position), 0);
        assert_eq!(offset_of!(Particle, color), 48);
        assert_eq!(offset_of!(Particle, radius), 68);
    }

    #[test]
    fn test_seed_produces_requested_count() {
        let mut rng = rand::thread_rng();
        let particles = seed_particles(1000, &mut rng);
        assert_eq!(particles.len(), 1000);
        for p in &particles {
            assert!(p.mass >= 0.1 && p.mass < 100.0);
            assert!(p.position.w == 1.0);
            assert!(p.position.x.abs() <= 10.0);
        }
    }
}
