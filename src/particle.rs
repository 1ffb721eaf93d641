//! Particle record shared by the CPU and every GPU stage.
//!
//! The layout is fixed: three `vec4<f32>` fields, 48 bytes per particle. The
//! homogeneous component of `position` is always 1 and that of `velocity` and
//! `force` always 0, so the same record can be pushed through a 4×4 matrix in
//! any shader without special-casing.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// One point mass of the particle field.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// Position, `w = 1`.
    pub position: [f32; 4],
    /// Velocity, `w = 0`.
    pub velocity: [f32; 4],
    /// Force applied during the last update, `w = 0`.
    pub force: [f32; 4],
}

impl Particle {
    /// Size in bytes of one particle on the GPU.
    pub const SIZE: u64 = std::mem::size_of::<Particle>() as u64;

    /// WGSL declaration matching this layout.
    pub const WGSL_STRUCT: &'static str = r#"struct Particle {
    position: vec4<f32>,
    velocity: vec4<f32>,
    force: vec4<f32>,
};
"#;

    /// A particle at rest.
    pub fn new(position: Vec3) -> Self {
        Self::from_parts(position, Vec3::ZERO, Vec3::ZERO)
    }

    /// A particle launched with an initial velocity.
    pub fn with_velocity(position: Vec3, velocity: Vec3) -> Self {
        Self::from_parts(position, velocity, Vec3::ZERO)
    }

    /// A particle with every field given explicitly.
    pub fn from_parts(position: Vec3, velocity: Vec3, force: Vec3) -> Self {
        Self {
            position: position.extend(1.0).to_array(),
            velocity: velocity.extend(0.0).to_array(),
            force: force.extend(0.0).to_array(),
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec4::from_array(self.position).truncate()
    }

    #[inline]
    pub fn velocity(&self) -> Vec3 {
        Vec4::from_array(self.velocity).truncate()
    }

    #[inline]
    pub fn force(&self) -> Vec3 {
        Vec4::from_array(self.force).truncate()
    }

    /// Whether the homogeneous components hold their required 1/0/0 values.
    pub fn is_homogeneous(&self) -> bool {
        self.position[3] == 1.0 && self.velocity[3] == 0.0 && self.force[3] == 0.0
    }
}

impl Default for Particle {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}
