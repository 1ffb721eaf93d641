//! Physics parameters and the reference integrator.
//!
//! The GPU update kernel (`gpu::kernel`) runs the arithmetic in [`step`] once
//! per particle. Keeping a CPU copy makes the force model testable without an
//! adapter and gives the parity test something to compare against.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::particle::Particle;

/// The single sphere the particles collide with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obstacle {
    /// Center in model space.
    pub center: Vec3,
    /// Sphere radius; the spring acts relative to this surface.
    pub radius: f32,
}

impl Obstacle {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Packed as `vec4(center, radius)` for the kernel uniform.
    pub fn to_vec4(&self) -> [f32; 4] {
        self.center.extend(self.radius).to_array()
    }
}

/// Tunable constants of one physics step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsParams {
    /// Rest distance from the obstacle surface.
    pub equilibrium: f32,
    /// Spring constant.
    pub spring: f32,
    /// Drag coefficient.
    pub attenuation: f32,
    /// Particle mass.
    pub weight: f32,
    /// Distance from the obstacle surface within which the spring acts.
    pub range: f32,
    /// Integration step in seconds.
    pub timestep: f32,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            equilibrium: 0.1,
            spring: 1.0,
            attenuation: 5.0,
            weight: 1.0,
            range: 0.5,
            timestep: 1.0 / 60.0,
        }
    }
}

impl PhysicsParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_equilibrium(mut self, equilibrium: f32) -> Self {
        self.equilibrium = equilibrium;
        self
    }

    pub fn with_spring(mut self, spring: f32) -> Self {
        self.spring = spring;
        self
    }

    pub fn with_attenuation(mut self, attenuation: f32) -> Self {
        self.attenuation = attenuation;
        self
    }

    /// Set the particle mass. Must be positive; the step divides by it.
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_range(mut self, range: f32) -> Self {
        self.range = range;
        self
    }

    pub fn with_timestep(mut self, timestep: f32) -> Self {
        self.timestep = timestep;
        self
    }
}

/// Uniform block consumed by the update kernel.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub(crate) struct UpdateUniforms {
    pub sphere: [f32; 4],
    pub equilibrium: f32,
    pub spring: f32,
    pub attenuation: f32,
    pub weight: f32,
    pub range: f32,
    pub timestep: f32,
    pub count: u32,
    pub _padding: u32,
}

impl UpdateUniforms {
    pub fn new(obstacle: &Obstacle, params: &PhysicsParams, count: u32) -> Self {
        Self {
            sphere: obstacle.to_vec4(),
            equilibrium: params.equilibrium,
            spring: params.spring,
            attenuation: params.attenuation,
            weight: params.weight,
            range: params.range,
            timestep: params.timestep,
            count,
            _padding: 0,
        }
    }
}

/// Spring force the obstacle exerts on a particle at `position`.
///
/// Zero outside `range` of the surface and when the particle sits exactly on
/// the obstacle center, where no direction is defined.
pub fn spring_force(position: Vec3, obstacle: &Obstacle, params: &PhysicsParams) -> Vec3 {
    let d = position - obstacle.center;
    let dist = d.length();
    if dist <= 0.0 {
        return Vec3::ZERO;
    }
    let surface = dist - obstacle.radius;
    if surface >= params.range {
        return Vec3::ZERO;
    }
    d * (params.spring * (params.equilibrium - surface) / dist)
}

/// Advance one particle by one semi-implicit Euler step.
pub fn step(particle: &Particle, obstacle: &Obstacle, params: &PhysicsParams) -> Particle {
    let position = particle.position();
    let velocity = particle.velocity();

    let force = spring_force(position, obstacle, params) - velocity * params.attenuation;
    let velocity = velocity + force / params.weight * params.timestep;
    let position = position + velocity * params.timestep;

    Particle::from_parts(position, velocity, force)
}

/// Advance every particle in place.
pub fn step_all(particles: &mut [Particle], obstacle: &Obstacle, params: &PhysicsParams) {
    for p in particles.iter_mut() {
        *p = step(p, obstacle, params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    fn far_obstacle() -> Obstacle {
        Obstacle::new(Vec3::new(0.0, 0.0, -100.0), 0.1)
    }

    #[test]
    fn test_defaults() {
        let p = PhysicsParams::default();
        assert_eq!(p.equilibrium, 0.1);
        assert_eq!(p.spring, 1.0);
        assert_eq!(p.attenuation, 5.0);
        assert_eq!(p.weight, 1.0);
        assert_eq!(p.range, 0.5);
        assert!((p.timestep - 1.0 / 60.0).abs() < EPS);
    }

    #[test]
    fn test_builder() {
        let p = PhysicsParams::new().with_spring(3.0).with_range(0.25).with_timestep(0.01);
        assert_eq!(p.spring, 3.0);
        assert_eq!(p.range, 0.25);
        assert_eq!(p.timestep, 0.01);
        assert_eq!(p.attenuation, 5.0);
    }

    #[test]
    fn test_spring_vanishes_at_equilibrium() {
        let params = PhysicsParams::default().with_attenuation(0.0);
        let obstacle = Obstacle::new(Vec3::ZERO, 0.5);
        let at_rest = Particle::new(Vec3::new(0.0, 0.6, 0.0));

        let next = step(&at_rest, &obstacle, &params);
        assert!(next.force().length() < EPS);
        assert!(next.velocity().length() < EPS);
        assert!((next.position() - at_rest.position()).length() < EPS);
    }

    #[test]
    fn test_spring_pushes_out_when_too_close() {
        let params = PhysicsParams::default();
        let obstacle = Obstacle::new(Vec3::ZERO, 0.5);
        let f = spring_force(Vec3::new(0.55, 0.0, 0.0), &obstacle, &params);
        // surface distance 0.05 < equilibrium 0.1
        assert!(f.x > 0.0);
        assert!((f.x - 0.05).abs() < EPS);
        assert_eq!(f.y, 0.0);
    }

    #[test]
    fn test_spring_pulls_in_within_range() {
        let params = PhysicsParams::default();
        let obstacle = Obstacle::new(Vec3::ZERO, 0.5);
        let f = spring_force(Vec3::new(0.0, 0.0, 0.9), &obstacle, &params);
        // surface distance 0.4, inside range 0.5, beyond equilibrium
        assert!(f.z < 0.0);
        assert!((f.z + 0.3).abs() < EPS);
    }

    #[test]
    fn test_no_spring_outside_range() {
        let params = PhysicsParams::default();
        let obstacle = Obstacle::new(Vec3::ZERO, 0.5);
        assert_eq!(spring_force(Vec3::new(1.0, 0.0, 0.0), &obstacle, &params), Vec3::ZERO);
    }

    #[test]
    fn test_degenerate_displacement_is_zero_force() {
        let params = PhysicsParams::default();
        let obstacle = Obstacle::new(Vec3::new(0.2, 0.2, 0.2), 0.5);
        let f = spring_force(obstacle.center, &obstacle, &params);
        assert_eq!(f, Vec3::ZERO);

        let next = step(&Particle::new(obstacle.center), &obstacle, &params);
        assert!(next.position().is_finite());
        assert!(next.velocity().is_finite());
    }

    #[test]
    fn test_pure_drag_matches_closed_form() {
        let params = PhysicsParams::default();
        let v0 = Vec3::new(1.0, -2.0, 0.5);
        let p = Particle::with_velocity(Vec3::ZERO, v0);

        let next = step(&p, &far_obstacle(), &params);

        let decay = 1.0 - params.attenuation / params.weight * params.timestep;
        let expected_v = v0 * decay;
        assert!((next.velocity() - expected_v).length() < EPS);
        assert!((next.velocity().length() - v0.length() * decay).abs() < EPS);
        assert!((next.position() - expected_v * params.timestep).length() < EPS);
        assert!((next.force() + v0 * params.attenuation).length() < EPS);
    }

    #[test]
    fn test_particle_at_rest_far_away_stays_put() {
        let p = Particle::new(Vec3::ZERO);
        let next = step(&p, &far_obstacle(), &PhysicsParams::default());
        assert_eq!(next, p);
    }

    #[test]
    fn test_step_all_preserves_count_and_invariant() {
        let mut particles: Vec<Particle> = (0..32)
            .map(|i| Particle::with_velocity(Vec3::splat(i as f32 * 0.05), Vec3::X))
            .collect();
        let obstacle = Obstacle::new(Vec3::splat(0.5), 0.3);
        step_all(&mut particles, &obstacle, &PhysicsParams::default());
        assert_eq!(particles.len(), 32);
        assert!(particles.iter().all(Particle::is_homogeneous));
    }

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<UpdateUniforms>(), 48);
        let u = UpdateUniforms::new(&far_obstacle(), &PhysicsParams::default(), 7);
        assert_eq!(u.sphere, [0.0, 0.0, -100.0, 0.1]);
        assert_eq!(u.count, 7);
    }
}
