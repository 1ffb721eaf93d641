//! Initial particle clouds.
//!
//! The field starts as a handful of round puffs scattered in a cube. Each puff
//! is a set of particles at rest around its center, with directions spread
//! over the sphere and distances drawn from a normal distribution.

use std::f32::consts::PI;

use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::particle::Particle;

/// Shape and count of the generated clouds.
#[derive(Clone, Debug, PartialEq)]
pub struct CloudConfig {
    /// Number of clouds.
    pub cloud_count: usize,
    /// Cloud centers are uniform in `[-center_range, center_range)` per axis.
    pub center_range: f32,
    /// Particles in each cloud.
    pub particles_per_cloud: usize,
    /// Mean distance of a particle from its cloud center.
    pub mean: f32,
    /// Standard deviation of that distance.
    pub deviation: f32,
    /// Seed for the generator; the same seed gives the same sequence of resets.
    pub seed: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            cloud_count: 8,
            center_range: 0.8,
            particles_per_cloud: 2000,
            mean: 0.0,
            deviation: 0.3,
            seed: 54321,
        }
    }
}

impl CloudConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cloud_count(mut self, count: usize) -> Self {
        self.cloud_count = count;
        self
    }

    pub fn with_center_range(mut self, range: f32) -> Self {
        self.center_range = range.abs();
        self
    }

    pub fn with_particles_per_cloud(mut self, count: usize) -> Self {
        self.particles_per_cloud = count;
        self
    }

    pub fn with_distribution(mut self, mean: f32, deviation: f32) -> Self {
        self.mean = mean;
        self.deviation = deviation.abs();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Total particles across all clouds.
    pub fn total_particles(&self) -> usize {
        self.cloud_count * self.particles_per_cloud
    }
}

/// Stateful generator handing out a fresh set of clouds on every call.
pub struct CloudGenerator {
    config: CloudConfig,
    rng: SmallRng,
}

impl CloudGenerator {
    pub fn new(config: CloudConfig) -> Self {
        let rng = SmallRng::seed_from_u64(config.seed);
        Self { config, rng }
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Generate all clouds into `out`, replacing its contents.
    pub fn generate_into(&mut self, out: &mut Vec<Particle>) {
        out.clear();
        out.reserve(self.config.total_particles());
        let range = self.config.center_range;
        for _ in 0..self.config.cloud_count {
            let center = if range > 0.0 {
                Vec3::new(
                    self.rng.gen_range(-range..range),
                    self.rng.gen_range(-range..range),
                    self.rng.gen_range(-range..range),
                )
            } else {
                Vec3::ZERO
            };
            generate_cloud(
                out,
                self.config.particles_per_cloud,
                center,
                &mut self.rng,
                self.config.mean,
                self.config.deviation,
            );
        }
    }

    pub fn generate(&mut self) -> Vec<Particle> {
        let mut out = Vec::new();
        self.generate_into(&mut out);
        out
    }
}

/// Append `count` particles at rest around `center`.
///
/// The direction is uniform over the sphere; the distance from the center is
/// normally distributed with the given `mean` and `deviation`, so a negative
/// draw lands on the opposite side.
pub fn generate_cloud<R: Rng + ?Sized>(
    out: &mut Vec<Particle>,
    count: usize,
    center: Vec3,
    rng: &mut R,
    mean: f32,
    deviation: f32,
) {
    let Ok(normal) = Normal::new(mean, deviation.abs()) else {
        log::warn!("invalid cloud deviation {}, collapsing cloud to its center", deviation);
        out.extend(std::iter::repeat(Particle::new(center)).take(count));
        return;
    };

    out.reserve(count);
    for _ in 0..count {
        let cp = rng.gen_range(-1.0_f32..1.0);
        let sp = (1.0 - cp * cp).sqrt();
        let t = PI * rng.gen_range(0.0_f32..2.0);
        let (st, ct) = t.sin_cos();
        let r: f32 = normal.sample(rng);

        out.push(Particle::new(Vec3::new(r * sp * ct, r * sp * st, r * cp) + center));
    }
}
