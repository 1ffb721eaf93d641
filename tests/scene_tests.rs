//! Host-side integration tests: clouds, physics and slicing working together
//! the way the viewer drives them, without a GPU.

use flowmetaball::slicing::slice_span;
use flowmetaball::{
    physics, Camera, CloudConfig, CloudGenerator, DepthMapping, ObstacleScript, PhysicsParams,
    SimClock, SliceBuckets, SlicePlane,
};

// ============================================================================
// Reset Cycle
// ============================================================================

#[test]
fn test_reset_cycle_regenerates_fixed_count() {
    let config = CloudConfig::new().with_particles_per_cloud(100);
    let mut generator = CloudGenerator::new(config.clone());
    let mut clock = SimClock::new(0.5);
    let params = PhysicsParams::default();
    let script = ObstacleScript::default();

    let mut particles = generator.generate();
    let mut resets = 0;
    for _ in 0..100 {
        clock.advance(params.timestep);
        if clock.reset_due() {
            particles = generator.generate();
            clock.rewind();
            resets += 1;
        }
        physics::step_all(&mut particles, &script.at(clock.elapsed()), &params);
        assert_eq!(particles.len(), config.total_particles());
    }
    // 100 steps of 1/60 s with a 0.5 s interval
    assert_eq!(resets, 3);
}

#[test]
fn test_same_seed_same_resets() {
    let config = CloudConfig::new().with_particles_per_cloud(50);
    let mut a = CloudGenerator::new(config.clone());
    let mut b = CloudGenerator::new(config);
    for _ in 0..3 {
        assert_eq!(a.generate(), b.generate());
    }
}

// ============================================================================
// Obstacle Interaction
// ============================================================================

#[test]
fn test_obstacle_pushes_cloud_aside() {
    let mut particles = CloudGenerator::new(
        CloudConfig::new()
            .with_cloud_count(1)
            .with_center_range(0.0)
            .with_particles_per_cloud(500),
    )
    .generate();
    let params = PhysicsParams::default().with_spring(200.0);
    let script = ObstacleScript::default();

    // Where the sphere will be at t = 1.5
    let end = script.at(1.5);
    let inside = |ps: &[flowmetaball::Particle]| {
        ps.iter()
            .filter(|p| (p.position() - end.center).length() < end.radius * 0.5)
            .count()
    };
    let before = inside(&particles);
    assert!(before > 100);

    let mut clock = SimClock::unbounded();
    while clock.elapsed() < 1.5 {
        let t = clock.advance(params.timestep);
        physics::step_all(&mut particles, &script.at(t), &params);
    }

    let after = inside(&particles);
    assert!(after < before / 2, "{} of {} particles left inside", after, before);
    assert!(particles.iter().all(|p| p.is_homogeneous()));
}

// ============================================================================
// Slicing
// ============================================================================

#[test]
fn test_default_view_buckets_match_spans() {
    let particles = CloudGenerator::new(CloudConfig::default()).generate();
    let camera = Camera::default();
    let projection = camera.projection(16.0 / 9.0);
    let mapping = DepthMapping::from_projection(&projection);
    let modelview = camera.view_matrix();

    let mut buckets = SliceBuckets::new(128);
    buckets.rebuild(&particles, &modelview, &mapping, 0.1);

    let expected: usize = particles
        .iter()
        .filter_map(|p| {
            let zw = flowmetaball::slicing::view_depth(&modelview, p.position);
            slice_span(zw, 0.1, &mapping, 128).map(|s| s.count())
        })
        .sum();
    assert_eq!(buckets.total_entries(), expected);
    assert!(expected > 0);

    // Every listed particle's sphere reaches its slice plane
    for (slice, bucket) in buckets.iter().enumerate() {
        let plane = SlicePlane::new(slice, 128, &mapping);
        for &i in bucket {
            let zw = flowmetaball::slicing::view_depth(&modelview, particles[i as usize].position);
            assert!(
                (zw - plane.z_slice).abs() <= 0.1 + 1e-3,
                "particle {} too far from slice {}",
                i,
                slice
            );
        }
    }
}
