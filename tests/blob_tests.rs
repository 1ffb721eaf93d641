//! GPU integration tests for the metaball engine.
//!
//! Each test acquires a headless adapter and returns early when the machine
//! has none, so the suite stays green on CI runners without a GPU.

use std::sync::{Arc, OnceLock};

use flowmetaball::gpu::create_depth_texture;
use flowmetaball::gpu::DEPTH_FORMAT;
use flowmetaball::{
    physics, Blob, BlobError, Camera, CloudConfig, CloudGenerator, DepthMapping, FrameTarget,
    GpuContext, GpuError, HostWindow, Light, LightBuffer, MetaballConfig, Obstacle, Particle,
    PhysicsParams, SlicePlane, Vec3,
};

fn gpu() -> Option<Arc<GpuContext>> {
    static GPU: OnceLock<Option<Arc<GpuContext>>> = OnceLock::new();
    GPU.get_or_init(|| match GpuContext::headless() {
        Ok(ctx) => Some(Arc::new(ctx)),
        Err(e) => {
            eprintln!("skipping GPU tests: {}", e);
            None
        }
    })
    .clone()
}

fn small_config() -> MetaballConfig {
    MetaballConfig::new()
        .with_slice_count(64)
        .with_slice_size(64, 64)
        .with_surface_format(wgpu::TextureFormat::Rgba8Unorm)
        .with_finish(true)
}

#[derive(Default)]
struct StubWindow {
    wheel_y: f32,
}

impl HostWindow for StubWindow {
    fn size(&self) -> (u32, u32) {
        (64, 64)
    }

    fn wheel_y(&self) -> f32 {
        self.wheel_y
    }
}

fn assert_close(a: Vec3, b: Vec3, eps: f32) {
    assert!((a - b).abs().max_element() < eps, "{:?} != {:?}", a, b);
}

// ============================================================================
// Particle Store
// ============================================================================

#[test]
fn test_store_round_trip() {
    let Some(gpu) = gpu() else { return };
    let particles: Vec<Particle> = (0..100)
        .map(|i| Particle::with_velocity(Vec3::new(i as f32, 0.5, -1.0), Vec3::new(0.0, i as f32, 0.0)))
        .collect();

    let blob = Blob::new(gpu, &particles, small_config()).unwrap();
    assert_eq!(blob.capacity(), 100);
    assert_eq!(blob.read_particles().unwrap(), particles);
}

#[test]
fn test_initialize_rejects_wrong_count() {
    let Some(gpu) = gpu() else { return };
    let particles = vec![Particle::default(); 16];
    let mut blob = Blob::new(gpu, &particles, small_config()).unwrap();

    let err = blob.initialize(&particles[..10]).unwrap_err();
    assert!(matches!(err, BlobError::CapacityMismatch { expected: 16, actual: 10 }));
    // Store unchanged
    assert_eq!(blob.read_particles().unwrap(), particles);
}

#[test]
fn test_initialize_replaces_contents() {
    let Some(gpu) = gpu() else { return };
    let mut blob = Blob::new(gpu, &[Particle::default(); 8], small_config()).unwrap();

    let fresh: Vec<Particle> = (0..8).map(|i| Particle::new(Vec3::splat(i as f32))).collect();
    blob.initialize(&fresh).unwrap();
    assert_eq!(blob.read_particles().unwrap(), fresh);
    assert_eq!(blob.particles(), fresh.as_slice());
}

#[test]
fn test_empty_particle_set_is_rejected() {
    let Some(gpu) = gpu() else { return };
    let result = Blob::new(gpu, &[], small_config());
    assert!(matches!(result, Err(BlobError::EmptyParticleSet)));
}

#[test]
fn test_oversized_slice_target_is_an_error() {
    let Some(gpu) = gpu() else { return };
    let too_wide = gpu.device.limits().max_texture_dimension_2d + 1;
    let config = small_config().with_slice_size(too_wide, 64);

    let result = Blob::new(gpu.clone(), &[Particle::default(); 8], config);
    assert!(matches!(result, Err(BlobError::Gpu(GpuError::Validation(_)))));

    // The device is still usable afterwards
    let blob = Blob::new(gpu, &[Particle::default(); 8], small_config()).unwrap();
    assert_eq!(blob.read_particles().unwrap().len(), 8);
}

// ============================================================================
// Physics Kernel
// ============================================================================

#[test]
fn test_single_particle_pure_drag() {
    let Some(gpu) = gpu() else { return };
    let particle = Particle::with_velocity(Vec3::new(5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
    let mut blob = Blob::new(gpu, &[particle], small_config()).unwrap();

    let obstacle = Obstacle::new(Vec3::ZERO, 0.1);
    let params = PhysicsParams::default();
    blob.update(&obstacle, &params);

    let after = blob.read_particles().unwrap()[0];
    let v = 1.0 - params.attenuation * params.timestep;
    assert_close(after.velocity(), Vec3::new(v, 0.0, 0.0), 1e-5);
    assert_close(after.position(), Vec3::new(5.0 + v * params.timestep, 0.0, 0.0), 1e-5);
    assert_close(after.force(), Vec3::new(-params.attenuation, 0.0, 0.0), 1e-5);
    assert!(after.is_homogeneous());
}

#[test]
fn test_kernel_matches_host_integrator() {
    let Some(gpu) = gpu() else { return };
    let config = CloudConfig::new().with_cloud_count(3).with_particles_per_cloud(700);
    let particles = CloudGenerator::new(config).generate();
    let mut blob = Blob::new(gpu, &particles, small_config()).unwrap();

    let mut expected = particles.clone();
    let params = PhysicsParams::default();
    for step in 0..10 {
        let obstacle = Obstacle::new(Vec3::new(0.0, 0.0, 0.3 - step as f32 * 0.05), 0.5);
        blob.update(&obstacle, &params);
        physics::step_all(&mut expected, &obstacle, &params);
    }

    let actual = blob.read_particles().unwrap();
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(&expected) {
        assert_close(a.position(), e.position(), 1e-4);
        assert_close(a.velocity(), e.velocity(), 1e-3);
        assert!(a.is_homogeneous());
    }
    // The host mirror used for bucketing follows the same path
    for (m, e) in blob.particles().iter().zip(&expected) {
        assert_eq!(m, e);
    }
}

#[test]
fn test_reset_resyncs_host_copy() {
    let Some(gpu) = gpu() else { return };
    let config = CloudConfig::new().with_cloud_count(2).with_particles_per_cloud(200);
    let mut generator = CloudGenerator::new(config);
    let mut blob = Blob::new(gpu, &generator.generate(), small_config()).unwrap();

    let obstacle = Obstacle::new(Vec3::new(0.0, 0.0, 0.2), 0.5);
    for _ in 0..30 {
        blob.update(&obstacle, &PhysicsParams::default());
    }

    let fresh = generator.generate();
    blob.initialize(&fresh).unwrap();
    assert_eq!(blob.particles(), fresh.as_slice());
    assert_eq!(blob.read_particles().unwrap(), fresh);
}

#[test]
fn test_count_not_multiple_of_workgroup() {
    let Some(gpu) = gpu() else { return };
    let particles: Vec<Particle> = (0..257)
        .map(|i| Particle::with_velocity(Vec3::new(10.0, i as f32, 0.0), Vec3::X))
        .collect();
    let mut blob = Blob::new(gpu, &particles, small_config()).unwrap();
    blob.update(&Obstacle::new(Vec3::ZERO, 0.1), &PhysicsParams::default());

    let after = blob.read_particles().unwrap();
    assert_eq!(after.len(), 257);
    assert!(after.iter().all(|p| p.position().x > 10.0));
}

// ============================================================================
// Rendering
// ============================================================================

struct Offscreen {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    depth: wgpu::TextureView,
}

const SIZE: u32 = 64;

fn offscreen(gpu: &GpuContext) -> Offscreen {
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Target"),
        size: wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let depth = create_depth_texture(&gpu.device, SIZE, SIZE);
    Offscreen { texture, view, depth }
}

/// Alpha channel of every pixel, row by row.
fn read_alpha(gpu: &GpuContext, texture: &wgpu::Texture) -> Vec<u8> {
    read_texels(gpu, texture, wgpu::TextureAspect::All)
        .chunks(4)
        .map(|px| px[3])
        .collect()
}

/// RGBA of every pixel, row by row.
fn read_rgba(gpu: &GpuContext, texture: &wgpu::Texture) -> Vec<[u8; 4]> {
    read_texels(gpu, texture, wgpu::TextureAspect::All)
        .chunks(4)
        .map(|px| [px[0], px[1], px[2], px[3]])
        .collect()
}

/// Depth of every pixel of a `Depth32Float` texture, row by row.
fn read_depth(gpu: &GpuContext, texture: &wgpu::Texture) -> Vec<f32> {
    read_texels(gpu, texture, wgpu::TextureAspect::DepthOnly)
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Raw bytes of a 4-byte-per-texel `SIZE` x `SIZE` texture.
fn read_texels(gpu: &GpuContext, texture: &wgpu::Texture, aspect: wgpu::TextureAspect) -> Vec<u8> {
    let bytes_per_row = SIZE * 4;
    let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Test Readback"),
        size: (bytes_per_row * SIZE) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = gpu.device.create_command_encoder(&Default::default());
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(SIZE),
            },
        },
        wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    slice.map_async(wgpu::MapMode::Read, |_| {});
    gpu.device.poll(wgpu::Maintain::Wait);
    let bytes = slice.get_mapped_range().to_vec();
    buffer.unmap();
    bytes
}

fn dense_cloud() -> Vec<Particle> {
    CloudGenerator::new(CloudConfig::new().with_cloud_count(1).with_center_range(0.0))
        .generate()
}

fn render_metaball(gpu: &Arc<GpuContext>, config: MetaballConfig) -> Vec<u8> {
    render_metaball_with(gpu, config, &StubWindow::default())
}

fn render_metaball_with(
    gpu: &Arc<GpuContext>,
    config: MetaballConfig,
    window: &StubWindow,
) -> Vec<u8> {
    let mut blob = Blob::new(gpu.clone(), &dense_cloud(), config).unwrap();
    let target = offscreen(gpu);
    let light = LightBuffer::new(&gpu.device, &Light::default());
    let camera = Camera::default();

    let frame = FrameTarget::new(&target.view, SIZE, SIZE).with_depth(&target.depth);
    blob.draw_metaball(&frame, &camera.projection(1.0), &camera.view_matrix(), window, &light)
        .unwrap();
    read_alpha(gpu, &target.texture)
}

/// Depth texture that can be copied out after a frame.
fn readable_depth(gpu: &GpuContext) -> wgpu::Texture {
    gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Depth"),
        size: wgpu::Extent3d {
            width: SIZE,
            height: SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// Fill `depth` with `value` so a later clear is observable.
fn fill_depth(gpu: &GpuContext, depth: &wgpu::TextureView, value: f32) {
    let mut encoder = gpu.device.create_command_encoder(&Default::default());
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Test Depth Fill"),
        color_attachments: &[],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: depth,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(value),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    gpu.queue.submit(std::iter::once(encoder.finish()));
}

#[test]
fn test_metaball_covers_cloud_center_only() {
    let Some(gpu) = gpu() else { return };
    let alpha = render_metaball(&gpu, small_config().with_bucket_sort(true));

    let center = (SIZE / 2 * SIZE + SIZE / 2) as usize;
    assert_eq!(alpha[center], 255, "cloud center should be shaded");
    assert_eq!(alpha[0], 0, "corner should keep the clear color");
}

#[test]
fn test_bucket_sort_does_not_change_coverage() {
    let Some(gpu) = gpu() else { return };
    let covered = |alpha: &[u8]| alpha.iter().filter(|&&a| a == 255).count() as i64;

    let sorted = covered(&render_metaball(&gpu, small_config().with_bucket_sort(true)));
    let unsorted = covered(&render_metaball(&gpu, small_config().with_bucket_sort(false)));

    assert!(sorted > 0);
    // Summation order may flip a few pixels right at the threshold
    assert!((sorted - unsorted).abs() <= sorted / 50 + 2, "{} vs {}", sorted, unsorted);
}

#[test]
fn test_depth_mode_requires_depth_target() {
    let Some(gpu) = gpu() else { return };
    let mut blob = Blob::new(gpu.clone(), &dense_cloud(), small_config().with_depth_test(true)).unwrap();
    let target = offscreen(&gpu);
    let light = LightBuffer::new(&gpu.device, &Light::default());
    let camera = Camera::default();

    let frame = FrameTarget::new(&target.view, SIZE, SIZE);
    let result = blob.draw_metaball(
        &frame,
        &camera.projection(1.0),
        &camera.view_matrix(),
        &StubWindow::default(),
        &light,
    );
    assert!(matches!(result, Err(BlobError::MissingDepthTarget)));
}

#[test]
fn test_metaball_without_depth_test() {
    let Some(gpu) = gpu() else { return };
    let mut blob = Blob::new(gpu.clone(), &dense_cloud(), small_config().with_depth_test(false)).unwrap();
    let target = offscreen(&gpu);
    let light = LightBuffer::new(&gpu.device, &Light::default());
    let camera = Camera::default();

    let frame = FrameTarget::new(&target.view, SIZE, SIZE);
    blob.draw_metaball(&frame, &camera.projection(1.0), &camera.view_matrix(), &StubWindow::default(), &light)
        .unwrap();

    let alpha = read_alpha(&gpu, &target.texture);
    assert_eq!(alpha[(SIZE / 2 * SIZE + SIZE / 2) as usize], 255);
}

#[test]
fn test_bucket_occupancy_recorded() {
    let Some(gpu) = gpu() else { return };
    let particles = dense_cloud();
    let mut blob = Blob::new(gpu.clone(), &particles, small_config().with_bucket_sort(true)).unwrap();
    let target = offscreen(&gpu);
    let light = LightBuffer::new(&gpu.device, &Light::default());
    let camera = Camera::default();

    let frame = FrameTarget::new(&target.view, SIZE, SIZE).with_depth(&target.depth);
    blob.draw_metaball(&frame, &camera.projection(1.0), &camera.view_matrix(), &StubWindow::default(), &light)
        .unwrap();

    let buckets = blob.last_buckets();
    assert_eq!(buckets.slice_count(), 64);
    assert!(buckets.total_entries() > 0);
    assert!(buckets.iter().all(|b| b.iter().all(|&i| (i as usize) < particles.len())));
    // Nothing sits right at the near plane
    assert!(buckets.bucket(0).is_empty());
}

#[test]
fn test_point_draw() {
    let Some(gpu) = gpu() else { return };
    let blob = Blob::new(gpu.clone(), &dense_cloud(), small_config()).unwrap();
    let target = offscreen(&gpu);
    let camera = Camera::default();

    let frame = FrameTarget::new(&target.view, SIZE, SIZE).with_depth(&target.depth);
    blob.draw(&frame, &camera.projection(1.0), &camera.view_matrix()).unwrap();

    let alpha = read_alpha(&gpu, &target.texture);
    assert!(alpha.iter().any(|&a| a > 0));
    assert_eq!(alpha[0], 0);
}

#[test]
fn test_depth_holds_slice_depths() {
    let Some(gpu) = gpu() else { return };
    let config = small_config().with_depth_test(true);
    let mut blob = Blob::new(gpu.clone(), &dense_cloud(), config).unwrap();
    let target = offscreen(&gpu);
    let depth_texture = readable_depth(&gpu);
    let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());
    fill_depth(&gpu, &depth_view, 0.0);

    let light = LightBuffer::new(&gpu.device, &Light::default());
    let camera = Camera::default();
    let projection = camera.projection(1.0);
    let frame = FrameTarget::new(&target.view, SIZE, SIZE).with_depth(&depth_view);
    blob.draw_metaball(&frame, &projection, &camera.view_matrix(), &StubWindow::default(), &light)
        .unwrap();

    let alpha = read_alpha(&gpu, &target.texture);
    let depth = read_depth(&gpu, &depth_texture);
    let mapping = DepthMapping::from_projection(&projection);
    let slice_depths: Vec<f32> = (0..64)
        .map(|i| SlicePlane::new(i, 64, &mapping).z_clip * 0.5 + 0.5)
        .collect();

    assert!(alpha.iter().any(|&a| a == 255));
    for (i, (&a, &d)) in alpha.iter().zip(&depth).enumerate() {
        if a == 255 {
            assert!(d < 1.0, "covered pixel {} kept the far depth", i);
            assert!(
                slice_depths.iter().any(|&z| (z - d).abs() < 1e-5),
                "pixel {} depth {} is not a slice depth",
                i,
                d
            );
        } else {
            // Cleared on the first slice, never written afterwards
            assert_eq!(d, 1.0, "uncovered pixel {} depth {}", i, d);
        }
    }
}

#[test]
fn test_wheel_raises_threshold() {
    let Some(gpu) = gpu() else { return };
    let covered = |alpha: &[u8]| alpha.iter().filter(|&&a| a == 255).count();

    let at_rest = covered(&render_metaball_with(&gpu, small_config(), &StubWindow::default()));
    let raised = covered(&render_metaball_with(
        &gpu,
        small_config(),
        &StubWindow { wheel_y: 10.0 },
    ));

    assert!(at_rest > 0);
    assert!(raised < at_rest, "{} covered at threshold 2, {} at 1", raised, at_rest);
}

#[test]
fn test_light_changes_reach_shading() {
    let Some(gpu) = gpu() else { return };
    let mut blob = Blob::new(gpu.clone(), &dense_cloud(), small_config()).unwrap();
    let target = offscreen(&gpu);
    let camera = Camera::default();
    let projection = camera.projection(1.0);
    let modelview = camera.view_matrix();
    let frame = FrameTarget::new(&target.view, SIZE, SIZE).with_depth(&target.depth);
    let center = (SIZE / 2 * SIZE + SIZE / 2) as usize;
    let window = StubWindow::default();

    let mut light = LightBuffer::new(&gpu.device, &Light::default());
    blob.draw_metaball(&frame, &projection, &modelview, &window, &light).unwrap();
    let lit = read_rgba(&gpu, &target.texture)[center];
    assert_eq!(lit[3], 255);
    assert!(lit[..3].iter().any(|&c| c > 0));

    // Same buffer, new contents
    let dark = Light {
        ambient: [0.0; 4],
        diffuse: [0.0; 4],
        specular: [0.0; 4],
        position: [3.0, 4.0, 5.0, 1.0],
    };
    light.set(&gpu.queue, &dark);
    assert_eq!(light.light(), &dark);
    blob.draw_metaball(&frame, &projection, &modelview, &window, &light).unwrap();
    assert_eq!(read_rgba(&gpu, &target.texture)[center], [0, 0, 0, 255]);

    // A different buffer replaces the cached binding
    let fresh = LightBuffer::new(&gpu.device, &Light::default());
    blob.draw_metaball(&frame, &projection, &modelview, &window, &fresh).unwrap();
    assert_eq!(read_rgba(&gpu, &target.texture)[center], lit);
}
