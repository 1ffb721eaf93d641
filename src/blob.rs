//! The metaball engine.
//!
//! A [`Blob`] owns a fixed-size particle store on the GPU, advances it with
//! the physics kernel and renders it either as raw points or as a shaded
//! isosurface built from depth slices.
//!
//! ```ignore
//! let gpu = Arc::new(GpuContext::headless()?);
//! let particles = CloudGenerator::new(CloudConfig::default()).generate();
//! let mut blob = Blob::new(gpu.clone(), &particles, MetaballConfig::default())?;
//!
//! // Per frame:
//! blob.update(&obstacle, &PhysicsParams::default());
//! blob.draw_metaball(&target, &projection, &modelview, &window, &light)?;
//! ```

use std::ops::Range;
use std::sync::Arc;

use glam::Mat4;

use crate::config::MetaballConfig;
use crate::error::{BlobError, GpuError};
use crate::gpu::{
    try_validated, FrameTarget, FrameUniforms, GpuContext, IsosurfaceCompositor, ParticleStore,
    PingPong, PointRenderer, ShaderLibrary, SliceRasterizer, SliceTargets, SliceUniformBuffer,
    UpdateKernel,
};
use crate::lighting::LightBuffer;
use crate::particle::Particle;
use crate::physics::{self, Obstacle, PhysicsParams};
use crate::slicing::{DepthMapping, SliceBuckets, SlicePlane};

/// What the engine needs to know about the window it draws into.
pub trait HostWindow {
    /// Drawable size in pixels.
    fn size(&self) -> (u32, u32);

    /// Accumulated scroll-wheel position; drives the isosurface threshold.
    fn wheel_y(&self) -> f32;

    fn aspect(&self) -> f32 {
        let (width, height) = self.size();
        if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        }
    }
}

/// Particle field rendered as sliced metaballs.
pub struct Blob {
    gpu: Arc<GpuContext>,
    config: MetaballConfig,
    store: ParticleStore,
    /// Host copy of the store, stepped in lockstep with the kernel for bucketing.
    ///
    /// Host and GPU float results may drift apart over many steps. Only
    /// `initialize` copies the store contents in exactly, so the drift lasts at
    /// most one reset interval and moves particles between neighbouring slices
    /// at worst.
    mirror: Vec<Particle>,
    frame_buffer: wgpu::Buffer,
    planes: SliceUniformBuffer,
    kernel: UpdateKernel,
    targets: SliceTargets,
    rasterizer: SliceRasterizer,
    compositor: IsosurfaceCompositor,
    points: PointRenderer,
    buckets: SliceBuckets,
    indices: Vec<u32>,
    ranges: Vec<Range<u32>>,
    plane_scratch: Vec<SlicePlane>,
    /// Light bind group, keyed by the id of the buffer it was built over.
    light_binding: Option<(u64, wgpu::BindGroup)>,
}

impl Blob {
    /// Build every GPU resource for `particles.len()` particles.
    ///
    /// Sizes beyond the device limits and any validation error raised while
    /// creating resources are returned as [`GpuError::Validation`].
    pub fn new(
        gpu: Arc<GpuContext>,
        particles: &[Particle],
        config: MetaballConfig,
    ) -> Result<Self, BlobError> {
        check_limits(&gpu.device.limits(), &config, particles.len())?;

        let context = Arc::clone(&gpu);
        let blob = try_validated(&context.device, || Self::build(gpu, particles, config))?;

        log::info!(
            "Metaball engine ready: {} particles, {} slices of {}x{}, bucket sort {}, depth {}",
            blob.capacity(),
            blob.config.slice_count,
            blob.config.slice_width,
            blob.config.slice_height,
            if blob.config.bucket_sort { "on" } else { "off" },
            if blob.config.depth_test { "on" } else { "off" },
        );
        Ok(blob)
    }

    fn build(
        gpu: Arc<GpuContext>,
        particles: &[Particle],
        config: MetaballConfig,
    ) -> Result<Self, BlobError> {
        let device = &gpu.device;
        let slice_count = config.slice_count as usize;
        let store = ParticleStore::new(device, particles)?;
        let shaders = ShaderLibrary::new(device)?;

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform Buffer"),
            size: FrameUniforms::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let planes = SliceUniformBuffer::new(device, config.slice_count);
        let targets = SliceTargets::new(device, config.slice_width, config.slice_height);

        let kernel = UpdateKernel::new(device, &shaders, &store)?;
        let mut rasterizer = SliceRasterizer::new(
            device,
            &shaders,
            &frame_buffer,
            &planes,
            &store,
            particles.len() * 8,
        )?;
        let compositor =
            IsosurfaceCompositor::new(device, &shaders, &frame_buffer, &planes, &targets, &config)?;
        let points = PointRenderer::new(device, &shaders, &frame_buffer, &config)?;

        // Without bucketing every slice draws the identity list
        let mut indices = Vec::new();
        let mut ranges = Vec::with_capacity(slice_count);
        if !config.bucket_sort {
            let count = particles.len() as u32;
            indices.extend(0..count);
            ranges.resize(slice_count, 0..count);
            rasterizer.upload_indices(device, &gpu.queue, &frame_buffer, &planes, &store, &indices);
        }

        Ok(Self {
            mirror: particles.to_vec(),
            buckets: SliceBuckets::new(slice_count),
            gpu,
            config,
            store,
            frame_buffer,
            planes,
            kernel,
            targets,
            rasterizer,
            compositor,
            points,
            indices,
            ranges,
            plane_scratch: Vec::with_capacity(slice_count),
            light_binding: None,
        })
    }

    /// Replace every particle. The count must equal [`capacity`](Self::capacity).
    pub fn initialize(&mut self, particles: &[Particle]) -> Result<(), BlobError> {
        self.store.initialize(&self.gpu.queue, particles)?;
        self.mirror.clear();
        self.mirror.extend_from_slice(particles);
        log::debug!("Reinitialized {} particles", particles.len());
        Ok(())
    }

    /// Read the store back from the GPU.
    pub fn read_particles(&self) -> Result<Vec<Particle>, BlobError> {
        Ok(self.store.read_back(&self.gpu.device, &self.gpu.queue)?)
    }

    /// Advance every particle one step against `obstacle`.
    ///
    /// The host copy is stepped with [`physics::step_all`] alongside the kernel.
    pub fn update(&mut self, obstacle: &Obstacle, params: &PhysicsParams) {
        self.kernel.write_params(&self.gpu.queue, obstacle, params);

        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Update Encoder"),
        });
        self.kernel.encode(&mut encoder);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        physics::step_all(&mut self.mirror, obstacle, params);
    }

    /// Draw the particles as points, for diagnostics.
    pub fn draw(
        &self,
        target: &FrameTarget<'_>,
        projection: &Mat4,
        modelview: &Mat4,
    ) -> Result<(), BlobError> {
        if self.config.depth_test && target.depth.is_none() {
            return Err(BlobError::MissingDepthTarget);
        }
        self.write_frame_uniforms(projection, modelview, 0.0);

        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Point Encoder"),
        });
        self.points.encode(&mut encoder, target, &self.store);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        self.finish_if_configured();
        Ok(())
    }

    /// Render the isosurface of the particle field into `target`.
    pub fn draw_metaball(
        &mut self,
        target: &FrameTarget<'_>,
        projection: &Mat4,
        modelview: &Mat4,
        window: &dyn HostWindow,
        light: &LightBuffer,
    ) -> Result<(), BlobError> {
        if self.config.depth_test && target.depth.is_none() {
            return Err(BlobError::MissingDepthTarget);
        }

        let gpu = Arc::clone(&self.gpu);
        let slice_count = self.config.slice_count as usize;
        let mapping = DepthMapping::from_projection(projection);

        if self.config.bucket_sort {
            self.buckets
                .rebuild(&self.mirror, modelview, &mapping, self.config.sphere_radius);
            self.buckets.flatten_into(&mut self.indices, &mut self.ranges);
            log::trace!(
                "{} bucket entries across {} slices",
                self.indices.len(),
                slice_count
            );
            self.rasterizer.upload_indices(
                &gpu.device,
                &gpu.queue,
                &self.frame_buffer,
                &self.planes,
                &self.store,
                &self.indices,
            );
        }

        self.write_frame_uniforms(projection, modelview, window.wheel_y());
        self.plane_scratch.clear();
        self.plane_scratch
            .extend((0..slice_count).map(|i| SlicePlane::new(i, slice_count, &mapping)));
        self.planes.write(&gpu.queue, &self.plane_scratch);

        let light_id = light.id();
        let (_, light_bind_group) = match self.light_binding.take() {
            Some((id, bind_group)) if id == light_id => self.light_binding.insert((id, bind_group)),
            _ => self.light_binding.insert((
                light_id,
                self.compositor.light_bind_group(&gpu.device, light),
            )),
        };
        let light_bind_group = &*light_bind_group;
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Metaball Encoder"),
        });

        // Slice 0 blends against an empty previous slice
        let mut ping_pong = PingPong::new();
        self.targets.encode_clear(&mut encoder, ping_pong.previous());

        for (slice, range) in self.ranges.iter().enumerate().take(slice_count) {
            let offset = self.planes.offset(slice as u32);
            let current = ping_pong.current();
            self.rasterizer
                .encode_slice(&mut encoder, self.targets.view(current), offset, range.clone());
            self.compositor
                .encode_slice(&mut encoder, target, current, offset, light_bind_group, slice == 0);
            ping_pong.swap();
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        self.finish_if_configured();
        Ok(())
    }

    fn write_frame_uniforms(&self, projection: &Mat4, modelview: &Mat4, wheel_y: f32) {
        let mut uniforms = FrameUniforms::new(projection, modelview);
        uniforms.size = [self.config.slice_width as f32, self.config.slice_height as f32];
        uniforms.radius = self.config.sphere_radius;
        uniforms.threshold = self.config.threshold(wheel_y);
        uniforms.slice_blend = self.config.slice_blend;
        uniforms.point_size = self.config.point_size;
        self.gpu
            .queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    fn finish_if_configured(&self) {
        if self.config.finish {
            self.gpu.finish();
        }
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    pub fn config(&self) -> &MetaballConfig {
        &self.config
    }

    /// Bucket occupancy of the most recent metaball frame.
    ///
    /// Empty when bucket sorting is disabled.
    pub fn last_buckets(&self) -> &SliceBuckets {
        &self.buckets
    }

    /// Host copy of the particles as last stepped or initialized.
    pub fn particles(&self) -> &[Particle] {
        &self.mirror
    }
}

/// Reject sizes the device cannot hold before any resource is created.
fn check_limits(
    limits: &wgpu::Limits,
    config: &MetaballConfig,
    particle_count: usize,
) -> Result<(), GpuError> {
    let max_dimension = limits.max_texture_dimension_2d;
    let (width, height) = (config.slice_width, config.slice_height);
    if width == 0 || height == 0 || width > max_dimension || height > max_dimension {
        return Err(GpuError::Validation(format!(
            "slice size {}x{} outside 1..={}",
            width, height, max_dimension
        )));
    }

    let store_bytes = particle_count as u64 * Particle::SIZE;
    let max_store = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    if store_bytes > max_store {
        return Err(GpuError::Validation(format!(
            "{} particles need {} bytes, device allows {}",
            particle_count, store_bytes, max_store
        )));
    }
    Ok(())
}
