//! GPU side of the engine: device acquisition, shaders and the pipeline stages.

mod compositor;
mod kernel;
mod points;
mod potential;
pub mod shaders;
mod slices;
mod store;
pub mod uniforms;

pub use compositor::IsosurfaceCompositor;
pub use kernel::UpdateKernel;
pub use points::PointRenderer;
pub use potential::SliceRasterizer;
pub use shaders::{ShaderLibrary, ShaderStage, WORKGROUP_SIZE};
pub use slices::{PingPong, SliceTargets, SLICE_FORMAT};
pub use store::ParticleStore;
pub use uniforms::{FrameUniforms, SliceUniformBuffer};

use crate::error::GpuError;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Device and queue shared by everything that renders.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Acquire an adapter, optionally one that can present to `surface`.
    pub async fn new(
        instance: wgpu::Instance,
        surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Context without a window, for tests and offscreen use.
    pub fn headless() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        pollster::block_on(Self::new(instance, None))
    }

    /// Block until all submitted work has completed.
    pub fn finish(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}

/// Where a frame is drawn: the window's color view plus an optional depth view.
#[derive(Clone, Copy)]
pub struct FrameTarget<'a> {
    pub color: &'a wgpu::TextureView,
    pub depth: Option<&'a wgpu::TextureView>,
    pub width: u32,
    pub height: u32,
}

impl<'a> FrameTarget<'a> {
    pub fn new(color: &'a wgpu::TextureView, width: u32, height: u32) -> Self {
        Self {
            color,
            depth: None,
            width,
            height,
        }
    }

    pub fn with_depth(mut self, depth: &'a wgpu::TextureView) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// Depth buffer matching a frame of `width` × `height`.
pub fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Run `create` inside a validation error scope.
///
/// Pipeline and resource creation report failures asynchronously; this turns
/// them into a [`GpuError::Validation`] at the call site.
pub(crate) fn validated<T>(
    device: &wgpu::Device,
    create: impl FnOnce() -> T,
) -> Result<T, GpuError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(GpuError::Validation(error.to_string())),
        None => Ok(value),
    }
}

/// Like [`validated`] for a fallible `create`.
///
/// The scope is popped on both paths; an error returned by `create` wins over
/// one captured by the scope.
pub(crate) fn try_validated<T, E: From<GpuError>>(
    device: &wgpu::Device,
    create: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let result = create();
    let captured = pollster::block_on(device.pop_error_scope());
    let value = result?;
    match captured {
        Some(error) => Err(GpuError::Validation(error.to_string()).into()),
        None => Ok(value),
    }
}

/// Uniform buffer layout entry visible to the given stages.
pub(crate) fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    has_dynamic_offset: bool,
    min_binding_size: Option<wgpu::BufferSize>,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset,
            min_binding_size,
        },
        count: None,
    }
}

/// Storage buffer layout entry.
pub(crate) fn storage_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    read_only: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
