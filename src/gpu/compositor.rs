//! Isosurface compositor: thresholds a slice pair and shades it on screen.

use wgpu::util::DeviceExt;

use super::shaders::{ShaderLibrary, ShaderStage};
use super::slices::SliceTargets;
use super::uniforms::{FrameUniforms, SliceUniformBuffer};
use super::{uniform_entry, validated, FrameTarget};
use crate::config::MetaballConfig;
use crate::error::GpuError;
use crate::lighting::LightBuffer;

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// The `rectangle` stage.
///
/// Holds one bind group per ping-pong orientation: group `i` samples slice
/// texture `i` as the current slice and the other one as the previous.
pub struct IsosurfaceCompositor {
    pipeline: wgpu::RenderPipeline,
    bind_groups: [wgpu::BindGroup; 2],
    light_layout: wgpu::BindGroupLayout,
    depth_test: bool,
    clear_color: wgpu::Color,
}

impl IsosurfaceCompositor {
    pub fn new(
        device: &wgpu::Device,
        shaders: &ShaderLibrary,
        frame_buffer: &wgpu::Buffer,
        planes: &SliceUniformBuffer,
        targets: &SliceTargets,
        config: &MetaballConfig,
    ) -> Result<Self, GpuError> {
        let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Buffer"),
            contents: bytemuck::bytes_of(&config.material),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Rectangle Bind Group Layout"),
            entries: &[
                uniform_entry(
                    0,
                    wgpu::ShaderStages::VERTEX_FRAGMENT,
                    false,
                    wgpu::BufferSize::new(FrameUniforms::SIZE),
                ),
                uniform_entry(
                    1,
                    wgpu::ShaderStages::VERTEX_FRAGMENT,
                    true,
                    wgpu::BufferSize::new(SliceUniformBuffer::BINDING_SIZE),
                ),
                texture_entry(2),
                texture_entry(3),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                uniform_entry(5, wgpu::ShaderStages::FRAGMENT, false, None),
            ],
        });

        let light_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Light Bind Group Layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT, false, None)],
        });

        let bind_group = |current: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Rectangle Bind Group"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: frame_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: planes.binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(targets.view(current)),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(targets.view(1 - current)),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::Sampler(targets.sampler()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: material_buffer.as_entire_binding(),
                    },
                ],
            })
        };
        let bind_groups = [bind_group(0), bind_group(1)];

        let depth_stencil = config.depth_test.then(|| wgpu::DepthStencilState {
            format: config.depth_format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = validated(device, || {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Rectangle Pipeline Layout"),
                bind_group_layouts: &[&layout, &light_layout],
                push_constant_ranges: &[],
            });
            let module = shaders.get(ShaderStage::Rectangle);
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Rectangle Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: config.surface_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;

        Ok(Self {
            pipeline,
            bind_groups,
            light_layout,
            depth_test: config.depth_test,
            clear_color: config.clear_color,
        })
    }

    /// Bind group exposing `light` at group 1.
    pub fn light_bind_group(&self, device: &wgpu::Device, light: &LightBuffer) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Light Bind Group"),
            layout: &self.light_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: light.buffer().as_entire_binding(),
            }],
        })
    }

    /// Composite one slice into `target`.
    ///
    /// `current` is the slice texture written for this slice. The first slice
    /// of a frame clears color and depth; later slices load them.
    pub fn encode_slice(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &FrameTarget<'_>,
        current: usize,
        plane_offset: u32,
        light: &wgpu::BindGroup,
        first: bool,
    ) {
        let color_load = if first {
            wgpu::LoadOp::Clear(self.clear_color)
        } else {
            wgpu::LoadOp::Load
        };
        let depth_load = if first {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };
        let depth_stencil_attachment = match (self.depth_test, target.depth) {
            (true, Some(view)) => Some(wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            _ => None,
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Rectangle Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_viewport(0.0, 0.0, target.width as f32, target.height as f32, 0.0, 1.0);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_groups[current], &[plane_offset]);
        pass.set_bind_group(1, light, &[]);
        pass.draw(0..4, 0..1);
    }
}
