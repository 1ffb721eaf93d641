//! Slice rasterizer: splats each particle's potential into a slice texture.
//!
//! Particles are fetched through an index list so a slice can draw just its
//! bucket. The list for all slices lives in one storage buffer; slice `i`
//! draws the instance range recorded for it.

use std::ops::Range;

use super::shaders::{ShaderLibrary, ShaderStage};
use super::slices::SLICE_FORMAT;
use super::store::ParticleStore;
use super::uniforms::{FrameUniforms, SliceUniformBuffer};
use super::{storage_entry, uniform_entry, validated};
use crate::error::GpuError;

/// The `potential` stage and its index buffer.
pub struct SliceRasterizer {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    index_buffer: wgpu::Buffer,
    /// Entries the index buffer can hold.
    index_capacity: usize,
}

impl SliceRasterizer {
    pub fn new(
        device: &wgpu::Device,
        shaders: &ShaderLibrary,
        frame_buffer: &wgpu::Buffer,
        planes: &SliceUniformBuffer,
        store: &ParticleStore,
        index_capacity: usize,
    ) -> Result<Self, GpuError> {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Potential Bind Group Layout"),
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
                storage_entry(2, wgpu::ShaderStages::VERTEX, true),
                storage_entry(3, wgpu::ShaderStages::VERTEX, true),
            ],
        });

        let pipeline = validated(device, || {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Potential Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            let module = shaders.get(ShaderStage::Potential);
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Potential Pipeline"),
                layout: Some(&layout),
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
                        format: SLICE_FORMAT,
                        // Overlapping particles sum their potentials
                        blend: Some(wgpu::BlendState {
                            color: wgpu::BlendComponent {
                                src_factor: wgpu::BlendFactor::One,
                                dst_factor: wgpu::BlendFactor::One,
                                operation: wgpu::BlendOperation::Add,
                            },
                            alpha: wgpu::BlendComponent {
                                src_factor: wgpu::BlendFactor::One,
                                dst_factor: wgpu::BlendFactor::One,
                                operation: wgpu::BlendOperation::Add,
                            },
                        }),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;

        let index_capacity = index_capacity.max(1);
        let index_buffer = Self::create_index_buffer(device, index_capacity);
        let bind_group = Self::create_bind_group(
            device,
            &bind_group_layout,
            frame_buffer,
            planes,
            store,
            &index_buffer,
        );

        Ok(Self {
            pipeline,
            bind_group_layout,
            bind_group,
            index_buffer,
            index_capacity,
        })
    }

    fn create_index_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Slice Index Buffer"),
            size: (capacity * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        frame_buffer: &wgpu::Buffer,
        planes: &SliceUniformBuffer,
        store: &ParticleStore,
        index_buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Potential Bind Group"),
            layout,
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
                    resource: store.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: index_buffer.as_entire_binding(),
                },
            ],
        })
    }

    pub fn index_capacity(&self) -> usize {
        self.index_capacity
    }

    /// Upload the flattened buckets, growing the index buffer when needed.
    pub fn upload_indices(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame_buffer: &wgpu::Buffer,
        planes: &SliceUniformBuffer,
        store: &ParticleStore,
        indices: &[u32],
    ) {
        if indices.len() > self.index_capacity {
            let capacity = indices.len().next_power_of_two();
            log::debug!(
                "Growing slice index buffer from {} to {} entries",
                self.index_capacity,
                capacity
            );
            self.index_buffer = Self::create_index_buffer(device, capacity);
            self.index_capacity = capacity;
            self.bind_group = Self::create_bind_group(
                device,
                &self.bind_group_layout,
                frame_buffer,
                planes,
                store,
                &self.index_buffer,
            );
        }
        if !indices.is_empty() {
            queue.write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(indices));
        }
    }

    /// Clear `target` and splat the particles in `instances` into it.
    pub fn encode_slice(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        plane_offset: u32,
        instances: Range<u32>,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Potential Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if instances.is_empty() {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[plane_offset]);
        pass.draw(0..6, instances);
    }
}
