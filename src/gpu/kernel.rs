//! Compute pass advancing every particle one physics step.

use wgpu::util::DeviceExt;

use super::shaders::{ShaderLibrary, ShaderStage, WORKGROUP_SIZE};
use super::store::ParticleStore;
use super::{storage_entry, uniform_entry, validated};
use crate::error::GpuError;
use crate::physics::{Obstacle, PhysicsParams, UpdateUniforms};

/// The `update` stage bound to one particle store.
pub struct UpdateKernel {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    params_buffer: wgpu::Buffer,
    count: u32,
}

impl UpdateKernel {
    pub fn new(
        device: &wgpu::Device,
        shaders: &ShaderLibrary,
        store: &ParticleStore,
    ) -> Result<Self, GpuError> {
        let count = store.capacity() as u32;
        let initial = UpdateUniforms::new(
            &Obstacle::new(glam::Vec3::ZERO, 0.0),
            &PhysicsParams::default(),
            count,
        );
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Update Params Buffer"),
            contents: bytemuck::bytes_of(&initial),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Update Bind Group Layout"),
            entries: &[
                storage_entry(0, wgpu::ShaderStages::COMPUTE, false),
                uniform_entry(1, wgpu::ShaderStages::COMPUTE, false, None),
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Update Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: store.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline = validated(device, || {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Update Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Update Pipeline"),
                layout: Some(&layout),
                module: shaders.get(ShaderStage::Update),
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            })
        })?;

        Ok(Self {
            pipeline,
            bind_group,
            params_buffer,
            count,
        })
    }

    /// Stage the obstacle and coefficients for the next dispatch.
    pub fn write_params(&self, queue: &wgpu::Queue, obstacle: &Obstacle, params: &PhysicsParams) {
        let uniforms = UpdateUniforms::new(obstacle, params, self.count);
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Number of workgroups covering every particle.
    pub fn workgroup_count(&self) -> u32 {
        self.count.div_ceil(WORKGROUP_SIZE)
    }

    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Update Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(self.workgroup_count(), 1, 1);
    }
}
