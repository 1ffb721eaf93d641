//! Fixed-capacity particle buffer shared by the kernel and the renderers.

use std::sync::mpsc;

use wgpu::util::DeviceExt;

use crate::error::{BlobError, GpuError};
use crate::particle::Particle;

const PARTICLE_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4, 2 => Float32x4];

/// GPU buffer of [`Particle`] records.
///
/// Usable as an instanced vertex buffer (position, velocity, force at
/// locations 0, 1, 2) and as a storage buffer.
pub struct ParticleStore {
    buffer: wgpu::Buffer,
    capacity: usize,
}

impl ParticleStore {
    /// Create a store sized to `particles` and upload them.
    pub fn new(device: &wgpu::Device, particles: &[Particle]) -> Result<Self, BlobError> {
        if particles.is_empty() {
            return Err(BlobError::EmptyParticleSet);
        }
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Buffer"),
            contents: bytemuck::cast_slice(particles),
            usage: wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });
        Ok(Self {
            buffer,
            capacity: particles.len(),
        })
    }

    /// Overwrite the whole store. The count must equal the capacity.
    pub fn initialize(&self, queue: &wgpu::Queue, particles: &[Particle]) -> Result<(), BlobError> {
        if particles.len() != self.capacity {
            return Err(BlobError::CapacityMismatch {
                expected: self.capacity,
                actual: particles.len(),
            });
        }
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(particles));
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn size_bytes(&self) -> u64 {
        self.capacity as u64 * Particle::SIZE
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Layout for drawing the store as an instance-rate vertex buffer.
    pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Particle::SIZE,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &PARTICLE_ATTRIBUTES,
        }
    }

    /// Copy the store back to the host, waiting for all queued work first.
    pub fn read_back(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<Vec<Particle>, GpuError> {
        let size = self.size_bytes();
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Particle Readback Encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, size);
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(GpuError::BufferMapping(e.to_string())),
            Err(e) => return Err(GpuError::BufferMapping(e.to_string())),
        }

        let particles = {
            let data = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, Particle>(&data).to_vec()
        };
        staging.unmap();
        Ok(particles)
    }
}
