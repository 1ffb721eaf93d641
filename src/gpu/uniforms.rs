//! Uniform blocks written by the host every frame.
//!
//! [`FrameUniforms`] is shared by every render stage. The per-slice plane
//! records live in one buffer at a stride that satisfies the device's
//! dynamic-offset alignment, so a single bind group serves all slices.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::slicing::SlicePlane;

/// Per-frame parameters of the render stages.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FrameUniforms {
    pub projection: [[f32; 4]; 4],
    pub modelview: [[f32; 4]; 4],
    /// Size of the slice textures in pixels.
    pub size: [f32; 2],
    pub radius: f32,
    pub threshold: f32,
    pub slice_blend: f32,
    pub point_size: f32,
    pub _padding: [f32; 2],
}

impl FrameUniforms {
    pub const SIZE: u64 = std::mem::size_of::<FrameUniforms>() as u64;

    pub fn new(projection: &Mat4, modelview: &Mat4) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            modelview: modelview.to_cols_array_2d(),
            size: [1.0, 1.0],
            radius: 0.0,
            threshold: 0.0,
            slice_blend: 0.0,
            point_size: 0.0,
            _padding: [0.0; 2],
        }
    }
}

/// One slice plane as the shaders see it.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SlicePlaneUniform {
    pub z_slice: f32,
    pub z_clip: f32,
    pub _padding: [f32; 2],
}

impl From<SlicePlane> for SlicePlaneUniform {
    fn from(plane: SlicePlane) -> Self {
        Self {
            z_slice: plane.z_slice,
            z_clip: plane.z_clip,
            _padding: [0.0; 2],
        }
    }
}

/// Round `size` up to a multiple of `alignment`.
pub fn aligned_stride(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

/// All slice planes of a frame, addressed by dynamic offset.
pub struct SliceUniformBuffer {
    buffer: wgpu::Buffer,
    stride: u64,
    slice_count: u32,
    staging: Vec<u8>,
}

impl SliceUniformBuffer {
    pub const BINDING_SIZE: u64 = std::mem::size_of::<SlicePlaneUniform>() as u64;

    pub fn new(device: &wgpu::Device, slice_count: u32) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = aligned_stride(Self::BINDING_SIZE, alignment);
        let size = stride * slice_count.max(1) as u64;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Slice Plane Buffer"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            stride,
            slice_count,
            staging: vec![0; size as usize],
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Binding covering one slice record.
    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: 0,
            size: wgpu::BufferSize::new(Self::BINDING_SIZE),
        })
    }

    /// Dynamic offset of slice `index`.
    pub fn offset(&self, index: u32) -> u32 {
        (self.stride * index as u64) as u32
    }

    /// Upload the planes for this frame in one write.
    pub fn write(&mut self, queue: &wgpu::Queue, planes: &[SlicePlane]) {
        for (index, plane) in planes.iter().take(self.slice_count as usize).enumerate() {
            let record = SlicePlaneUniform::from(*plane);
            let start = index * self.stride as usize;
            self.staging[start..start + Self::BINDING_SIZE as usize]
                .copy_from_slice(bytemuck::bytes_of(&record));
        }
        queue.write_buffer(&self.buffer, 0, &self.staging);
    }
}
