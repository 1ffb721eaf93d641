//! Light and material blocks for the isosurface shading pass.

use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use wgpu::util::DeviceExt;

/// Phong light source, laid out as the shader's `Light` uniform block.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Light {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    /// View-space position; `w = 0` makes it directional.
    pub position: [f32; 4],
}

impl Light {
    pub fn new(ambient: Vec4, diffuse: Vec4, specular: Vec4, position: Vec4) -> Self {
        Self {
            ambient: ambient.to_array(),
            diffuse: diffuse.to_array(),
            specular: specular.to_array(),
            position: position.to_array(),
        }
    }
}

impl Default for Light {
    fn default() -> Self {
        Self {
            ambient: [0.1, 0.1, 0.1, 1.0],
            diffuse: [1.0, 1.0, 1.0, 1.0],
            specular: [1.0, 1.0, 1.0, 1.0],
            position: [3.0, 4.0, 5.0, 1.0],
        }
    }
}

/// Surface reflectance of the metaball isosurface.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Material {
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub shininess: f32,
    pub _padding: [f32; 3],
}

impl Material {
    pub fn new(ambient: Vec4, diffuse: Vec4, specular: Vec4, shininess: f32) -> Self {
        Self {
            ambient: ambient.to_array(),
            diffuse: diffuse.to_array(),
            specular: specular.to_array(),
            shininess,
            _padding: [0.0; 3],
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new(
            Vec4::new(0.6, 0.6, 0.6, 1.0),
            Vec4::new(0.6, 0.6, 0.6, 0.0),
            Vec4::new(0.4, 0.4, 0.4, 0.0),
            30.0,
        )
    }
}

static NEXT_LIGHT_ID: AtomicU64 = AtomicU64::new(0);

/// A [`Light`] living in a GPU uniform buffer.
pub struct LightBuffer {
    buffer: wgpu::Buffer,
    light: Light,
    /// Unique per buffer, so renderers can cache bind groups over it.
    id: u64,
}

impl LightBuffer {
    pub fn new(device: &wgpu::Device, light: &Light) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::bytes_of(light),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            buffer,
            light: *light,
            id: NEXT_LIGHT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Replace the light parameters.
    pub fn set(&mut self, queue: &wgpu::Queue, light: &Light) {
        self.light = *light;
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(light));
    }

    pub fn light(&self) -> &Light {
        &self.light
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_sizes() {
        assert_eq!(std::mem::size_of::<Light>(), 64);
        assert_eq!(std::mem::size_of::<Material>(), 64);
    }

    #[test]
    fn test_default_light_is_positional() {
        assert_eq!(Light::default().position[3], 1.0);
    }
}
