//! Engine configuration.

use crate::lighting::Material;

/// Configuration for the sliced metaball renderer.
///
/// The three switches `bucket_sort`, `depth_test` and `finish` default to the
/// crate's cargo features of the same purpose (`bucket-sort`, `depth`,
/// `gpu-finish`).
#[derive(Clone, Debug)]
pub struct MetaballConfig {
    /// Number of depth slices the view volume is cut into.
    pub slice_count: u32,
    /// Width of each slice's potential texture.
    pub slice_width: u32,
    /// Height of each slice's potential texture.
    pub slice_height: u32,
    /// Radius of a metaball's influence sphere in view-space units.
    pub sphere_radius: f32,
    /// Isosurface threshold with the wheel at rest.
    pub threshold_base: f32,
    /// Threshold change per wheel step.
    pub threshold_step: f32,
    /// Weight of the previous slice when compositing (0 = current slice only).
    pub slice_blend: f32,
    /// Half-size of a point in clip units for the diagnostic point draw.
    pub point_size: f32,
    /// Draw each slice with only the particles overlapping it.
    pub bucket_sort: bool,
    /// Composite slices with depth test and depth writes.
    pub depth_test: bool,
    /// Wait for the GPU after every frame.
    pub finish: bool,
    /// Reflectance of the isosurface.
    pub material: Material,
    /// Color the frame is cleared to before compositing.
    pub clear_color: wgpu::Color,
    /// Format of the color target the compositor draws into.
    pub surface_format: wgpu::TextureFormat,
    /// Format of the depth target when `depth_test` is on.
    pub depth_format: wgpu::TextureFormat,
}

impl Default for MetaballConfig {
    fn default() -> Self {
        Self {
            slice_count: 128,
            slice_width: 128,
            slice_height: 128,
            sphere_radius: 0.1,
            threshold_base: 1.0,
            threshold_step: 0.1,
            slice_blend: 0.5,
            point_size: 0.01,
            bucket_sort: cfg!(feature = "bucket-sort"),
            depth_test: cfg!(feature = "depth"),
            finish: cfg!(feature = "gpu-finish"),
            material: Material::default(),
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.2,
                b: 0.3,
                a: 0.0,
            },
            surface_format: wgpu::TextureFormat::Bgra8UnormSrgb,
            depth_format: wgpu::TextureFormat::Depth32Float,
        }
    }
}

impl MetaballConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of slices (at least 1).
    pub fn with_slice_count(mut self, count: u32) -> Self {
        self.slice_count = count.max(1);
        self
    }

    /// Set the potential texture resolution (at least 1×1).
    pub fn with_slice_size(mut self, width: u32, height: u32) -> Self {
        self.slice_width = width.max(1);
        self.slice_height = height.max(1);
        self
    }

    pub fn with_sphere_radius(mut self, radius: f32) -> Self {
        self.sphere_radius = radius.abs();
        self
    }

    pub fn with_threshold(mut self, base: f32, step: f32) -> Self {
        self.threshold_base = base;
        self.threshold_step = step;
        self
    }

    pub fn with_slice_blend(mut self, blend: f32) -> Self {
        self.slice_blend = blend.clamp(0.0, 1.0);
        self
    }

    pub fn with_point_size(mut self, size: f32) -> Self {
        self.point_size = size.abs();
        self
    }

    pub fn with_bucket_sort(mut self, enabled: bool) -> Self {
        self.bucket_sort = enabled;
        self
    }

    pub fn with_depth_test(mut self, enabled: bool) -> Self {
        self.depth_test = enabled;
        self
    }

    pub fn with_finish(mut self, enabled: bool) -> Self {
        self.finish = enabled;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_clear_color(mut self, color: wgpu::Color) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_surface_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.surface_format = format;
        self
    }

    pub fn with_depth_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.depth_format = format;
        self
    }

    /// Isosurface threshold for a given wheel position.
    pub fn threshold(&self, wheel_y: f32) -> f32 {
        wheel_y * self.threshold_step + self.threshold_base
    }
}
