//! Depth slicing of the view volume and per-frame slice bucketing.
//!
//! The view frustum is cut into `slice_count` bands of equal width in NDC
//! depth. Every frame each particle is dropped into the bucket of every band
//! its influence sphere overlaps, so the rasterizer only draws the particles
//! that can contribute to a slice.
//!
//! All formulas take the projection in the OpenGL clip convention (NDC depth in
//! `[-1, 1]`, `glam::Mat4::perspective_rh_gl`) and assume a perspective matrix
//! (`m23 == -1`).

use std::ops::{Range, RangeInclusive};

use glam::{Mat4, Vec4};

use crate::particle::Particle;

/// Depth coefficients of a perspective projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthMapping {
    /// Column 2, row 2.
    pub m22: f32,
    /// Column 3, row 2.
    pub m32: f32,
    /// Column 2, row 3.
    pub m23: f32,
}

impl DepthMapping {
    pub fn from_projection(projection: &Mat4) -> Self {
        Self {
            m22: projection.z_axis.z,
            m32: projection.w_axis.z,
            m23: projection.z_axis.w,
        }
    }

    /// Negated NDC depth of a view-space depth `zw`.
    #[inline]
    pub fn screen_depth(&self, zw: f32) -> f32 {
        self.m22 + self.m32 / zw
    }

    /// View-space depth of the point at NDC depth `z_clip`.
    #[inline]
    pub fn view_depth(&self, z_clip: f32) -> f32 {
        self.m32 / (z_clip * self.m23 - self.m22)
    }
}

/// Where one slice sits in clip and view space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlicePlane {
    /// NDC depth of the slice center.
    pub z_clip: f32,
    /// View-space depth of the slice center.
    pub z_slice: f32,
}

impl SlicePlane {
    pub fn new(index: usize, slice_count: usize, mapping: &DepthMapping) -> Self {
        let z_clip = (index * 2 + 1) as f32 / slice_count as f32 - 1.0;
        Self {
            z_clip,
            z_slice: mapping.view_depth(z_clip),
        }
    }
}

/// View-space depth of a model-space position under `modelview`.
#[inline]
pub fn view_depth(modelview: &Mat4, position: [f32; 4]) -> f32 {
    modelview.row(2).dot(Vec4::from_array(position))
}

/// First slice touched by a sphere whose front face lies at view depth `zw_front`.
pub fn front_slice(zw_front: f32, mapping: &DepthMapping, slice_count: usize) -> i64 {
    let zsf = mapping.screen_depth(zw_front);
    let index = ((0.5 - zsf * 0.5) * slice_count as f32 - 0.5).ceil() as i64;
    index.max(0)
}

/// Last slice touched by a sphere whose back face lies at view depth `zw_back`.
pub fn back_slice(zw_back: f32, mapping: &DepthMapping, slice_count: usize) -> i64 {
    let zsr = mapping.screen_depth(zw_back);
    let index = ((0.5 - zsr * 0.5) * slice_count as f32 - 0.5).floor() as i64;
    index.min(slice_count as i64 - 1)
}

/// Slices overlapped by a sphere of `radius` centered at view depth `zw`.
///
/// `None` when the sphere lies entirely in front of the first or behind the
/// last slice.
pub fn slice_span(
    zw: f32,
    radius: f32,
    mapping: &DepthMapping,
    slice_count: usize,
) -> Option<RangeInclusive<usize>> {
    let front = front_slice(zw + radius, mapping, slice_count);
    let back = back_slice(zw - radius, mapping, slice_count);
    if front > back {
        return None;
    }
    Some(front as usize..=back as usize)
}

/// Per-slice particle index lists, rebuilt from scratch every frame.
#[derive(Clone, Debug)]
pub struct SliceBuckets {
    buckets: Vec<Vec<u32>>,
}

impl SliceBuckets {
    pub fn new(slice_count: usize) -> Self {
        Self {
            buckets: vec![Vec::new(); slice_count],
        }
    }

    pub fn slice_count(&self) -> usize {
        self.buckets.len()
    }

    /// Empty every bucket, keeping allocations.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    /// Reassign all particles for the given view.
    pub fn rebuild(
        &mut self,
        particles: &[Particle],
        modelview: &Mat4,
        mapping: &DepthMapping,
        radius: f32,
    ) {
        self.clear();
        let slice_count = self.slice_count();
        for (index, particle) in particles.iter().enumerate() {
            let zw = view_depth(modelview, particle.position);
            if let Some(span) = slice_span(zw, radius, mapping, slice_count) {
                for slice in span {
                    self.buckets[slice].push(index as u32);
                }
            }
        }
    }

    /// Put every particle in every bucket.
    pub fn fill_all(&mut self, particle_count: usize) {
        for bucket in &mut self.buckets {
            bucket.clear();
            bucket.extend(0..particle_count as u32);
        }
    }

    pub fn bucket(&self, slice: usize) -> &[u32] {
        &self.buckets[slice]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u32]> {
        self.buckets.iter().map(Vec::as_slice)
    }

    /// Total number of (slice, particle) entries.
    pub fn total_entries(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Concatenate the buckets into `indices`, recording where each one lives.
    ///
    /// Slice `i` occupies `indices[ranges[i]]`, which is also the instance
    /// range the rasterizer draws for that slice.
    pub fn flatten_into(&self, indices: &mut Vec<u32>, ranges: &mut Vec<Range<u32>>) {
        indices.clear();
        ranges.clear();
        for bucket in &self.buckets {
            let start = indices.len() as u32;
            indices.extend_from_slice(bucket);
            ranges.push(start..indices.len() as u32);
        }
    }
}
