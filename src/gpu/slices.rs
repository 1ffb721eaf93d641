//! The two off-screen slice textures and the ping-pong between them.

pub const SLICE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Which of the two slice textures is being written this step.
///
/// The texture written for slice `i` is read as the "previous" slice while
/// compositing slice `i + 1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PingPong {
    current: usize,
}

impl PingPong {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    #[inline]
    pub fn previous(&self) -> usize {
        1 - self.current
    }

    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }
}

/// Pair of float render targets holding one slice's potential each.
pub struct SliceTargets {
    #[allow(dead_code)]
    textures: [wgpu::Texture; 2],
    views: [wgpu::TextureView; 2],
    sampler: wgpu::Sampler,
}

impl SliceTargets {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let create = |label: &'static str| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: SLICE_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        };
        let textures = [create("Slice Texture 0"), create("Slice Texture 1")];
        let views = [
            textures[0].create_view(&wgpu::TextureViewDescriptor::default()),
            textures[1].create_view(&wgpu::TextureViewDescriptor::default()),
        ];

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Slice Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            textures,
            views,
            sampler,
        }
    }

    pub fn view(&self, index: usize) -> &wgpu::TextureView {
        &self.views[index]
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Clear one target to zero potential.
    pub fn encode_clear(&self, encoder: &mut wgpu::CommandEncoder, index: usize) {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Slice Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.views[index],
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
    }
}
