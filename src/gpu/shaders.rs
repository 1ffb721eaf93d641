//! WGSL sources for the four pipeline stages and their compilation.
//!
//! | Stage | Entry points | Purpose |
//! |-------|--------------|---------|
//! | `draw` | `vs_main`, `fs_main` | diagnostic point cloud |
//! | `update` | `main` | physics step, one invocation per particle |
//! | `potential` | `vs_main`, `fs_main` | splat particles into one slice |
//! | `rectangle` | `vs_main`, `fs_main` | threshold and shade one slice on screen |

use crate::error::GpuError;
use crate::particle::Particle;

/// Threads per workgroup of the update kernel.
pub const WORKGROUP_SIZE: u32 = 256;

/// Uniforms shared by the render stages, one copy per frame.
const FRAME_WGSL: &str = r#"
struct FrameUniforms {
    projection: mat4x4<f32>,
    modelview: mat4x4<f32>,
    size: vec2<f32>,
    radius: f32,
    threshold: f32,
    slice_blend: f32,
    point_size: f32,
    _padding: vec2<f32>,
};

struct SlicePlane {
    z_slice: f32,
    z_clip: f32,
    _padding: vec2<f32>,
};

// View-space point on the plane z = z_view under the pixel at `ndc`.
fn unproject_on_plane(ndc: vec2<f32>, z_view: f32, p: mat4x4<f32>) -> vec3<f32> {
    let w = p[2][3] * z_view + p[3][3];
    let x = (ndc.x * w - p[2][0] * z_view - p[3][0]) / p[0][0];
    let y = (ndc.y * w - p[2][1] * z_view - p[3][1]) / p[1][1];
    return vec3<f32>(x, y, z_view);
}
"#;

const DRAW_WGSL: &str = r#"
@group(0) @binding(0)
var<uniform> frame: FrameUniforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) speed: f32,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) position: vec4<f32>,
    @location(1) velocity: vec4<f32>,
    @location(2) force: vec4<f32>,
) -> VertexOutput {
    var quad_vertices = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
    );
    let quad_pos = quad_vertices[vertex_index];

    var clip_pos = frame.projection * (frame.modelview * position);
    clip_pos.x += quad_pos.x * frame.point_size * clip_pos.w;
    clip_pos.y += quad_pos.y * frame.point_size * clip_pos.w;
    clip_pos.z = 0.5 * (clip_pos.z + clip_pos.w);

    var out: VertexOutput;
    out.clip_position = clip_pos;
    out.uv = quad_pos;
    out.speed = length(velocity.xyz);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let dist = length(in.uv);
    if dist > 1.0 {
        discard;
    }
    let alpha = 1.0 - smoothstep(0.5, 1.0, dist);
    let color = mix(vec3<f32>(0.8, 0.9, 1.0), vec3<f32>(1.0, 0.5, 0.2), clamp(in.speed, 0.0, 1.0));
    return vec4<f32>(color, alpha);
}
"#;

const UPDATE_WGSL: &str = r#"
struct UpdateParams {
    sphere: vec4<f32>,
    equilibrium: f32,
    spring: f32,
    attenuation: f32,
    weight: f32,
    range: f32,
    timestep: f32,
    count: u32,
    _padding: u32,
};

@group(0) @binding(0)
var<storage, read_write> particles: array<Particle>;

@group(0) @binding(1)
var<uniform> params: UpdateParams;

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let index = global_id.x;
    if index >= params.count {
        return;
    }

    var p = particles[index];

    // Spring toward the rest distance from the obstacle surface
    let d = p.position.xyz - params.sphere.xyz;
    let dist = length(d);
    var spring_force = vec3<f32>(0.0);
    if dist > 0.0 {
        let surface = dist - params.sphere.w;
        if surface < params.range {
            spring_force = d * (params.spring * (params.equilibrium - surface) / dist);
        }
    }

    let force = spring_force - p.velocity.xyz * params.attenuation;
    let velocity = p.velocity.xyz + force / params.weight * params.timestep;
    let position = p.position.xyz + velocity * params.timestep;

    p.position = vec4<f32>(position, 1.0);
    p.velocity = vec4<f32>(velocity, 0.0);
    p.force = vec4<f32>(force, 0.0);
    particles[index] = p;
}
"#;

const POTENTIAL_WGSL: &str = r#"
@group(0) @binding(0)
var<uniform> frame: FrameUniforms;

@group(0) @binding(1)
var<uniform> plane: SlicePlane;

@group(0) @binding(2)
var<storage, read> particles: array<Particle>;

@group(0) @binding(3)
var<storage, read> indices: array<u32>;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) center: vec3<f32>,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @builtin(instance_index) instance_index: u32,
) -> VertexOutput {
    var quad_vertices = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
    );

    let particle = particles[indices[instance_index]];
    let center = (frame.modelview * particle.position).xyz;

    var out: VertexOutput;
    out.center = center;

    // Radius of the circle the influence sphere cuts from the slice plane
    let dz = center.z - plane.z_slice;
    let r2 = frame.radius * frame.radius - dz * dz;
    if r2 <= 0.0 {
        out.clip_position = vec4<f32>(2.0, 2.0, 2.0, 1.0);
        return out;
    }

    let corner = quad_vertices[vertex_index] * sqrt(r2);
    let on_plane = vec4<f32>(center.xy + corner, plane.z_slice, 1.0);
    var clip_pos = frame.projection * on_plane;
    clip_pos.z = 0.5 * (clip_pos.z + clip_pos.w);
    out.clip_position = clip_pos;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let ndc = vec2<f32>(
        in.clip_position.x / frame.size.x * 2.0 - 1.0,
        1.0 - in.clip_position.y / frame.size.y * 2.0,
    );
    let q = unproject_on_plane(ndc, plane.z_slice, frame.projection);
    let d = q - in.center;
    let t = 1.0 - dot(d, d) / (frame.radius * frame.radius);
    if t <= 0.0 {
        discard;
    }
    // rgb: outward normal contribution, a: potential
    return vec4<f32>(t * t * d / frame.radius, t * t * t);
}
"#;

const RECTANGLE_WGSL: &str = r#"
struct Material {
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    shininess: f32,
    _padding0: f32,
    _padding1: f32,
    _padding2: f32,
};

struct Light {
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    position: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> frame: FrameUniforms;

@group(0) @binding(1)
var<uniform> plane: SlicePlane;

@group(0) @binding(2)
var current_image: texture_2d<f32>;

@group(0) @binding(3)
var previous_image: texture_2d<f32>;

@group(0) @binding(4)
var image_sampler: sampler;

@group(0) @binding(5)
var<uniform> material: Material;

@group(1) @binding(0)
var<uniform> light: Light;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

// Screen-covering quad drawn as a 4-vertex triangle strip at the slice depth
@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 4>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0,  1.0),
    );
    let c = corners[vertex_index];

    var out: VertexOutput;
    out.clip_position = vec4<f32>(c, plane.z_clip * 0.5 + 0.5, 1.0);
    out.uv = vec2<f32>(c.x * 0.5 + 0.5, 0.5 - c.y * 0.5);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let current = textureSample(current_image, image_sampler, in.uv);
    let previous = textureSample(previous_image, image_sampler, in.uv);
    let value = mix(current, previous, frame.slice_blend);

    if value.a < frame.threshold {
        discard;
    }

    var n = vec3<f32>(0.0, 0.0, 1.0);
    if dot(value.xyz, value.xyz) > 0.0 {
        n = normalize(value.xyz);
    }

    let ndc = vec2<f32>(in.uv.x * 2.0 - 1.0, 1.0 - in.uv.y * 2.0);
    let p = unproject_on_plane(ndc, plane.z_slice, frame.projection);

    let l = normalize(light.position.xyz - p * light.position.w);
    let v = normalize(-p);
    let h = normalize(l + v);

    let diffuse = max(dot(n, l), 0.0);
    let specular = pow(max(dot(n, h), 0.0), material.shininess);

    let color = light.ambient * material.ambient
        + light.diffuse * material.diffuse * diffuse
        + light.specular * material.specular * specular;
    return vec4<f32>(color.rgb, 1.0);
}
"#;

/// The four named shader stages the engine is built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Draw,
    Update,
    Potential,
    Rectangle,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 4] = [
        ShaderStage::Draw,
        ShaderStage::Update,
        ShaderStage::Potential,
        ShaderStage::Rectangle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Draw => "draw",
            ShaderStage::Update => "update",
            ShaderStage::Potential => "potential",
            ShaderStage::Rectangle => "rectangle",
        }
    }

    /// Complete WGSL source for this stage.
    pub fn source(self) -> String {
        match self {
            ShaderStage::Draw => format!("{FRAME_WGSL}{DRAW_WGSL}"),
            ShaderStage::Update => format!("{}{UPDATE_WGSL}", Particle::WGSL_STRUCT),
            ShaderStage::Potential => {
                format!("{}{FRAME_WGSL}{POTENTIAL_WGSL}", Particle::WGSL_STRUCT)
            }
            ShaderStage::Rectangle => format!("{FRAME_WGSL}{RECTANGLE_WGSL}"),
        }
    }
}

/// Compiled modules for every stage.
pub struct ShaderLibrary {
    draw: wgpu::ShaderModule,
    update: wgpu::ShaderModule,
    potential: wgpu::ShaderModule,
    rectangle: wgpu::ShaderModule,
}

impl ShaderLibrary {
    /// Compile all stages, failing on the first one that does not validate.
    pub fn new(device: &wgpu::Device) -> Result<Self, GpuError> {
        Ok(Self {
            draw: Self::compile(device, ShaderStage::Draw)?,
            update: Self::compile(device, ShaderStage::Update)?,
            potential: Self::compile(device, ShaderStage::Potential)?,
            rectangle: Self::compile(device, ShaderStage::Rectangle)?,
        })
    }

    /// Compile one stage inside a validation error scope.
    pub fn compile(device: &wgpu::Device, stage: ShaderStage) -> Result<wgpu::ShaderModule, GpuError> {
        let source = stage.source();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(stage.name()),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::ShaderCompilation {
                stage: stage.name(),
                message: error.to_string(),
            });
        }
        Ok(module)
    }

    pub fn get(&self, stage: ShaderStage) -> &wgpu::ShaderModule {
        match stage {
            ShaderStage::Draw => &self.draw,
            ShaderStage::Update => &self.update,
            ShaderStage::Potential => &self.potential,
            ShaderStage::Rectangle => &self.rectangle,
        }
    }
}
