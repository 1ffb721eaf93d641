//! # flowmetaball
//!
//! GPU particle flow rendered as metaball isosurfaces.
//!
//! A fixed set of particles is pushed around a moving sphere by a compute
//! kernel, then drawn as a smooth blobby surface. The surface is found by
//! cutting the view volume into depth slices: each slice accumulates the
//! potential of the particles near it into an off-screen texture, and a
//! full-screen pass thresholds and shades that texture at the slice's depth.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use flowmetaball::prelude::*;
//!
//! let gpu = Arc::new(GpuContext::headless()?);
//! let particles = CloudGenerator::new(CloudConfig::default()).generate();
//! let mut blob = Blob::new(gpu.clone(), &particles, MetaballConfig::default())?;
//!
//! let obstacle = Obstacle::new(Vec3::new(0.0, 0.0, 3.0), 0.5);
//! blob.update(&obstacle, &PhysicsParams::default());
//! ```
//!
//! ## Pipeline
//!
//! Every frame runs, in order:
//!
//! 1. **update**: one compute invocation per particle applies the obstacle
//!    spring and drag and integrates position.
//! 2. **bucketing**: on the host, each particle is assigned to the slices its
//!    influence sphere overlaps.
//! 3. for each slice, front to back:
//!    - **potential**: the slice's particles are splatted additively into one
//!      of two ping-pong textures
//!    - **rectangle**: the current and previous slice textures are blended,
//!      thresholded and Phong-shaded into the frame at the slice depth
//!
//! ## Features
//!
//! | Feature | Default | Effect |
//! |---------|---------|--------|
//! | `bucket-sort` | on | slices draw only overlapping particles |
//! | `depth` | on | compositing uses depth test and depth writes |
//! | `timing` | on | the viewer logs frames per second |
//! | `gpu-finish` | off | every draw waits for the GPU |
//!
//! ## Logging
//!
//! The crate logs through the `log` facade. The `flowmetaball` binary installs
//! `env_logger`; set `RUST_LOG=flowmetaball=debug` for per-reset detail.

pub mod app;
pub mod blob;
pub mod cloud;
pub mod config;
pub mod error;
pub mod gpu;
pub mod lighting;
pub mod particle;
pub mod physics;
pub mod scene;
pub mod slicing;
pub mod time;

pub use blob::{Blob, HostWindow};
pub use cloud::{CloudConfig, CloudGenerator};
pub use config::MetaballConfig;
pub use error::{AppError, BlobError, GpuError};
pub use glam::{Mat4, Vec3, Vec4};
pub use gpu::{FrameTarget, GpuContext, ShaderLibrary, ShaderStage};
pub use lighting::{Light, LightBuffer, Material};
pub use particle::Particle;
pub use physics::{Obstacle, PhysicsParams};
pub use scene::{Camera, ModelRotation, ObstacleScript, SceneConfig};
pub use slicing::{DepthMapping, SliceBuckets, SlicePlane};
pub use time::{FrameTimer, SimClock};

pub mod prelude {
    pub use crate::app::App;
    pub use crate::blob::{Blob, HostWindow};
    pub use crate::cloud::{CloudConfig, CloudGenerator};
    pub use crate::config::MetaballConfig;
    pub use crate::error::{AppError, BlobError, GpuError};
    pub use crate::gpu::{FrameTarget, GpuContext};
    pub use crate::lighting::{Light, LightBuffer, Material};
    pub use crate::particle::Particle;
    pub use crate::physics::{Obstacle, PhysicsParams};
    pub use crate::scene::{Camera, ObstacleScript, SceneConfig};
    pub use crate::time::{FrameTimer, SimClock};
    pub use crate::{Mat4, Vec3, Vec4};
}
