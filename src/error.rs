//! Error types for the metaball engine.
//!
//! Construction failures (adapter, device, shader, pipeline) are fatal and
//! surface from the constructors; the only runtime errors are caller
//! precondition violations.

use std::fmt;

/// Errors raised while acquiring or using the GPU.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// A shader stage failed to compile or validate.
    ShaderCompilation { stage: &'static str, message: String },
    /// A pipeline, buffer or texture was rejected by validation.
    Validation(String),
    /// Failed to map buffer for reading.
    BufferMapping(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with WebGPU/Vulkan/Metal/DX12 support."),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::ShaderCompilation { stage, message } => {
                write!(f, "Failed to compile '{}' shader: {}", stage, message)
            }
            GpuError::Validation(msg) => write!(f, "GPU validation error: {}", msg),
            GpuError::BufferMapping(msg) => write!(f, "Failed to map GPU buffer: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors raised by [`Blob`](crate::Blob).
#[derive(Debug)]
pub enum BlobError {
    /// GPU resource creation or readback failed.
    Gpu(GpuError),
    /// The engine needs at least one particle.
    EmptyParticleSet,
    /// `initialize` was given a different number of particles than the store holds.
    CapacityMismatch { expected: usize, actual: usize },
    /// Depth compositing is enabled but the frame target has no depth view.
    MissingDepthTarget,
}

impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobError::Gpu(e) => write!(f, "GPU error: {}", e),
            BlobError::EmptyParticleSet => write!(f, "Cannot create a particle store with no particles"),
            BlobError::CapacityMismatch { expected, actual } => write!(
                f,
                "Particle store holds {} particles but {} were supplied",
                expected, actual
            ),
            BlobError::MissingDepthTarget => {
                write!(f, "Depth compositing is enabled but no depth view was supplied")
            }
        }
    }
}

impl std::error::Error for BlobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobError::Gpu(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GpuError> for BlobError {
    fn from(e: GpuError) -> Self {
        BlobError::Gpu(e)
    }
}

/// Errors that can occur when running the viewer application.
#[derive(Debug)]
pub enum AppError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
    /// The engine could not be built.
    Blob(BlobError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            AppError::Window(e) => write!(f, "Failed to create window: {}", e),
            AppError::Gpu(e) => write!(f, "GPU error: {}", e),
            AppError::Blob(e) => write!(f, "Metaball engine error: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::EventLoop(e) => Some(e),
            AppError::Window(e) => Some(e),
            AppError::Gpu(e) => Some(e),
            AppError::Blob(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for AppError {
    fn from(e: winit::error::EventLoopError) -> Self {
        AppError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for AppError {
    fn from(e: winit::error::OsError) -> Self {
        AppError::Window(e)
    }
}

impl From<GpuError> for AppError {
    fn from(e: GpuError) -> Self {
        AppError::Gpu(e)
    }
}

impl From<BlobError> for AppError {
    fn from(e: BlobError) -> Self {
        AppError::Blob(e)
    }
}
