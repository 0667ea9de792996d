use std::path::PathBuf;

use naga::ShaderStage;
use thiserror::Error;
use wgpu::VertexFormat;

/// Failures of the shader program wrapper.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("shader file names were not set")]
    MissingShaderNames,
    #[error("failed to read shader {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage:?} shader failed to compile:\n{message}")]
    Compile { stage: ShaderStage, message: String },
    #[error("program failed to link: {0}")]
    Link(String),
    #[error("unsupported shader interface: {0}")]
    Unsupported(String),
    #[error("'{0}' is not an active uniform")]
    UnknownUniform(String),
    #[error("'{0}' is not an active attribute")]
    UnknownAttribute(String),
    #[error("uniform '{0}' was never registered with add_uniform")]
    UnregisteredUniform(String),
    #[error("attribute '{0}' was never registered with add_attribute")]
    UnregisteredAttribute(String),
    #[error("uniform '{name}' holds {expected} bytes, got {actual}")]
    UniformSize {
        name: String,
        expected: u32,
        actual: usize,
    },
    #[error("program is not initialized")]
    NotInitialized,
}

/// Failures while uploading or drawing.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error(transparent)]
    Transform(#[from] corelib::CoreError),
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
    #[error("shader input '{0}' has no mesh data to read from")]
    UnfedAttribute(String),
    #[error("attribute '{name}' is {format:?}; meshes provide Float32x3")]
    AttributeFormat { name: String, format: VertexFormat },
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}
