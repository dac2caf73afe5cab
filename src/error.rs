// Error types for scenecraft

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading, rendering or exporting a scene
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to parse {path}: {source}")]
    Ron {
        path: String,
        #[source]
        source: ron::error::SpannedError,
    },

    #[error("Failed to load mesh {path}: {source}")]
    Obj {
        path: String,
        #[source]
        source: tobj::LoadError,
    },

    #[error("Invalid scene description: {0}")]
    InvalidScene(String),

    #[error("Failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("No compatible GPU adapter found")]
    NoAdapter,

    #[error("Failed to request device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("Failed to acquire frame: {0}")]
    Frame(#[from] wgpu::SurfaceError),

    #[error("Frame readback failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("Window error: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("Export failed: {0}")]
    Export(String),
}
