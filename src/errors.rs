//! Error Types
//!
//! This module defines the error types used throughout the pipeline.
//!
//! # Overview
//!
//! The main error type [`PostFxError`] covers the construction-time failure
//! modes only:
//! - GPU adapter / device / surface acquisition failures
//! - A backend that cannot provide any usable graphics context
//! - Invalid initial resolutions
//! - Shader template rendering failures
//! - Pixel readback failures (headless use)
//!
//! The per-frame hot path never returns errors: missing capabilities downgrade
//! behavior, missing material properties fall back to defaults, and renderables
//! lacking required vertex attributes are skipped.
//!
//! # Usage
//!
//! ```rust,ignore
//! use myth_postfx::errors::Result;
//! use myth_postfx::{BackendSettings, WgpuBackend};
//!
//! fn build() -> Result<()> {
//!     let backend = WgpuBackend::headless(&BackendSettings::default())?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the post-processing pipeline.
#[derive(Error, Debug)]
pub enum PostFxError {
    // ========================================================================
    // GPU & Context Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create a presentation surface for a window.
    #[error("Failed to create surface: {0}")]
    SurfaceCreateFailed(String),

    /// The adapter cannot present to the given surface.
    #[error("Surface not supported by adapter")]
    SurfaceUnsupported,

    /// Acquiring the next swapchain image failed.
    #[error("Failed to acquire surface texture: {0}")]
    SurfaceAcquireFailed(String),

    /// The backend reported no usable graphics context.
    #[error("No usable graphics context (API version {version})")]
    UnsupportedContext {
        /// Reported API major version
        version: u32,
    },

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A zero-sized output resolution was requested at construction.
    #[error("Invalid resolution {width}x{height}")]
    InvalidResolution {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
    },

    /// A shader template failed to render.
    #[error("Shader template error: {0}")]
    ShaderTemplate(#[from] minijinja::Error),

    /// Reading pixels back from the GPU failed.
    #[error("Readback error: {0}")]
    Readback(String),
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<wgpu::CreateSurfaceError> for PostFxError {
    fn from(err: wgpu::CreateSurfaceError) -> Self {
        PostFxError::SurfaceCreateFailed(err.to_string())
    }
}

impl From<wgpu::RequestAdapterError> for PostFxError {
    fn from(err: wgpu::RequestAdapterError) -> Self {
        PostFxError::AdapterRequestFailed(err.to_string())
    }
}

/// Alias for `Result<T, PostFxError>`.
pub type Result<T> = std::result::Result<T, PostFxError>;
