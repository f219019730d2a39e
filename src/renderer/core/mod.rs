//! GPU abstraction consumed by the pipeline.
//!
//! Everything the orchestrator, the G-buffer, the effects and the temporal
//! accumulator do on the GPU goes through [`RenderBackend`]. Resources are
//! referenced by strongly-typed slot-map handles owned by the backend.
//!
//! - [`handles`]: `TextureId`, `RenderTargetId`, `GeometryId`
//! - [`target`]: texture descriptions and the [`RenderTarget2D`] convenience pair
//! - [`capabilities`]: immutable per-backend feature snapshot
//! - [`program`]: named fullscreen / geometry programs and their uniform layouts
//! - [`backend`]: the [`RenderBackend`] trait itself

pub mod backend;
pub mod capabilities;
pub mod handles;
pub mod program;
pub mod target;

pub use backend::{BlendMode, ClearFlags, GeometryPass, RenderBackend};
pub use capabilities::Capabilities;
pub use handles::{GeometryId, RenderTargetId, TextureId};
pub use program::{
    GeometryProgram, PostPass, ProgramLayout, ShaderProgram, TextureSlot, UniformValue, Uniforms,
};
pub use target::{Attachment, FilterMode, PixelFormat, RenderTarget2D, TextureDesc};
