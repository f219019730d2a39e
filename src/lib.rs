//! # Myth PostFX
//!
//! A real-time screen-space post-processing pipeline built on top of a
//! deferred-style geometry buffer.
//!
//! Given a scene and a camera, [`AdvancedRenderer`] produces one final image
//! per frame:
//!
//! ```text
//! Scene + Camera
//!    │
//!    ├──► GBuffer (only when AO / SSR are enabled)
//!    ├──► MSAA scene render ──► resolve
//!    ├──► Effect chain (SSAO → SSR → Bloom → ToneMapping → Background → Vignette)
//!    ├──► SuperSampling (jittered temporal accumulation)
//!    └──► FXAA / Copy ──► back target
//! ```
//!
//! The GPU is reached exclusively through the [`RenderBackend`] trait.
//! [`WgpuBackend`] is the shipped implementation.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod renderer;
pub mod scene;

pub use errors::{PostFxError, Result};
pub use renderer::core::{
    Attachment, Capabilities, ClearFlags, FilterMode, GeometryId, PixelFormat, RenderBackend,
    RenderTarget2D, RenderTargetId, TextureDesc, TextureId,
};
pub use renderer::effects::{Background, Effect, EffectKind};
pub use renderer::gbuffer::{GBuffer, GBufferDebugView, GBufferMode};
pub use renderer::settings::{RenderPath, RendererConfig};
pub use renderer::super_sampling::SuperSampling;
pub use renderer::wgpu_backend::{BackendSettings, WgpuBackend};
pub use renderer::{AdvancedRenderer, FrameStats};
pub use scene::{Camera, Light, MeshData, Renderable, RenderList, RenderScene, Scene, SurfaceMaterial};
