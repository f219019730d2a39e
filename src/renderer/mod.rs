//! Rendering System
//!
//! - [`core`]: the [`RenderBackend`](core::RenderBackend) abstraction, handles and programs
//! - [`gbuffer`]: per-frame geometry buffer
//! - [`effects`]: the screen-space effect chain
//! - [`super_sampling`]: jittered temporal accumulation
//! - [`advanced`]: the frame orchestrator tying it all together
//! - [`wgpu_backend`]: the shipped `wgpu` implementation of the backend

pub mod advanced;
pub mod core;
pub mod effects;
pub mod gbuffer;
pub mod ping_pong;
pub mod settings;
pub mod super_sampling;
pub mod wgpu_backend;

pub use advanced::{AdvancedRenderer, FrameStats};
