//! Geometry Buffer
//!
//! Per-frame screen-space surface attributes consumed by the ambient
//! occlusion and reflection effects.
//!
//! # Channel Layout
//!
//! | Texture             | R          | G          | B          | A          |
//! |---------------------|------------|------------|------------|------------|
//! | normal + glossiness | n.x*.5+.5  | n.y*.5+.5  | n.z*.5+.5  | glossiness |
//! | albedo + metalness  | albedo.r   | albedo.g   | albedo.b   | metalness  |
//! | depth + stencil     | depth      |            |            |            |
//!
//! # Modes
//!
//! The fill strategy is picked lazily on the first [`GBuffer::update`] and
//! cached for the lifetime of the instance (see [`GBufferMode`]):
//!
//! - **MRT**: one pass writes normal+glossiness to color 0 and
//!   albedo+metalness to color 1.
//! - **Dual pass**: two passes into two separate targets, each individually
//!   switchable through the `enable_*` flags.

mod material;
mod strategy;

pub use material::{GBufferMaterial, Shading, has_normals};
pub use strategy::GBufferMode;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use self::strategy::{GBufferStrategy, GBufferTargets, PassToggles, create_strategy};
use crate::renderer::core::{
    Attachment, BlendMode, FilterMode, PixelFormat, RenderBackend, RenderTarget2D, ShaderProgram,
    TextureDesc, TextureId, Uniforms,
};
use crate::scene::{Camera, RenderScene};

/// Channel visualised by [`GBuffer::render_debug`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GBufferDebugView {
    #[default]
    Normal,
    Depth,
    /// World position reconstructed from depth.
    Position,
    Glossiness,
    Metalness,
    Albedo,
}

impl GBufferDebugView {
    #[inline]
    #[must_use]
    pub fn index(self) -> u32 {
        match self {
            Self::Normal => 0,
            Self::Depth => 1,
            Self::Position => 2,
            Self::Glossiness => 3,
            Self::Metalness => 4,
            Self::Albedo => 5,
        }
    }
}

pub struct GBuffer {
    targets: GBufferTargets,
    strategy: Option<Box<dyn GBufferStrategy>>,
    width: u32,
    height: u32,
    update_count: u64,

    /// Dual-pass only: render the normal + glossiness pass.
    pub enable_normal_glossiness: bool,
    /// Dual-pass only: render the albedo + metalness pass.
    pub enable_albedo_metalness: bool,
}

impl std::fmt::Debug for GBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GBuffer")
            .field("mode", &self.mode())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("update_count", &self.update_count)
            .finish_non_exhaustive()
    }
}

impl GBuffer {
    pub fn new(backend: &mut dyn RenderBackend, width: u32, height: u32) -> Self {
        let primary = RenderTarget2D::new(
            backend,
            TextureDesc::new(width, height, PixelFormat::Rgba16Float)
                .with_label("GBuffer Normal Glossiness"),
        );
        let depth = backend.create_texture(
            &TextureDesc::new(width, height, PixelFormat::Depth24PlusStencil8)
                .with_label("GBuffer Depth"),
        );
        backend.attach(primary.target, Attachment::DepthStencil, Some(depth));

        let mrt_texture = backend.create_texture(
            &TextureDesc::new(width, height, PixelFormat::Rgba8Unorm)
                .with_filter(FilterMode::Linear)
                .with_label("GBuffer Albedo Metalness (MRT)"),
        );

        let albedo = RenderTarget2D::new(
            backend,
            TextureDesc::new(width, height, PixelFormat::Rgba8Unorm)
                .with_filter(FilterMode::Linear)
                .with_label("GBuffer Albedo Metalness"),
        );
        let albedo_depth = backend.create_texture(
            &TextureDesc::new(width, height, PixelFormat::Depth24PlusStencil8)
                .with_label("GBuffer Albedo Depth"),
        );
        backend.attach(albedo.target, Attachment::DepthStencil, Some(albedo_depth));

        Self {
            targets: GBufferTargets {
                primary,
                depth,
                mrt_texture,
                albedo,
                albedo_depth,
            },
            strategy: None,
            width,
            height,
            update_count: 0,
            enable_normal_glossiness: true,
            enable_albedo_metalness: true,
        }
    }

    /// Regenerates the enabled G-buffer textures from the scene's current
    /// render list. The first call resolves and caches the fill strategy.
    pub fn update(
        &mut self,
        backend: &mut dyn RenderBackend,
        scene: &dyn RenderScene,
        camera: &Camera,
    ) {
        if self.strategy.is_none() {
            let capabilities = *backend.capabilities();
            let mode = GBufferMode::resolve(&capabilities);
            let strategy = create_strategy(mode, &capabilities);
            strategy.configure(backend, &self.targets);
            log::info!("G-buffer mode resolved: {mode:?}");
            self.strategy = Some(strategy);
        }

        let Some(strategy) = self.strategy.as_deref() else {
            return;
        };

        strategy.render(
            backend,
            &self.targets,
            scene.render_list(),
            camera,
            PassToggles {
                normal_glossiness: self.enable_normal_glossiness,
                albedo_metalness: self.enable_albedo_metalness,
            },
        );
        self.update_count += 1;
    }

    /// Visualises one G-buffer channel into the backend's current target.
    pub fn render_debug(
        &self,
        backend: &mut dyn RenderBackend,
        camera: &Camera,
        view: GBufferDebugView,
    ) {
        let uniforms = Uniforms::new()
            .with("t_normal", self.normal_glossiness_texture())
            .with("t_depth", self.depth_texture())
            .with("t_albedo", self.albedo_metalness_texture())
            .with("view", view.index() as f32)
            .with("camera_planes", Vec2::new(camera.near, camera.far))
            .with("inverse_view_projection", camera.view_projection().inverse());
        backend.draw_fullscreen(ShaderProgram::GBufferDebug, &uniforms, BlendMode::Replace);
    }

    pub fn resize(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.targets.primary.resize(backend, width, height);
        self.targets.albedo.resize(backend, width, height);

        // Not reached through the primary target until MRT is selected.
        if backend.attachment(self.targets.primary.target, Attachment::Color(1))
            != Some(self.targets.mrt_texture)
        {
            backend.resize_texture(self.targets.mrt_texture, width, height);
        }
    }

    #[inline]
    #[must_use]
    pub fn normal_glossiness_texture(&self) -> TextureId {
        self.targets.primary.texture
    }

    #[inline]
    #[must_use]
    pub fn depth_texture(&self) -> TextureId {
        self.targets.depth
    }

    /// The MRT attachment or the dual-pass target texture, depending on mode.
    /// Before the first update this is the dual-pass texture.
    #[must_use]
    pub fn albedo_metalness_texture(&self) -> TextureId {
        match &self.strategy {
            Some(strategy) => strategy.albedo_metalness_texture(&self.targets),
            None => self.targets.albedo.texture,
        }
    }

    /// `None` until the first [`update`](Self::update).
    #[must_use]
    pub fn mode(&self) -> Option<GBufferMode> {
        self.strategy.as_ref().map(|s| s.mode())
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of completed [`update`](Self::update) calls.
    #[inline]
    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn dispose(self, backend: &mut dyn RenderBackend) {
        let targets = self.targets;
        targets.primary.dispose(backend);
        targets.albedo.dispose(backend);
        backend.dispose_texture(targets.depth);
        backend.dispose_texture(targets.mrt_texture);
        backend.dispose_texture(targets.albedo_depth);
    }
}
