//! G-buffer fill strategies, chosen once from the backend capabilities.

use glam::Vec4;

use super::material::{GBufferMaterial, has_normals};
use crate::renderer::core::{
    Attachment, Capabilities, ClearFlags, GeometryPass, GeometryProgram, PixelFormat,
    RenderBackend, RenderTarget2D, TextureId,
};
use crate::scene::{Camera, RenderList};

/// How the G-buffer is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GBufferMode {
    /// One geometry pass writing two color attachments.
    Mrt {
        /// Normal + glossiness stored as 32-bit float.
        float: bool,
    },
    /// Separate normal + glossiness and albedo + metalness passes.
    DualPass {
        /// Normal + glossiness stored as 16-bit float.
        float: bool,
    },
}

impl GBufferMode {
    #[must_use]
    pub fn resolve(capabilities: &Capabilities) -> Self {
        let float = capabilities.float_color_attachments;
        if capabilities.multiple_render_targets {
            Self::Mrt { float }
        } else {
            Self::DualPass { float }
        }
    }

    /// Storage format of the normal + glossiness texture in this mode.
    #[must_use]
    pub fn normal_glossiness_format(self) -> PixelFormat {
        match self {
            Self::Mrt { float: true } => PixelFormat::Rgba32Float,
            Self::DualPass { float: true } => PixelFormat::Rgba16Float,
            Self::Mrt { float: false } | Self::DualPass { float: false } => {
                PixelFormat::Rgba8Unorm
            }
        }
    }
}

/// Handles of every texture and target the G-buffer owns.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GBufferTargets {
    /// Normal + glossiness at color 0, depth/stencil attached.
    pub primary: RenderTarget2D,
    pub depth: TextureId,
    /// Albedo + metalness for the MRT path, attached at color 1 once selected.
    pub mrt_texture: TextureId,
    /// Albedo + metalness target for the dual-pass path.
    pub albedo: RenderTarget2D,
    pub albedo_depth: TextureId,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PassToggles {
    pub normal_glossiness: bool,
    pub albedo_metalness: bool,
}

pub(crate) trait GBufferStrategy: std::fmt::Debug {
    fn mode(&self) -> GBufferMode;

    /// One-time reconfiguration of the targets for this strategy.
    fn configure(&self, backend: &mut dyn RenderBackend, targets: &GBufferTargets);

    fn albedo_metalness_texture(&self, targets: &GBufferTargets) -> TextureId;

    fn render(
        &self,
        backend: &mut dyn RenderBackend,
        targets: &GBufferTargets,
        list: &RenderList,
        camera: &Camera,
        toggles: PassToggles,
    );
}

pub(crate) fn create_strategy(
    mode: GBufferMode,
    capabilities: &Capabilities,
) -> Box<dyn GBufferStrategy> {
    match mode {
        GBufferMode::Mrt { float } => Box::new(MrtStrategy {
            float,
            depth_format: if capabilities.depth32_stencil8 {
                PixelFormat::Depth32FloatStencil8
            } else {
                PixelFormat::Depth24PlusStencil8
            },
        }),
        GBufferMode::DualPass { float } => Box::new(DualPassStrategy { float }),
    }
}

fn geometry_pass(
    backend: &mut dyn RenderBackend,
    program: GeometryProgram,
    list: &RenderList,
    camera: &Camera,
) {
    backend.clear(Vec4::ZERO, ClearFlags::all());
    backend.draw_renderables(&GeometryPass {
        program,
        renderables: &list.opaque,
        camera,
        material: &GBufferMaterial::from_renderable,
        visible: Some(&has_normals),
    });
}

// ============================================================================
// MRT
// ============================================================================

#[derive(Debug)]
struct MrtStrategy {
    float: bool,
    depth_format: PixelFormat,
}

impl GBufferStrategy for MrtStrategy {
    fn mode(&self) -> GBufferMode {
        GBufferMode::Mrt { float: self.float }
    }

    fn configure(&self, backend: &mut dyn RenderBackend, targets: &GBufferTargets) {
        backend.set_texture_format(targets.primary.texture, self.mode().normal_glossiness_format());
        backend.set_texture_format(targets.depth, self.depth_format);
        backend.attach(
            targets.primary.target,
            Attachment::Color(1),
            Some(targets.mrt_texture),
        );
    }

    fn albedo_metalness_texture(&self, targets: &GBufferTargets) -> TextureId {
        targets.mrt_texture
    }

    // Both outputs come from one pass, so the per-pass toggles do not apply.
    fn render(
        &self,
        backend: &mut dyn RenderBackend,
        targets: &GBufferTargets,
        list: &RenderList,
        camera: &Camera,
        _toggles: PassToggles,
    ) {
        backend.set_render_target(targets.primary.target);
        geometry_pass(backend, GeometryProgram::GBufferMrt, list, camera);
    }
}

// ============================================================================
// Dual pass
// ============================================================================

#[derive(Debug)]
struct DualPassStrategy {
    float: bool,
}

impl GBufferStrategy for DualPassStrategy {
    fn mode(&self) -> GBufferMode {
        GBufferMode::DualPass { float: self.float }
    }

    fn configure(&self, backend: &mut dyn RenderBackend, targets: &GBufferTargets) {
        let format = self.mode().normal_glossiness_format();
        if backend
            .texture_desc(targets.primary.texture)
            .is_some_and(|desc| desc.format != format)
        {
            backend.set_texture_format(targets.primary.texture, format);
        }
    }

    fn albedo_metalness_texture(&self, targets: &GBufferTargets) -> TextureId {
        targets.albedo.texture
    }

    fn render(
        &self,
        backend: &mut dyn RenderBackend,
        targets: &GBufferTargets,
        list: &RenderList,
        camera: &Camera,
        toggles: PassToggles,
    ) {
        if toggles.normal_glossiness {
            backend.set_render_target(targets.primary.target);
            geometry_pass(backend, GeometryProgram::GBufferNormalGlossiness, list, camera);
        }

        if toggles.albedo_metalness {
            backend.set_render_target(targets.albedo.target);
            geometry_pass(backend, GeometryProgram::GBufferAlbedoMetalness, list, camera);
        }
    }
}
