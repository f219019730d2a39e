use bitflags::bitflags;
use glam::Vec4;

use super::{
    Attachment, Capabilities, GeometryProgram, PixelFormat, RenderTargetId, ShaderProgram,
    TextureDesc, TextureId, Uniforms,
};
use crate::renderer::gbuffer::GBufferMaterial;
use crate::scene::{Camera, GeometryRef, MeshData, RenderScene, Renderable};

bitflags! {
    /// Which aspects of the current target [`RenderBackend::clear`] resets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
        const DEPTH_STENCIL = Self::DEPTH.bits() | Self::STENCIL.bits();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Output overwrites the target.
    #[default]
    Replace,
    /// Standard `src.a` over blending.
    Alpha,
}

/// Per-material callback of a geometry pass.
pub type MaterialFn<'a> = dyn Fn(&Renderable) -> GBufferMaterial + 'a;
/// Visibility predicate of a geometry pass.
pub type VisibilityFn<'a> = dyn Fn(&Renderable) -> bool + 'a;

/// One draw of a renderable list with a geometry program.
///
/// The material callback produces an immutable parameter block per renderable.
/// Renderables rejected by `visible` are skipped entirely.
pub struct GeometryPass<'a> {
    pub program: GeometryProgram,
    pub renderables: &'a [Renderable],
    pub camera: &'a Camera,
    pub material: &'a MaterialFn<'a>,
    pub visible: Option<&'a VisibilityFn<'a>>,
}

impl GeometryPass<'_> {
    /// Renderables that pass the visibility predicate, with their parameters.
    pub fn draws(&self) -> impl Iterator<Item = (&Renderable, GBufferMaterial)> + '_ {
        self.renderables
            .iter()
            .filter(|r| self.visible.is_none_or(|visible| visible(r)))
            .map(|r| (r, (self.material)(r)))
    }
}

/// The GPU as seen by the pipeline.
///
/// Commands are recorded against the current render target (see
/// [`set_render_target`](Self::set_render_target)) and are guaranteed to be
/// executed by the time [`flush`](Self::flush) returns. Clears are lazy: they
/// apply to the next command that touches the target.
///
/// Render targets do not own their attachments: disposing a target leaves its
/// textures alive, and resizing a target resizes every attached texture.
pub trait RenderBackend {
    fn capabilities(&self) -> &Capabilities;

    // ---- Textures ----

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId;
    /// Uploads tightly packed texel data covering the whole texture.
    fn write_texture(&mut self, texture: TextureId, data: &[u8]);
    /// Reallocates the texture storage with a new format. Contents are lost.
    fn set_texture_format(&mut self, texture: TextureId, format: PixelFormat);
    fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc>;
    /// Reallocates the texture storage at a new size. Contents are lost.
    fn resize_texture(&mut self, texture: TextureId, width: u32, height: u32);
    fn dispose_texture(&mut self, texture: TextureId);

    // ---- Render targets ----

    fn create_render_target(&mut self, width: u32, height: u32, label: &'static str)
    -> RenderTargetId;
    /// Creates the presentable target with an 8-bit color and a depth/stencil
    /// attachment owned by the backend.
    fn create_screen_target(&mut self, width: u32, height: u32) -> RenderTargetId;
    /// Attaches `texture` at `attachment`, or detaches with `None`.
    fn attach(&mut self, target: RenderTargetId, attachment: Attachment, texture: Option<TextureId>);
    fn attachment(&self, target: RenderTargetId, attachment: Attachment) -> Option<TextureId>;
    fn resize_render_target(&mut self, target: RenderTargetId, width: u32, height: u32);
    fn render_target_size(&self, target: RenderTargetId) -> Option<(u32, u32)>;
    fn dispose_render_target(&mut self, target: RenderTargetId);

    // ---- Geometry ----

    fn create_geometry(&mut self, mesh: &MeshData) -> GeometryRef;

    // ---- Commands ----

    fn set_render_target(&mut self, target: RenderTargetId);
    fn current_render_target(&self) -> Option<RenderTargetId>;
    fn clear(&mut self, color: Vec4, flags: ClearFlags);
    fn draw_fullscreen(&mut self, program: ShaderProgram, uniforms: &Uniforms, blend: BlendMode);
    fn draw_renderables(&mut self, pass: &GeometryPass<'_>);
    /// Forward-shades the scene's render list (opaque, then transparent) with
    /// its lights into the current target.
    fn render_scene(&mut self, scene: &dyn RenderScene, camera: &Camera);
    /// Copies (resolving multisampled sources) color 0 of `src` into color 0 of `dst`.
    fn blit(&mut self, src: RenderTargetId, dst: RenderTargetId);
    fn flush(&mut self);
}
