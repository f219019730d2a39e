use glam::{Vec2, Vec4};

use super::EffectContext;
use crate::renderer::core::{
    BlendMode, ClearFlags, RenderTarget2D, ShaderProgram, TextureId, Uniforms,
};
use crate::scene::Camera;

/// Separable two-pass blur: horizontal into a scratch target, vertical into
/// the destination.
///
/// In edge-aware mode taps across G-buffer depth / normal discontinuities are
/// rejected, which keeps occlusion and reflections from bleeding over edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurPass {
    /// Taps per direction.
    pub kernel_size: u32,
    /// Tap spacing in pixels.
    pub blur_size: f32,
    /// Depth difference (view space, scaled) still treated as the same surface.
    pub depth_range: f32,
    pub edge_aware: bool,
}

impl BlurPass {
    #[must_use]
    pub fn gaussian(kernel_size: u32, blur_size: f32) -> Self {
        Self {
            kernel_size,
            blur_size,
            depth_range: 1.0,
            edge_aware: false,
        }
    }

    #[must_use]
    pub fn edge_aware(kernel_size: u32, blur_size: f32, depth_range: f32) -> Self {
        Self {
            kernel_size,
            blur_size,
            depth_range,
            edge_aware: true,
        }
    }

    /// Blurs `source` into `dest`, using `scratch` for the intermediate pass.
    /// Both targets are cleared to `clear` first.
    pub fn run(
        &self,
        ctx: &mut EffectContext<'_>,
        camera: &Camera,
        source: TextureId,
        scratch: &RenderTarget2D,
        dest: &RenderTarget2D,
        clear: Vec4,
    ) {
        self.direction(ctx, camera, source, scratch, Vec2::X, clear);
        self.direction(ctx, camera, scratch.texture, dest, Vec2::Y, clear);
    }

    fn direction(
        &self,
        ctx: &mut EffectContext<'_>,
        camera: &Camera,
        source: TextureId,
        target: &RenderTarget2D,
        direction: Vec2,
        clear: Vec4,
    ) {
        let mut uniforms = Uniforms::new()
            .with("t_diffuse", source)
            .with("resolution", Vec2::new(ctx.width as f32, ctx.height as f32))
            .with("direction", direction)
            .with(
                "blur",
                Vec4::new(self.kernel_size as f32, self.blur_size, self.depth_range, 0.0),
            );

        let program = if self.edge_aware {
            uniforms.insert("t_depth", ctx.gbuffer.depth_texture());
            uniforms.insert("t_normal", ctx.gbuffer.normal_glossiness_texture());
            uniforms.insert("camera_planes", Vec2::new(camera.near, camera.far));
            ShaderProgram::EdgeAwareBlur
        } else {
            ShaderProgram::Blur
        };

        ctx.backend.set_render_target(target.target);
        ctx.backend.clear(clear, ClearFlags::all());
        ctx.backend.draw_fullscreen(program, &uniforms, BlendMode::Replace);
    }
}
