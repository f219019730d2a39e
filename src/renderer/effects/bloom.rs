use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};

use super::{BlurPass, Effect, EffectContext, EffectKind};
use crate::renderer::core::{
    BlendMode, ClearFlags, FilterMode, PixelFormat, RenderBackend, RenderTarget2D,
    RenderTargetId, ShaderProgram, TextureDesc, TextureId, Uniforms,
};
use crate::scene::Camera;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    /// Luminance above which pixels bloom (default: 0.7).
    pub threshold: f32,
    /// Soft knee width around the threshold (default: 0.01).
    pub smooth_width: f32,
    /// Additive strength of the blurred highlights (default: 0.5).
    pub strength: f32,
    /// Blur tap spacing in pixels (default: 2.0).
    pub blur_size: f32,
    /// Blur taps per direction (default: 13).
    pub kernel_size: u32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            smooth_width: 0.01,
            strength: 0.5,
            blur_size: 2.0,
            kernel_size: 13,
        }
    }
}

/// Bright pass → separable blur → additive composite. Recomputed every frame.
pub struct BloomEffect {
    pub settings: BloomSettings,
    enabled: bool,
    scratch_a: RenderTarget2D,
    scratch_b: RenderTarget2D,
}

impl BloomEffect {
    pub fn new(backend: &mut dyn RenderBackend, width: u32, height: u32) -> Self {
        let format = PixelFormat::chain_color(backend.capabilities());
        let desc = TextureDesc::new(width, height, format)
            .with_filter(FilterMode::Linear)
            .with_label("Bloom Scratch");
        Self {
            settings: BloomSettings::default(),
            enabled: false,
            scratch_a: RenderTarget2D::new(backend, desc),
            scratch_b: RenderTarget2D::new(backend, desc),
        }
    }
}

impl Effect for BloomEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Bloom
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn resize(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) {
        self.scratch_a.resize(backend, width, height);
        self.scratch_b.resize(backend, width, height);
    }

    fn apply(
        &mut self,
        ctx: &mut EffectContext<'_>,
        camera: &Camera,
        input: Option<TextureId>,
        output: RenderTargetId,
    ) {
        let s = &self.settings;

        let mut bright = Uniforms::new().with("threshold", Vec2::new(s.threshold, s.smooth_width));
        if let Some(input) = input {
            bright.insert("t_diffuse", input);
        }
        ctx.backend.set_render_target(self.scratch_a.target);
        ctx.backend.clear(Vec4::ZERO, ClearFlags::COLOR);
        ctx.backend
            .draw_fullscreen(ShaderProgram::BloomBright, &bright, BlendMode::Replace);

        BlurPass::gaussian(s.kernel_size, s.blur_size).run(
            ctx,
            camera,
            self.scratch_a.texture,
            &self.scratch_b,
            &self.scratch_a,
            Vec4::ZERO,
        );

        let mut composite = Uniforms::new()
            .with("t_blend", self.scratch_a.texture)
            .with("strength", s.strength);
        if let Some(input) = input {
            composite.insert("t_base", input);
        }
        ctx.backend.set_render_target(output);
        ctx.backend
            .draw_fullscreen(ShaderProgram::AdditiveBlend, &composite, BlendMode::Replace);
    }

    fn dispose(self, backend: &mut dyn RenderBackend) {
        self.scratch_a.dispose(backend);
        self.scratch_b.dispose(backend);
    }
}
