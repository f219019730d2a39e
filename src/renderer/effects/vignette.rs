use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::{Effect, EffectContext, EffectKind};
use crate::renderer::core::{
    BlendMode, RenderBackend, RenderTargetId, ShaderProgram, TextureId, Uniforms,
};
use crate::scene::Camera;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VignetteSettings {
    /// Radius where darkening starts (default: 1.0).
    pub offset: f32,
    /// Darkening strength at the corners (default: 1.0).
    pub darkness: f32,
}

impl Default for VignetteSettings {
    fn default() -> Self {
        Self {
            offset: 1.0,
            darkness: 1.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct VignetteEffect {
    pub settings: VignetteSettings,
    enabled: bool,
}

impl VignetteEffect {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Effect for VignetteEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Vignette
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn resize(&mut self, _backend: &mut dyn RenderBackend, _width: u32, _height: u32) {}

    fn apply(
        &mut self,
        ctx: &mut EffectContext<'_>,
        _camera: &Camera,
        input: Option<TextureId>,
        output: RenderTargetId,
    ) {
        let mut uniforms = Uniforms::new().with(
            "vignette",
            Vec2::new(self.settings.offset, self.settings.darkness),
        );
        if let Some(input) = input {
            uniforms.insert("t_diffuse", input);
        }
        ctx.backend.set_render_target(output);
        ctx.backend
            .draw_fullscreen(ShaderProgram::Vignette, &uniforms, BlendMode::Replace);
    }

    fn dispose(self, _backend: &mut dyn RenderBackend) {}
}
