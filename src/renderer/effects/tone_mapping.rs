use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::{Effect, EffectContext, EffectKind};
use crate::renderer::core::{
    BlendMode, RenderBackend, RenderTargetId, ShaderProgram, TextureId, Uniforms,
};
use crate::scene::Camera;

/// Tone mapping operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ToneMappingMode {
    /// Exposure scale only, clamped to `[0, 1]`.
    Linear,
    /// `x / (1 + x)`
    Reinhard,
    /// Narkowicz ACES filmic fit.
    #[default]
    ACESFilmic,
}

impl ToneMappingMode {
    #[inline]
    #[must_use]
    pub fn index(self) -> u32 {
        match self {
            Self::Linear => 0,
            Self::Reinhard => 1,
            Self::ACESFilmic => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneMappingSettings {
    /// Default: `ACESFilmic`.
    pub mode: ToneMappingMode,
    /// Linear pre-scale (default: 1.0).
    pub exposure: f32,
}

impl Default for ToneMappingSettings {
    fn default() -> Self {
        Self {
            mode: ToneMappingMode::default(),
            exposure: 1.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct ToneMappingEffect {
    pub settings: ToneMappingSettings,
    enabled: bool,
}

impl ToneMappingEffect {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Effect for ToneMappingEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::ToneMapping
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
            "tone",
            Vec2::new(self.settings.mode.index() as f32, self.settings.exposure),
        );
        if let Some(input) = input {
            uniforms.insert("t_diffuse", input);
        }
        ctx.backend.set_render_target(output);
        ctx.backend
            .draw_fullscreen(ShaderProgram::ToneMapping, &uniforms, BlendMode::Replace);
    }

    fn dispose(self, _backend: &mut dyn RenderBackend) {}
}
