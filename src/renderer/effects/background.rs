use glam::{Vec2, Vec4};

use super::{Effect, EffectContext, EffectKind};
use crate::renderer::core::{
    BlendMode, RenderBackend, RenderTargetId, ShaderProgram, TextureId, Uniforms,
};
use crate::scene::Camera;

/// What is drawn behind the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    /// Straight (non-premultiplied) RGBA.
    Color(Vec4),
    /// Stretched over the whole viewport.
    Texture(TextureId),
}

impl Default for Background {
    fn default() -> Self {
        Self::Color(Vec4::new(0.0, 0.0, 0.0, 1.0))
    }
}

/// Composites the chain input over a background by the input's alpha.
///
/// Without an input (forward fallback path) it draws the background alone.
/// With no background set the input passes through unchanged. This is the
/// only effect enabled by default.
#[derive(Debug)]
pub struct BackgroundEffect {
    background: Option<Background>,
    enabled: bool,
}

impl Default for BackgroundEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundEffect {
    #[must_use]
    pub fn new() -> Self {
        Self {
            background: Some(Background::default()),
            enabled: true,
        }
    }

    pub fn set(&mut self, background: Background) {
        self.background = Some(background);
    }

    pub fn clear(&mut self) {
        self.background = None;
    }

    #[inline]
    #[must_use]
    pub fn background(&self) -> Option<&Background> {
        self.background.as_ref()
    }
}

impl Effect for BackgroundEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Background
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
        let mut uniforms = Uniforms::new();
        let mut has_texture = 0.0;
        match self.background {
            Some(Background::Color(color)) => uniforms.insert("color", color),
            Some(Background::Texture(texture)) => {
                uniforms.insert("t_background", texture);
                uniforms.insert("color", Vec4::ONE);
                has_texture = 1.0;
            }
            None => uniforms.insert("color", Vec4::ZERO),
        }
        let has_input = if let Some(input) = input {
            uniforms.insert("t_diffuse", input);
            1.0
        } else {
            0.0
        };
        uniforms.insert("flags", Vec2::new(has_input, has_texture));

        ctx.backend.set_render_target(output);
        ctx.backend
            .draw_fullscreen(ShaderProgram::Background, &uniforms, BlendMode::Replace);
    }

    fn dispose(self, _backend: &mut dyn RenderBackend) {}
}
