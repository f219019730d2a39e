//! Screen-Space Reflections
//!
//! Rays are marched in screen space from each G-buffer position along the
//! reflected view vector. Like SSAO the traced buffer is cached until dirty:
//!
//! ```text
//! dirty:  SsrTrace(input, G-buffer) → A ─ blur H → B ─ blur V → A
//! always: input + A·intensity → output
//! ```

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
pub struct SsrSettings {
    /// Longest ray in view space (default: 200.0).
    pub max_ray_distance: f32,
    /// Pixels skipped per march step (default: 16.0).
    pub pixel_stride: f32,
    /// View depth at which the stride has shrunk to one pixel (default: 50.0).
    pub pixel_stride_z_cutoff: f32,
    /// Screen-edge distance where hits start fading (default: 0.9).
    pub screen_edge_fade_start: f32,
    /// Ray direction toward the eye where hits start fading (default: 0.99).
    pub eye_fade_start: f32,
    /// Ray direction toward the eye where hits are gone (default: 1.0).
    pub eye_fade_end: f32,
    /// Surfaces below this glossiness reflect nothing (default: 0.2).
    pub min_glossiness: f32,
    /// Assumed thickness of depth-buffer surfaces (default: 0.1).
    pub z_thickness_threshold: f32,
    /// March step limit (default: 128).
    pub max_iteration: u32,
    /// Reflection strength in the final blend (default: 1.0).
    pub intensity: f32,
    /// Blur tap spacing in pixels (default: 2.0).
    pub blur_size: f32,
}

impl Default for SsrSettings {
    fn default() -> Self {
        Self {
            max_ray_distance: 200.0,
            pixel_stride: 16.0,
            pixel_stride_z_cutoff: 50.0,
            screen_edge_fade_start: 0.9,
            eye_fade_start: 0.99,
            eye_fade_end: 1.0,
            min_glossiness: 0.2,
            z_thickness_threshold: 0.1,
            max_iteration: 128,
            intensity: 1.0,
            blur_size: 2.0,
        }
    }
}

const BLUR_KERNEL_SIZE: u32 = 13;

pub struct SsrEffect {
    pub settings: SsrSettings,
    enabled: bool,
    dirty: bool,
    scratch_a: RenderTarget2D,
    scratch_b: RenderTarget2D,
    compute_count: u64,
}

impl SsrEffect {
    pub fn new(backend: &mut dyn RenderBackend, width: u32, height: u32) -> Self {
        let format = PixelFormat::chain_color(backend.capabilities());
        let desc = TextureDesc::new(width, height, format)
            .with_filter(FilterMode::Linear)
            .with_label("SSR Scratch");
        Self {
            settings: SsrSettings::default(),
            enabled: false,
            dirty: true,
            scratch_a: RenderTarget2D::new(backend, desc),
            scratch_b: RenderTarget2D::new(backend, desc),
            compute_count: 0,
        }
    }

    /// Blurred reflection buffer; alpha holds the hit confidence.
    #[inline]
    #[must_use]
    pub fn reflection_texture(&self) -> TextureId {
        self.scratch_a.texture
    }

    #[inline]
    #[must_use]
    pub fn compute_count(&self) -> u64 {
        self.compute_count
    }

    fn compute(&mut self, ctx: &mut EffectContext<'_>, camera: &Camera, input: Option<TextureId>) {
        let s = &self.settings;
        let projection = camera.projection_matrix;
        let mut uniforms = Uniforms::new()
            .with("t_depth", ctx.gbuffer.depth_texture())
            .with("t_normal", ctx.gbuffer.normal_glossiness_texture())
            .with("resolution", Vec2::new(ctx.width as f32, ctx.height as f32))
            .with("camera_planes", Vec2::new(camera.near, camera.far))
            .with(
                "trace",
                Vec4::new(
                    s.max_ray_distance,
                    s.pixel_stride,
                    s.pixel_stride_z_cutoff,
                    s.max_iteration as f32,
                ),
            )
            .with(
                "fade",
                Vec4::new(
                    s.screen_edge_fade_start,
                    s.eye_fade_start,
                    s.eye_fade_end,
                    s.min_glossiness,
                ),
            )
            .with(
                "thickness",
                Vec4::new(s.z_thickness_threshold, ctx.frame as f32, 0.0, 0.0),
            )
            .with("projection", projection)
            .with("inverse_projection", projection.inverse())
            .with("view", camera.view_matrix());
        if let Some(input) = input {
            uniforms.insert("t_color", input);
        }

        ctx.backend.set_render_target(self.scratch_a.target);
        ctx.backend.clear(Vec4::ZERO, ClearFlags::all());
        ctx.backend
            .draw_fullscreen(ShaderProgram::SsrTrace, &uniforms, BlendMode::Replace);

        let blur = BlurPass::edge_aware(BLUR_KERNEL_SIZE, s.blur_size, 1.0);
        blur.run(
            ctx,
            camera,
            self.scratch_a.texture,
            &self.scratch_b,
            &self.scratch_a,
            Vec4::ZERO,
        );

        self.compute_count += 1;
        log::trace!("SSR recomputed (frame {})", ctx.frame);
    }
}

impl Effect for SsrEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Ssr
    }

    fn requires_gbuffer(&self) -> bool {
        true
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
        self.dirty = true;
    }

    fn dirty(&mut self) {
        self.dirty = true;
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn apply(
        &mut self,
        ctx: &mut EffectContext<'_>,
        camera: &Camera,
        input: Option<TextureId>,
        output: RenderTargetId,
    ) {
        if self.dirty {
            self.compute(ctx, camera, input);
            self.dirty = false;
        }

        let mut uniforms = Uniforms::new()
            .with("t_blend", self.scratch_a.texture)
            .with("strength", self.settings.intensity);
        if let Some(input) = input {
            uniforms.insert("t_base", input);
        }

        ctx.backend.set_render_target(output);
        ctx.backend
            .draw_fullscreen(ShaderProgram::ReflectionBlend, &uniforms, BlendMode::Replace);
    }

    fn dispose(self, backend: &mut dyn RenderBackend) {
        self.scratch_a.dispose(backend);
        self.scratch_b.dispose(backend);
    }
}
