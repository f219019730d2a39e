//! Screen-Space Ambient Occlusion
//!
//! Hemisphere sampling around each G-buffer position, blurred with an
//! edge-aware separable filter and multiplied onto the scene color.
//!
//! The occlusion buffer is expensive and view-dependent, so it is computed only
//! while the effect is dirty and reused until the next [`Effect::dirty`]:
//!
//! ```text
//! dirty:  Ssao → A (cleared white) ─ blur H → B ─ blur V → A
//! always: input × A → output
//! ```

use glam::{Vec2, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{BlurPass, Effect, EffectContext, EffectKind};
use crate::renderer::core::{
    BlendMode, ClearFlags, FilterMode, PixelFormat, RenderBackend, RenderTarget2D,
    RenderTargetId, ShaderProgram, TextureDesc, TextureId, Uniforms,
};
use crate::scene::Camera;

/// SSAO tunables. Changes take effect on the next recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsaoSettings {
    /// Hemisphere samples per pixel (default: 32).
    pub kernel_size: u32,
    /// Side length of the rotation noise texture (default: 256).
    pub noise_size: u32,
    /// Occlusion multiplier (default: 1.0).
    pub intensity: f32,
    /// Occlusion exponent (default: 1.0).
    pub power: f32,
    /// Depth bias against self-occlusion (default: 0.2).
    pub bias: f32,
    /// Sampling radius in view space (default: 10.0).
    pub radius: f32,
    /// Blur taps per direction (default: 13).
    pub blur_kernel_size: u32,
    /// Blur tap spacing in pixels (default: 2.0).
    pub blur_size: f32,
    /// Depth tolerance of the edge-aware blur (default: 1.0).
    pub depth_range: f32,
}

impl Default for SsaoSettings {
    fn default() -> Self {
        Self {
            kernel_size: 32,
            noise_size: 256,
            intensity: 1.0,
            power: 1.0,
            bias: 0.2,
            radius: 10.0,
            blur_kernel_size: 13,
            blur_size: 2.0,
            depth_range: 1.0,
        }
    }
}

pub struct SsaoEffect {
    pub settings: SsaoSettings,
    enabled: bool,
    dirty: bool,
    scratch_a: RenderTarget2D,
    scratch_b: RenderTarget2D,
    noise: TextureId,
    noise_size: u32,
    kernel: TextureId,
    kernel_size: u32,
    compute_count: u64,
}

impl SsaoEffect {
    pub fn new(backend: &mut dyn RenderBackend, width: u32, height: u32) -> Self {
        let settings = SsaoSettings::default();
        let desc = TextureDesc::new(width, height, PixelFormat::Rgba8Unorm)
            .with_filter(FilterMode::Linear)
            .with_label("SSAO Scratch");
        let scratch_a = RenderTarget2D::new(backend, desc);
        let scratch_b = RenderTarget2D::new(backend, desc);

        let noise_size = settings.noise_size.max(1);
        let noise = backend.create_texture(
            &TextureDesc::new(noise_size, noise_size, PixelFormat::Rgba8Unorm)
                .with_label("SSAO Noise"),
        );
        backend.write_texture(noise, bytemuck::cast_slice(&generate_noise(noise_size)));

        let kernel_size = settings.kernel_size.max(1);
        let kernel = backend.create_texture(
            &TextureDesc::new(kernel_size, 1, PixelFormat::Rgba32Float).with_label("SSAO Kernel"),
        );

        Self {
            settings,
            enabled: false,
            dirty: true,
            scratch_a,
            scratch_b,
            noise,
            noise_size,
            kernel,
            kernel_size,
            compute_count: 0,
        }
    }

    /// Blurred occlusion buffer (white = unoccluded).
    #[inline]
    #[must_use]
    pub fn occlusion_texture(&self) -> TextureId {
        self.scratch_a.texture
    }

    /// Number of times the occlusion buffer has been recomputed.
    #[inline]
    #[must_use]
    pub fn compute_count(&self) -> u64 {
        self.compute_count
    }

    fn sync_resources(&mut self, backend: &mut dyn RenderBackend, frame: u32) {
        let noise_size = self.settings.noise_size.max(1);
        if noise_size != self.noise_size {
            backend.resize_texture(self.noise, noise_size, noise_size);
            backend.write_texture(self.noise, bytemuck::cast_slice(&generate_noise(noise_size)));
            self.noise_size = noise_size;
        }

        let kernel_size = self.settings.kernel_size.max(1);
        if kernel_size != self.kernel_size {
            backend.resize_texture(self.kernel, kernel_size, 1);
            self.kernel_size = kernel_size;
        }
        let kernel = generate_kernel(kernel_size, u64::from(frame));
        backend.write_texture(self.kernel, bytemuck::cast_slice(&kernel));
    }

    fn compute(&mut self, ctx: &mut EffectContext<'_>, camera: &Camera) {
        self.sync_resources(ctx.backend, ctx.frame);

        let s = &self.settings;
        let projection = camera.projection_matrix;
        let uniforms = Uniforms::new()
            .with("t_depth", ctx.gbuffer.depth_texture())
            .with("t_normal", ctx.gbuffer.normal_glossiness_texture())
            .with("t_noise", self.noise)
            .with("t_kernel", self.kernel)
            .with("resolution", Vec2::new(ctx.width as f32, ctx.height as f32))
            .with("camera_planes", Vec2::new(camera.near, camera.far))
            .with(
                "kernel",
                Vec4::new(self.kernel_size as f32, s.radius, s.bias, 0.0),
            )
            .with(
                "occlusion",
                Vec4::new(s.intensity, s.power, self.noise_size as f32, 0.0),
            )
            .with("projection", projection)
            .with("inverse_projection", projection.inverse())
            .with("view_inverse_transpose", camera.world_matrix.transpose());

        ctx.backend.set_render_target(self.scratch_a.target);
        ctx.backend.clear(Vec4::ONE, ClearFlags::all());
        ctx.backend
            .draw_fullscreen(ShaderProgram::Ssao, &uniforms, BlendMode::Replace);

        let blur = BlurPass::edge_aware(s.blur_kernel_size, s.blur_size, s.depth_range);
        blur.run(
            ctx,
            camera,
            self.scratch_a.texture,
            &self.scratch_b,
            &self.scratch_a,
            Vec4::ONE,
        );

        self.compute_count += 1;
        log::trace!("SSAO recomputed (frame {})", ctx.frame);
    }
}

impl Effect for SsaoEffect {
    fn kind(&self) -> EffectKind {
        EffectKind::Ssao
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
            self.compute(ctx, camera);
            self.dirty = false;
        }

        let mut uniforms = Uniforms::new()
            .with("t_blend", self.scratch_a.texture)
            .with("strength", 1.0);
        if let Some(input) = input {
            uniforms.insert("t_base", input);
        }

        ctx.backend.set_render_target(output);
        ctx.backend
            .draw_fullscreen(ShaderProgram::MultiplyBlend, &uniforms, BlendMode::Replace);
    }

    fn dispose(self, backend: &mut dyn RenderBackend) {
        self.scratch_a.dispose(backend);
        self.scratch_b.dispose(backend);
        backend.dispose_texture(self.noise);
        backend.dispose_texture(self.kernel);
    }
}

// ============================================================================
// Sample generation
// ============================================================================

/// Hemisphere kernel (+Z up) with samples concentrated near the origin.
///
/// The seed varies per temporal sample so that accumulated frames average
/// over different sample sets.
#[must_use]
pub fn generate_kernel(samples: u32, seed: u64) -> Vec<Vec4> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..samples)
        .map(|i| {
            let direction = Vec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(0.01..1.0),
            )
            .normalize();
            let t = i as f32 / samples as f32;
            let scale = 0.1 + 0.9 * t * t;
            (direction * rng.random_range(0.0..1.0f32) * scale).extend(0.0)
        })
        .collect()
}

/// `size * size` RGBA8 texels encoding random XY rotation vectors.
#[must_use]
pub fn generate_noise(size: u32) -> Vec<[u8; 4]> {
    let mut rng = StdRng::seed_from_u64(12345);
    (0..size * size)
        .map(|_| {
            let xy = Vec2::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0))
                .normalize_or(Vec2::X);
            [
                ((xy.x * 0.5 + 0.5) * 255.0) as u8,
                ((xy.y * 0.5 + 0.5) * 255.0) as u8,
                0,
                255,
            ]
        })
        .collect()
}
