//! Frame Orchestrator
//!
//! [`AdvancedRenderer`] owns every render target, the G-buffer, the effect
//! stack and the temporal accumulator, and decides the per-frame control flow.
//!
//! # High-fidelity path
//!
//! ```text
//! ┌─ accumulation running ─────────────────────────────────────────────┐
//! │ save projection → jitter                                           │
//! │ [G-buffer] → MSAA scene → blit → ping-pong effect chain            │
//! │ restore projection → SuperSampling::sample                         │
//! └────────────────────────────────────────────────────────────────────┘
//! ┌─ accumulation converged ─┐
//! │ SuperSampling::output    │    (no scene work at all)
//! └──────────────────────────┘
//!                 ↓
//!   FXAA or Copy → back target → flush
//! ```
//!
//! # Basic forward path
//!
//! Background (no input) → back target, clear depth/stencil, forward render.

use glam::{Mat4, Vec2, Vec4};

use super::core::{
    Attachment, BlendMode, ClearFlags, FilterMode, PixelFormat, PostPass, RenderBackend,
    RenderTarget2D, RenderTargetId, ShaderProgram, TextureDesc, TextureId,
};
use super::effects::{Background, Effect, EffectContext, EffectKind, EffectStack};
use super::gbuffer::{GBuffer, GBufferDebugView};
use super::ping_pong::PingPong;
use super::settings::{RenderPath, RendererConfig};
use super::super_sampling::SuperSampling;
use crate::errors::{PostFxError, Result};
use crate::scene::{Camera, RenderScene};

/// What the last [`AdvancedRenderer::render`] call did.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStats {
    pub path: RenderPath,
    pub gbuffer_updated: bool,
    /// The scene was rasterized this frame (false once accumulation converged).
    pub scene_rendered: bool,
    /// Effects applied, in execution order.
    pub effects: Vec<EffectKind>,
    /// Samples in the accumulation buffer after this frame.
    pub accumulated_samples: u32,
    pub converged: bool,
    /// `Fxaa` or `Copy` on the high-fidelity path.
    pub final_pass: Option<ShaderProgram>,
}

impl FrameStats {
    fn new(path: RenderPath) -> Self {
        Self {
            path,
            gbuffer_updated: false,
            scene_rendered: false,
            effects: Vec::new(),
            accumulated_samples: 0,
            converged: false,
            final_pass: None,
        }
    }
}

/// Per-frame working values owned by the orchestrator.
#[derive(Debug, Clone, Copy)]
struct FrameScratch {
    saved_projection: Mat4,
}

/// Inputs whose change between frames invalidates the accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InvalidationKey {
    enabled_effects: u8,
    taa: bool,
    taa_samples: u32,
}

impl InvalidationKey {
    fn capture(config: &RendererConfig, effects: &EffectStack) -> Self {
        Self {
            enabled_effects: effects.enabled_mask(),
            taa: config.taa,
            taa_samples: config.taa_samples,
        }
    }
}

/// Multisampled scene target with its own color and depth storage.
#[derive(Debug, Clone, Copy)]
struct SampleTarget {
    target: RenderTargetId,
    color: TextureId,
    depth: TextureId,
}

pub struct AdvancedRenderer<B: RenderBackend> {
    backend: B,
    config: RendererConfig,
    path: RenderPath,
    width: u32,
    height: u32,

    sample_target: SampleTarget,
    ping_pong: PingPong<RenderTarget2D>,
    back_target: RenderTargetId,

    gbuffer: GBuffer,
    super_sampling: SuperSampling,
    effects: EffectStack,

    copy_pass: PostPass,
    fxaa_pass: PostPass,

    scratch: FrameScratch,
    last_key: InvalidationKey,
    last_frame: FrameStats,
}

impl<B: RenderBackend> AdvancedRenderer<B> {
    pub fn new(mut backend: B, width: u32, height: u32, config: RendererConfig) -> Result<Self> {
        let capabilities = *backend.capabilities();
        if capabilities.version == 0 {
            return Err(PostFxError::UnsupportedContext {
                version: capabilities.version,
            });
        }
        if width == 0 || height == 0 {
            return Err(PostFxError::InvalidResolution { width, height });
        }

        let path = RenderPath::resolve(&capabilities);
        log::info!("Graphics API version: {}", capabilities.version);
        log::info!("Render path: {path:?}");

        let color_format = PixelFormat::chain_color(&capabilities);
        let samples = capabilities.msaa_samples(config.max_msaa_samples);

        let sample_target = {
            let color = backend.create_texture(
                &TextureDesc::new(width, height, color_format)
                    .with_samples(samples)
                    .with_label("Scene MSAA Color"),
            );
            let depth = backend.create_texture(
                &TextureDesc::new(width, height, PixelFormat::Depth24PlusStencil8)
                    .with_samples(samples)
                    .with_label("Scene MSAA Depth"),
            );
            let target = backend.create_render_target(width, height, "Scene MSAA");
            backend.attach(target, Attachment::Color(0), Some(color));
            backend.attach(target, Attachment::DepthStencil, Some(depth));
            SampleTarget {
                target,
                color,
                depth,
            }
        };

        let ping_pong = PingPong::new(
            &mut backend,
            TextureDesc::new(width, height, color_format)
                .with_filter(FilterMode::Linear)
                .with_label("Effect Chain"),
        );
        let back_target = backend.create_screen_target(width, height);

        let mut gbuffer = GBuffer::new(&mut backend, width, height);
        // No shipped effect reads albedo + metalness.
        gbuffer.enable_albedo_metalness = false;

        let super_sampling = SuperSampling::new(&mut backend, width, height, config.taa_samples);
        let effects = EffectStack::new(&mut backend, width, height);

        let mut copy_pass = PostPass::new(ShaderProgram::Copy);
        copy_pass.blend = BlendMode::Alpha;
        copy_pass.uniforms.insert("opacity", 1.0);

        let mut fxaa_pass = PostPass::new(ShaderProgram::Fxaa);
        fxaa_pass.blend = BlendMode::Alpha;
        fxaa_pass.uniforms.insert("resolution", inverse_resolution(width, height));

        let last_key = InvalidationKey::capture(&config, &effects);

        log::debug!("Renderer targets allocated at {width}x{height} ({samples}x MSAA, {color_format:?})");

        Ok(Self {
            backend,
            config,
            path,
            width,
            height,
            sample_target,
            ping_pong,
            back_target,
            gbuffer,
            super_sampling,
            effects,
            copy_pass,
            fxaa_pass,
            scratch: FrameScratch {
                saved_projection: Mat4::IDENTITY,
            },
            last_key,
            last_frame: FrameStats::new(path),
        })
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Renders one frame into the back target and flushes the backend.
    ///
    /// The camera's projection matrix is jittered while the scene is drawn
    /// and restored bit-for-bit before returning.
    pub fn render(&mut self, scene: &mut dyn RenderScene, camera: &mut Camera) {
        self.track_invalidation();

        let mut stats = FrameStats::new(self.path);
        match self.path {
            RenderPath::HighFidelity => self.render_high_fidelity(scene, camera, &mut stats),
            RenderPath::BasicForward => self.render_basic(scene, camera),
        }

        self.backend.flush();
        log::trace!("Frame done: {stats:?}");
        self.last_frame = stats;
    }

    fn render_high_fidelity(
        &mut self,
        scene: &mut dyn RenderScene,
        camera: &mut Camera,
        stats: &mut FrameStats,
    ) {
        let result = if self.config.taa {
            if self.super_sampling.finished() {
                self.super_sampling.output()
            } else {
                self.scratch.saved_projection = camera.projection_matrix;
                self.super_sampling
                    .jitter_projection(camera, self.width, self.height);

                let frame = self.super_sampling.frame();
                let chain_output = self.render_chain(scene, camera, frame, stats);

                camera.projection_matrix = self.scratch.saved_projection;
                self.super_sampling.sample(&mut self.backend, chain_output)
            }
        } else {
            // Nothing accumulates, so cached effect buffers never outlive a frame.
            self.effects.dirty();
            self.render_chain(scene, camera, 0, stats)
        };

        stats.accumulated_samples = self.super_sampling.frame();
        stats.converged = self.config.taa && self.super_sampling.finished();

        let pass = if self.config.fxaa {
            &mut self.fxaa_pass
        } else {
            &mut self.copy_pass
        };
        pass.uniforms.insert("t_diffuse", result);

        self.backend.set_render_target(self.back_target);
        self.backend.clear(Vec4::ZERO, ClearFlags::all());
        pass.render(&mut self.backend);
        stats.final_pass = Some(pass.program);
    }

    /// Scene → (G-buffer) → MSAA render → resolve → effect chain.
    /// Returns the chain's output texture.
    fn render_chain(
        &mut self,
        scene: &mut dyn RenderScene,
        camera: &Camera,
        frame: u32,
        stats: &mut FrameStats,
    ) -> TextureId {
        scene.update_transforms();
        scene.update_lights();
        scene.update_render_list(camera);

        if self.effects.needs_gbuffer() {
            self.gbuffer.update(&mut self.backend, &*scene, camera);
            stats.gbuffer_updated = true;
        }

        self.backend.set_render_target(self.sample_target.target);
        self.backend.clear(Vec4::ZERO, ClearFlags::all());
        self.backend.render_scene(&*scene, camera);
        stats.scene_rendered = true;

        self.ping_pong.reset();
        self.backend
            .blit(self.sample_target.target, self.ping_pong.current_read().target);

        let mut ctx = EffectContext {
            backend: &mut self.backend,
            gbuffer: &self.gbuffer,
            frame,
            width: self.width,
            height: self.height,
        };
        for effect in self.effects.passes() {
            if !effect.enabled() {
                continue;
            }
            let read = *self.ping_pong.current_read();
            let write = *self.ping_pong.current_write();
            effect.apply(&mut ctx, camera, Some(read.texture), write.target);
            self.ping_pong.swap();
            stats.effects.push(effect.kind());
        }

        self.ping_pong.current_read().texture
    }

    fn render_basic(&mut self, scene: &mut dyn RenderScene, camera: &Camera) {
        scene.update_transforms();
        scene.update_lights();
        scene.update_render_list(camera);

        if self.effects.background.enabled() {
            let mut ctx = EffectContext {
                backend: &mut self.backend,
                gbuffer: &self.gbuffer,
                frame: 0,
                width: self.width,
                height: self.height,
            };
            self.effects
                .background
                .apply(&mut ctx, camera, None, self.back_target);
        } else {
            self.backend.set_render_target(self.back_target);
            self.backend.clear(Vec4::ZERO, ClearFlags::COLOR);
        }

        self.backend.clear(Vec4::ZERO, ClearFlags::DEPTH_STENCIL);
        self.backend.render_scene(&*scene, camera);
    }

    /// Restarts accumulation when the enabled effects or TAA settings
    /// changed since the previous frame.
    fn track_invalidation(&mut self) {
        let key = InvalidationKey::capture(&self.config, &self.effects);
        let previous = self.last_key;
        if previous != key {
            if previous.taa_samples != key.taa_samples {
                self.super_sampling.set_sample_count(key.taa_samples);
            }
            log::debug!("Renderer state changed ({previous:?} → {key:?})");
            self.dirty();
        }
        self.last_key = key;
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Propagates a new output resolution to every owned target. Zero sizes
    /// are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("Ignoring resize to {width}x{height}");
            return;
        }
        log::debug!("Resize {}x{} → {width}x{height}", self.width, self.height);

        self.width = width;
        self.height = height;

        self.backend
            .resize_render_target(self.sample_target.target, width, height);
        self.ping_pong.resize(&mut self.backend, width, height);
        self.backend
            .resize_render_target(self.back_target, width, height);
        self.gbuffer.resize(&mut self.backend, width, height);
        self.super_sampling
            .resize(&mut self.backend, width, height);
        self.effects.resize(&mut self.backend, width, height);
        self.fxaa_pass
            .uniforms
            .insert("resolution", inverse_resolution(width, height));

        self.dirty();
    }

    /// Restarts accumulation and marks every effect's cached state stale.
    pub fn dirty(&mut self) {
        self.super_sampling.start();
        self.effects.dirty();
        log::debug!("Renderer marked dirty");
    }

    pub fn set_background(&mut self, background: Background) {
        self.effects.background.set(background);
        self.dirty();
    }

    pub fn clear_background(&mut self) {
        self.effects.background.clear();
        self.dirty();
    }

    /// Draws one G-buffer channel into the back target. The G-buffer holds
    /// whatever the last frame that needed it produced.
    pub fn render_gbuffer_debug(&mut self, camera: &Camera, view: GBufferDebugView) {
        self.backend.set_render_target(self.back_target);
        self.gbuffer.render_debug(&mut self.backend, camera, view);
        self.backend.flush();
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn last_frame(&self) -> &FrameStats {
        &self.last_frame
    }

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    #[must_use]
    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    #[inline]
    #[must_use]
    pub fn super_sampling(&self) -> &SuperSampling {
        &self.super_sampling
    }

    #[inline]
    #[must_use]
    pub fn effects(&self) -> &EffectStack {
        &self.effects
    }

    /// Toggling effects here is picked up automatically by the next render.
    #[inline]
    pub fn effects_mut(&mut self) -> &mut EffectStack {
        &mut self.effects
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// `taa` and `taa_samples` changes are picked up automatically by the
    /// next render. `max_msaa_samples` only applies at construction.
    #[inline]
    pub fn config_mut(&mut self) -> &mut RendererConfig {
        &mut self.config
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> RenderPath {
        self.path
    }

    #[inline]
    #[must_use]
    pub fn back_target(&self) -> RenderTargetId {
        self.back_target
    }

    /// Releases every owned resource and hands the backend back.
    pub fn dispose(self) -> B {
        let Self {
            mut backend,
            sample_target,
            ping_pong,
            back_target,
            gbuffer,
            super_sampling,
            effects,
            ..
        } = self;

        backend.dispose_render_target(sample_target.target);
        backend.dispose_texture(sample_target.color);
        backend.dispose_texture(sample_target.depth);
        ping_pong.dispose(&mut backend);

        for attachment in [Attachment::Color(0), Attachment::DepthStencil] {
            if let Some(texture) = backend.attachment(back_target, attachment) {
                backend.dispose_texture(texture);
            }
        }
        backend.dispose_render_target(back_target);

        gbuffer.dispose(&mut backend);
        super_sampling.dispose(&mut backend);
        effects.dispose(&mut backend);
        backend.flush();

        log::debug!("Renderer disposed");
        backend
    }
}

#[inline]
fn inverse_resolution(width: u32, height: u32) -> Vec2 {
    Vec2::new(1.0 / width as f32, 1.0 / height as f32)
}
