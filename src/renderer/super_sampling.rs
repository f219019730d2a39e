//! Temporal Supersampling
//!
//! Progressive anti-aliasing for static views: every frame renders the scene
//! with a different sub-pixel jitter (Halton 2,3 sequence) and folds the
//! result into a running average. After `sample_count` frames the image has
//! converged and the orchestrator stops rendering until something changes.
//!
//! ```text
//! frame n:  jitter(halton(n+1)) → render → mix(prev, current, 1/(n+1)) → swap
//! ```

use glam::{Mat4, Vec2, Vec3};

use super::core::{
    BlendMode, FilterMode, PixelFormat, RenderBackend, RenderTarget2D, ShaderProgram, TextureDesc,
    TextureId, Uniforms,
};
use super::ping_pong::PingPong;
use crate::scene::Camera;

/// Default number of accumulated samples.
pub const DEFAULT_SAMPLE_COUNT: u32 = 30;

/// Element `index` of the Halton low-discrepancy sequence in `base`.
#[must_use]
pub fn halton(mut index: u32, base: u32) -> f32 {
    let mut f = 1.0f32;
    let mut r = 0.0f32;
    let base_f = base as f32;
    while index > 0 {
        f /= base_f;
        r += f * (index % base) as f32;
        index /= base;
    }
    r
}

/// Sub-pixel offset in NDC for accumulation sample `sample`.
///
/// Uses Halton(2,3) point `sample + 1`, mapped from `[0, 1)` to
/// `[-1/size, 1/size)`, which spans exactly one pixel.
#[must_use]
pub fn jitter_offset(sample: u32, width: u32, height: u32) -> Vec2 {
    let index = sample + 1;
    let hx = halton(index, 2);
    let hy = halton(index, 3);
    Vec2::new(
        (hx * 2.0 - 1.0) / width.max(1) as f32,
        (hy * 2.0 - 1.0) / height.max(1) as f32,
    )
}

#[derive(Debug)]
pub struct SuperSampling {
    targets: PingPong<RenderTarget2D>,
    frame: u32,
    sample_count: u32,
}

impl SuperSampling {
    pub fn new(
        backend: &mut dyn RenderBackend,
        width: u32,
        height: u32,
        sample_count: u32,
    ) -> Self {
        let format = PixelFormat::chain_color(backend.capabilities());
        let desc = TextureDesc::new(width, height, format)
            .with_filter(FilterMode::Linear)
            .with_label("SuperSampling Accumulation");
        Self {
            targets: PingPong::new(backend, desc),
            frame: 0,
            sample_count: sample_count.max(1),
        }
    }

    /// Restarts accumulation from the first sample.
    pub fn start(&mut self) {
        self.frame = 0;
    }

    #[inline]
    #[must_use]
    pub fn finished(&self) -> bool {
        self.frame >= self.sample_count
    }

    /// Number of samples accumulated since the last [`start`](Self::start).
    #[inline]
    #[must_use]
    pub fn frame(&self) -> u32 {
        self.frame
    }

    #[inline]
    #[must_use]
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Changes the target sample count and restarts accumulation.
    pub fn set_sample_count(&mut self, sample_count: u32) {
        self.sample_count = sample_count.max(1);
        self.start();
    }

    /// Pre-multiplies the current sample's jitter onto the camera projection.
    /// The caller saves and restores the unjittered matrix.
    pub fn jitter_projection(&self, camera: &mut Camera, width: u32, height: u32) {
        let offset = jitter_offset(self.frame, width, height);
        let translation = Mat4::from_translation(Vec3::new(offset.x, offset.y, 0.0));
        camera.projection_matrix = translation * camera.projection_matrix;
    }

    /// Folds `texture` into the running average and returns the
    /// converged-so-far texture.
    pub fn sample(&mut self, backend: &mut dyn RenderBackend, texture: TextureId) -> TextureId {
        let mix_ratio = 1.0 / (self.frame as f32 + 1.0);
        let uniforms = Uniforms::new()
            .with("t_previous", self.targets.current_read().texture)
            .with("t_current", texture)
            .with("mix_ratio", mix_ratio);

        backend.set_render_target(self.targets.current_write().target);
        backend.draw_fullscreen(ShaderProgram::Accumulate, &uniforms, BlendMode::Replace);
        self.targets.swap();
        self.frame += 1;

        if self.finished() {
            log::debug!("Temporal accumulation converged after {} samples", self.frame);
        }

        self.output()
    }

    /// The most recently accumulated texture.
    #[inline]
    #[must_use]
    pub fn output(&self) -> TextureId {
        self.targets.current_read().texture
    }

    pub fn resize(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) {
        self.targets.resize(backend, width, height);
        self.start();
    }

    #[must_use]
    pub fn size(&self, backend: &dyn RenderBackend) -> Option<(u32, u32)> {
        self.targets.current_read().size(backend)
    }

    pub fn dispose(self, backend: &mut dyn RenderBackend) {
        self.targets.dispose(backend);
    }
}
