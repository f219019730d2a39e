//! Screen-Space Effects
//!
//! Each effect is a single-purpose pass reading one input texture (plus
//! G-buffer textures pulled from the [`EffectContext`]) and writing one output
//! target. The orchestrator runs the enabled ones in a fixed order:
//!
//! ```text
//! SSAO → SSR → Bloom → ToneMapping → Background → Vignette
//! ```
//!
//! Effects that do expensive screen-space work (SSAO, SSR) cache their result
//! between frames and recompute only after [`Effect::dirty`].

pub mod background;
pub mod bloom;
pub mod blur;
pub mod ssao;
pub mod ssr;
pub mod tone_mapping;
pub mod vignette;

pub use background::{Background, BackgroundEffect};
pub use bloom::{BloomEffect, BloomSettings};
pub use blur::BlurPass;
pub use ssao::{SsaoEffect, SsaoSettings};
pub use ssr::{SsrEffect, SsrSettings};
pub use tone_mapping::{ToneMappingEffect, ToneMappingMode, ToneMappingSettings};
pub use vignette::{VignetteEffect, VignetteSettings};

use serde::{Deserialize, Serialize};

use super::core::{RenderBackend, RenderTargetId, TextureId};
use super::gbuffer::GBuffer;
use crate::scene::Camera;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Ssao,
    Ssr,
    Bloom,
    ToneMapping,
    Background,
    Vignette,
}

impl EffectKind {
    /// Execution order of the effect chain.
    pub const ORDER: [Self; 6] = [
        Self::Ssao,
        Self::Ssr,
        Self::Bloom,
        Self::ToneMapping,
        Self::Background,
        Self::Vignette,
    ];

    #[inline]
    #[must_use]
    pub fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Everything an effect may touch while applying.
pub struct EffectContext<'a> {
    pub backend: &'a mut dyn RenderBackend,
    pub gbuffer: &'a GBuffer,
    /// Index of the temporal sample being rendered (0 without accumulation).
    pub frame: u32,
    pub width: u32,
    pub height: u32,
}

/// A capability-declaring screen-space pass.
pub trait Effect {
    fn kind(&self) -> EffectKind;

    /// Whether [`apply`](Self::apply) reads G-buffer textures.
    fn requires_gbuffer(&self) -> bool {
        false
    }

    fn enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);

    fn resize(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32);

    /// Marks cached state stale. Effects without a cache ignore this.
    fn dirty(&mut self) {}

    fn is_dirty(&self) -> bool {
        false
    }

    /// Writes `output` from `input`. `input` is `None` only for the
    /// background pass of the forward fallback path.
    fn apply(
        &mut self,
        ctx: &mut EffectContext<'_>,
        camera: &Camera,
        input: Option<TextureId>,
        output: RenderTargetId,
    );

    fn dispose(self, backend: &mut dyn RenderBackend)
    where
        Self: Sized;
}

/// The fixed set of effects owned by the orchestrator.
pub struct EffectStack {
    pub ssao: SsaoEffect,
    pub ssr: SsrEffect,
    pub bloom: BloomEffect,
    pub tone_mapping: ToneMappingEffect,
    pub background: BackgroundEffect,
    pub vignette: VignetteEffect,
}

impl EffectStack {
    pub fn new(backend: &mut dyn RenderBackend, width: u32, height: u32) -> Self {
        Self {
            ssao: SsaoEffect::new(backend, width, height),
            ssr: SsrEffect::new(backend, width, height),
            bloom: BloomEffect::new(backend, width, height),
            tone_mapping: ToneMappingEffect::new(),
            background: BackgroundEffect::new(),
            vignette: VignetteEffect::new(),
        }
    }

    /// Effects in execution order.
    pub fn passes(&mut self) -> [&mut dyn Effect; 6] {
        [
            &mut self.ssao,
            &mut self.ssr,
            &mut self.bloom,
            &mut self.tone_mapping,
            &mut self.background,
            &mut self.vignette,
        ]
    }

    #[must_use]
    pub fn ordered(&self) -> [&dyn Effect; 6] {
        [
            &self.ssao,
            &self.ssr,
            &self.bloom,
            &self.tone_mapping,
            &self.background,
            &self.vignette,
        ]
    }

    #[must_use]
    pub fn get(&self, kind: EffectKind) -> &dyn Effect {
        match kind {
            EffectKind::Ssao => &self.ssao,
            EffectKind::Ssr => &self.ssr,
            EffectKind::Bloom => &self.bloom,
            EffectKind::ToneMapping => &self.tone_mapping,
            EffectKind::Background => &self.background,
            EffectKind::Vignette => &self.vignette,
        }
    }

    pub fn get_mut(&mut self, kind: EffectKind) -> &mut dyn Effect {
        match kind {
            EffectKind::Ssao => &mut self.ssao,
            EffectKind::Ssr => &mut self.ssr,
            EffectKind::Bloom => &mut self.bloom,
            EffectKind::ToneMapping => &mut self.tone_mapping,
            EffectKind::Background => &mut self.background,
            EffectKind::Vignette => &mut self.vignette,
        }
    }

    pub fn set_enabled(&mut self, kind: EffectKind, enabled: bool) {
        self.get_mut(kind).set_enabled(enabled);
    }

    /// Bit set of enabled effects, one [`EffectKind::bit`] each.
    #[must_use]
    pub fn enabled_mask(&self) -> u8 {
        self.ordered()
            .iter()
            .filter(|e| e.enabled())
            .fold(0, |mask, e| mask | e.kind().bit())
    }

    #[must_use]
    pub fn enabled_kinds(&self) -> Vec<EffectKind> {
        self.ordered()
            .iter()
            .filter(|e| e.enabled())
            .map(|e| e.kind())
            .collect()
    }

    /// True when any enabled effect reads the G-buffer.
    #[must_use]
    pub fn needs_gbuffer(&self) -> bool {
        self.ordered()
            .iter()
            .any(|e| e.enabled() && e.requires_gbuffer())
    }

    pub fn dirty(&mut self) {
        for effect in self.passes() {
            effect.dirty();
        }
    }

    pub fn resize(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32) {
        for effect in self.passes() {
            effect.resize(backend, width, height);
        }
    }

    pub fn dispose(self, backend: &mut dyn RenderBackend) {
        self.ssao.dispose(backend);
        self.ssr.dispose(backend);
        self.bloom.dispose(backend);
        self.tone_mapping.dispose(backend);
        self.background.dispose(backend);
        self.vignette.dispose(backend);
    }
}
