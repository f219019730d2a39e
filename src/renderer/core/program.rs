//! Named GPU programs and their uniform interface.
//!
//! Fullscreen programs read named textures and named uniform values. Each
//! [`ShaderProgram`] declares a static [`ProgramLayout`] so that backends can
//! map names to binding slots without knowing about individual effects.

use glam::{Mat4, Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use super::{RenderBackend, TextureId};
use super::backend::BlendMode;

/// Maximum matrices per fullscreen program.
pub const MAX_MATRICES: usize = 4;
/// Maximum packed `vec4` values per fullscreen program.
pub const MAX_VALUES: usize = 16;
/// Maximum texture slots per fullscreen program.
pub const MAX_TEXTURES: usize = 4;

// ============================================================================
// Layout
// ============================================================================

/// How a fullscreen program samples a texture slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    /// Bilinear sampling.
    Filtered,
    /// Texel fetch only (needed for 32-bit float G-buffer storage).
    Unfiltered,
    /// Depth aspect of a depth/stencil texture.
    Depth,
}

/// Static binding interface of a fullscreen program.
#[derive(Debug, PartialEq, Eq)]
pub struct ProgramLayout {
    pub textures: &'static [(&'static str, TextureSlot)],
    /// Each value occupies one `vec4` slot; scalars and vectors are zero-padded.
    pub values: &'static [&'static str],
    pub matrices: &'static [&'static str],
}

impl ProgramLayout {
    #[inline]
    #[must_use]
    pub fn texture_index(&self, name: &str) -> Option<usize> {
        self.textures.iter().position(|(n, _)| *n == name)
    }

    #[inline]
    #[must_use]
    pub fn value_index(&self, name: &str) -> Option<usize> {
        self.values.iter().position(|n| *n == name)
    }

    #[inline]
    #[must_use]
    pub fn matrix_index(&self, name: &str) -> Option<usize> {
        self.matrices.iter().position(|n| *n == name)
    }
}

use TextureSlot::{Depth, Filtered, Unfiltered};

const COPY: ProgramLayout = ProgramLayout {
    textures: &[("t_diffuse", Filtered)],
    values: &["opacity"],
    matrices: &[],
};

const FXAA: ProgramLayout = ProgramLayout {
    textures: &[("t_diffuse", Filtered)],
    values: &["resolution"],
    matrices: &[],
};

const BLEND: ProgramLayout = ProgramLayout {
    textures: &[("t_base", Filtered), ("t_blend", Filtered)],
    values: &["strength"],
    matrices: &[],
};

const SSAO: ProgramLayout = ProgramLayout {
    textures: &[
        ("t_depth", Depth),
        ("t_normal", Unfiltered),
        ("t_noise", Unfiltered),
        ("t_kernel", Unfiltered),
    ],
    values: &["resolution", "camera_planes", "kernel", "occlusion"],
    matrices: &["projection", "inverse_projection", "view_inverse_transpose"],
};

const BLUR: ProgramLayout = ProgramLayout {
    textures: &[("t_diffuse", Filtered)],
    values: &["resolution", "direction", "blur"],
    matrices: &[],
};

const EDGE_AWARE_BLUR: ProgramLayout = ProgramLayout {
    textures: &[
        ("t_diffuse", Filtered),
        ("t_depth", Depth),
        ("t_normal", Unfiltered),
    ],
    values: &["resolution", "direction", "blur", "camera_planes"],
    matrices: &[],
};

const SSR_TRACE: ProgramLayout = ProgramLayout {
    textures: &[
        ("t_color", Filtered),
        ("t_depth", Depth),
        ("t_normal", Unfiltered),
    ],
    values: &["resolution", "camera_planes", "trace", "fade", "thickness"],
    matrices: &["projection", "inverse_projection", "view"],
};

const BLOOM_BRIGHT: ProgramLayout = ProgramLayout {
    textures: &[("t_diffuse", Filtered)],
    values: &["threshold"],
    matrices: &[],
};

const TONE_MAPPING: ProgramLayout = ProgramLayout {
    textures: &[("t_diffuse", Filtered)],
    values: &["tone"],
    matrices: &[],
};

const BACKGROUND: ProgramLayout = ProgramLayout {
    textures: &[("t_diffuse", Filtered), ("t_background", Filtered)],
    values: &["color", "flags"],
    matrices: &[],
};

const VIGNETTE: ProgramLayout = ProgramLayout {
    textures: &[("t_diffuse", Filtered)],
    values: &["vignette"],
    matrices: &[],
};

const ACCUMULATE: ProgramLayout = ProgramLayout {
    textures: &[("t_previous", Filtered), ("t_current", Filtered)],
    values: &["mix_ratio"],
    matrices: &[],
};

const GBUFFER_DEBUG: ProgramLayout = ProgramLayout {
    textures: &[
        ("t_normal", Unfiltered),
        ("t_depth", Depth),
        ("t_albedo", Unfiltered),
    ],
    values: &["view", "camera_planes"],
    matrices: &["inverse_view_projection"],
};

// ============================================================================
// Programs
// ============================================================================

/// Fullscreen programs shipped with the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderProgram {
    Copy,
    Fxaa,
    /// `base * blend`
    MultiplyBlend,
    Ssao,
    /// Separable gaussian blur.
    Blur,
    /// Separable blur that rejects taps across depth / normal discontinuities.
    EdgeAwareBlur,
    SsrTrace,
    /// `base + blend * blend.a * strength`: the reflection alpha is the hit confidence.
    ReflectionBlend,
    BloomBright,
    /// `base + blend * strength`
    AdditiveBlend,
    ToneMapping,
    Background,
    Vignette,
    Accumulate,
    GBufferDebug,
}

impl ShaderProgram {
    pub const ALL: [Self; 15] = [
        Self::Copy,
        Self::Fxaa,
        Self::MultiplyBlend,
        Self::Ssao,
        Self::Blur,
        Self::EdgeAwareBlur,
        Self::SsrTrace,
        Self::ReflectionBlend,
        Self::BloomBright,
        Self::AdditiveBlend,
        Self::ToneMapping,
        Self::Background,
        Self::Vignette,
        Self::Accumulate,
        Self::GBufferDebug,
    ];

    #[must_use]
    pub fn layout(self) -> &'static ProgramLayout {
        match self {
            Self::Copy => &COPY,
            Self::Fxaa => &FXAA,
            Self::MultiplyBlend | Self::ReflectionBlend | Self::AdditiveBlend => &BLEND,
            Self::Ssao => &SSAO,
            Self::Blur => &BLUR,
            Self::EdgeAwareBlur => &EDGE_AWARE_BLUR,
            Self::SsrTrace => &SSR_TRACE,
            Self::BloomBright => &BLOOM_BRIGHT,
            Self::ToneMapping => &TONE_MAPPING,
            Self::Background => &BACKGROUND,
            Self::Vignette => &VIGNETTE,
            Self::Accumulate => &ACCUMULATE,
            Self::GBufferDebug => &GBUFFER_DEBUG,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Copy => "Copy",
            Self::Fxaa => "Fxaa",
            Self::MultiplyBlend => "MultiplyBlend",
            Self::Ssao => "Ssao",
            Self::Blur => "Blur",
            Self::EdgeAwareBlur => "EdgeAwareBlur",
            Self::SsrTrace => "SsrTrace",
            Self::ReflectionBlend => "ReflectionBlend",
            Self::BloomBright => "BloomBright",
            Self::AdditiveBlend => "AdditiveBlend",
            Self::ToneMapping => "ToneMapping",
            Self::Background => "Background",
            Self::Vignette => "Vignette",
            Self::Accumulate => "Accumulate",
            Self::GBufferDebug => "GBufferDebug",
        }
    }
}

/// Programs that rasterize scene geometry into G-buffer targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryProgram {
    /// Normal + glossiness into color 0.
    GBufferNormalGlossiness,
    /// Albedo + metalness into color 0.
    GBufferAlbedoMetalness,
    /// Both of the above in a single pass: colors 0 and 1.
    GBufferMrt,
}

impl GeometryProgram {
    #[inline]
    #[must_use]
    pub fn color_targets(self) -> u32 {
        match self {
            Self::GBufferMrt => 2,
            Self::GBufferNormalGlossiness | Self::GBufferAlbedoMetalness => 1,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::GBufferNormalGlossiness => "GBufferNormalGlossiness",
            Self::GBufferAlbedoMetalness => "GBufferAlbedoMetalness",
            Self::GBufferMrt => "GBufferMrt",
        }
    }
}

// ============================================================================
// Uniforms
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    Texture(TextureId),
}

impl UniformValue {
    /// Value widened into a `vec4` slot. `None` for matrices and textures.
    #[must_use]
    pub fn as_vec4(&self) -> Option<Vec4> {
        match *self {
            Self::Float(x) => Some(Vec4::new(x, 0.0, 0.0, 0.0)),
            Self::Vec2(v) => Some(v.extend(0.0).extend(0.0)),
            Self::Vec3(v) => Some(v.extend(0.0)),
            Self::Vec4(v) => Some(v),
            Self::Mat4(_) | Self::Texture(_) => None,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        Self::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        Self::Vec4(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        Self::Mat4(v)
    }
}

impl From<TextureId> for UniformValue {
    fn from(v: TextureId) -> Self {
        Self::Texture(v)
    }
}

/// Named uniform values for one fullscreen draw.
///
/// Setting a name twice overwrites the earlier value. Names the program's
/// layout does not declare are ignored by backends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Uniforms {
    entries: SmallVec<[(&'static str, UniformValue); 8]>,
}

impl Uniforms {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: &'static str, value: impl Into<UniformValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &'static str, value: impl Into<UniformValue>) {
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    #[must_use]
    pub fn texture(&self, name: &str) -> Option<TextureId> {
        match self.get(name) {
            Some(UniformValue::Texture(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &UniformValue)> {
        self.entries.iter().map(|(n, v)| (*n, v))
    }

    /// All texture handles referenced, in insertion order.
    pub fn textures(&self) -> impl Iterator<Item = (&'static str, TextureId)> + '_ {
        self.entries.iter().filter_map(|(n, v)| match v {
            UniformValue::Texture(id) => Some((*n, *id)),
            _ => None,
        })
    }
}

// ============================================================================
// Fullscreen pass helper
// ============================================================================

/// A fullscreen program plus its persistent uniforms.
#[derive(Debug, Clone, PartialEq)]
pub struct PostPass {
    pub program: ShaderProgram,
    pub uniforms: Uniforms,
    pub blend: BlendMode,
}

impl PostPass {
    #[must_use]
    pub fn new(program: ShaderProgram) -> Self {
        Self {
            program,
            uniforms: Uniforms::new(),
            blend: BlendMode::Replace,
        }
    }

    /// Draws into the backend's current render target.
    pub fn render<B: RenderBackend + ?Sized>(&self, backend: &mut B) {
        backend.draw_fullscreen(self.program, &self.uniforms, self.blend);
    }
}
