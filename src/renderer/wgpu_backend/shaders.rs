//! WGSL Source Assembly
//!
//! Every fullscreen program is compiled from two parts:
//!
//! ```text
//! fullscreen_prelude.wgsl (minijinja) ─┐
//!   bindings, p_*/m_* accessors,       ├──► one shader module per ShaderProgram
//!   sample_*/load_* helpers, vs_main   │
//! fullscreen/<program>.wgsl ───────────┘
//! ```
//!
//! The prelude is generated from the program's [`ProgramLayout`], so the
//! binding numbers in WGSL and in the bind group layout always agree.
//!
//! | Binding | Content |
//! |---------|---------|
//! | 0 | `PassParams` uniform block |
//! | 1..=4 | texture slots in layout order |
//! | 5..=8 | sampler of the matching filtered slot |

use bytemuck::{Pod, Zeroable};
use minijinja::syntax::SyntaxConfig;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::errors::Result;
use crate::renderer::core::program::{MAX_MATRICES, MAX_TEXTURES, MAX_VALUES};
use crate::renderer::core::{ProgramLayout, ShaderProgram, TextureSlot, UniformValue, Uniforms};

pub(super) const PARAMS_BINDING: u32 = 0;

#[inline]
pub(super) fn texture_binding(slot: usize) -> u32 {
    1 + slot as u32
}

#[inline]
pub(super) fn sampler_binding(slot: usize) -> u32 {
    1 + (MAX_TEXTURES + slot) as u32
}

pub(super) const GEOMETRY_SOURCE: &str = include_str!("shaders/geometry.wgsl");

const PRELUDE_TEMPLATE: &str = include_str!("shaders/fullscreen_prelude.wgsl");

fn program_body(program: ShaderProgram) -> &'static str {
    match program {
        ShaderProgram::Copy => include_str!("shaders/fullscreen/copy.wgsl"),
        ShaderProgram::Fxaa => include_str!("shaders/fullscreen/fxaa.wgsl"),
        ShaderProgram::MultiplyBlend => include_str!("shaders/fullscreen/multiply_blend.wgsl"),
        ShaderProgram::Ssao => include_str!("shaders/fullscreen/ssao.wgsl"),
        ShaderProgram::Blur => include_str!("shaders/fullscreen/blur.wgsl"),
        ShaderProgram::EdgeAwareBlur => include_str!("shaders/fullscreen/edge_aware_blur.wgsl"),
        ShaderProgram::SsrTrace => include_str!("shaders/fullscreen/ssr_trace.wgsl"),
        ShaderProgram::ReflectionBlend => include_str!("shaders/fullscreen/reflection_blend.wgsl"),
        ShaderProgram::BloomBright => include_str!("shaders/fullscreen/bloom_bright.wgsl"),
        ShaderProgram::AdditiveBlend => include_str!("shaders/fullscreen/additive_blend.wgsl"),
        ShaderProgram::ToneMapping => include_str!("shaders/fullscreen/tone_mapping.wgsl"),
        ShaderProgram::Background => include_str!("shaders/fullscreen/background.wgsl"),
        ShaderProgram::Vignette => include_str!("shaders/fullscreen/vignette.wgsl"),
        ShaderProgram::Accumulate => include_str!("shaders/fullscreen/accumulate.wgsl"),
        ShaderProgram::GBufferDebug => include_str!("shaders/fullscreen/gbuffer_debug.wgsl"),
    }
}

// ============================================================================
// Template environment
// ============================================================================

/// Template environment with the `{$ $}` block / `$$` line statement syntax.
pub(super) fn environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();

    let syntax = SyntaxConfig::builder()
        .block_delimiters("{$", "$}")
        .variable_delimiters("{{", "}}")
        .line_statement_prefix("$$")
        .build()?;

    env.set_syntax(syntax);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
    env.add_template("fullscreen_prelude", PRELUDE_TEMPLATE)?;

    Ok(env)
}

#[derive(Debug, Serialize)]
struct TextureBinding {
    name: &'static str,
    kind: &'static str,
    binding: u32,
    sampler: u32,
}

#[derive(Debug, Serialize)]
struct NamedIndex {
    name: &'static str,
    index: usize,
}

fn texture_bindings(layout: &ProgramLayout) -> Vec<TextureBinding> {
    layout
        .textures
        .iter()
        .enumerate()
        .map(|(slot, (name, kind))| TextureBinding {
            name,
            kind: match kind {
                TextureSlot::Filtered => "filtered",
                TextureSlot::Unfiltered => "unfiltered",
                TextureSlot::Depth => "depth",
            },
            binding: texture_binding(slot),
            sampler: sampler_binding(slot),
        })
        .collect()
}

fn named_indices(names: &'static [&'static str]) -> Vec<NamedIndex> {
    names
        .iter()
        .enumerate()
        .map(|(index, name)| NamedIndex { name, index })
        .collect()
}

/// Full WGSL source of a fullscreen program.
pub(super) fn fullscreen_source(env: &Environment<'_>, program: ShaderProgram) -> Result<String> {
    let layout = program.layout();
    let prelude = env.get_template("fullscreen_prelude")?.render(context! {
        label => program.label(),
        max_matrices => MAX_MATRICES,
        max_values => MAX_VALUES,
        textures => texture_bindings(layout),
        values => named_indices(layout.values),
        matrices => named_indices(layout.matrices),
    })?;

    let mut source = prelude;
    source.push('\n');
    source.push_str(program_body(program));
    Ok(source)
}

// ============================================================================
// Uniform packing
// ============================================================================

/// GPU image of the prelude's `PassParams` block.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(super) struct PassParams {
    pub matrices: [[f32; 16]; MAX_MATRICES],
    pub values: [[f32; 4]; MAX_VALUES],
}

impl PassParams {
    /// Places every named value at the slot its program's layout declares.
    /// Textures are bound separately and skipped here.
    pub fn pack(program: ShaderProgram, uniforms: &Uniforms) -> Self {
        let layout = program.layout();
        let mut params = Self::zeroed();

        for (name, value) in uniforms.iter() {
            match value {
                UniformValue::Texture(_) => {
                    if layout.texture_index(name).is_none() {
                        log::debug!("{}: ignoring unknown texture '{name}'", program.label());
                    }
                }
                UniformValue::Mat4(m) => match layout.matrix_index(name) {
                    Some(index) => params.matrices[index] = m.to_cols_array(),
                    None => log::debug!("{}: ignoring unknown matrix '{name}'", program.label()),
                },
                other => match (layout.value_index(name), other.as_vec4()) {
                    (Some(index), Some(v)) => params.values[index] = v.to_array(),
                    _ => log::debug!("{}: ignoring unknown uniform '{name}'", program.label()),
                },
            }
        }

        params
    }
}
