//! Effect Tests
//!
//! Tests for:
//! - Effect stack defaults, masks and G-buffer requirements
//! - SSAO / SSR result caching and invalidation
//! - Per-effect uniforms (background, tone mapping, vignette, bloom)
//! - SSAO sample generation
//! - Settings deserialization

mod common;

use glam::{Vec2, Vec4};
use myth_postfx::renderer::core::{ShaderProgram, UniformValue};
use myth_postfx::renderer::effects::ssao::{generate_kernel, generate_noise};
use myth_postfx::renderer::effects::{
    BackgroundEffect, BloomEffect, EffectContext, EffectStack, SsaoEffect, SsaoSettings,
    SsrEffect, ToneMappingEffect, ToneMappingMode, ToneMappingSettings, VignetteEffect,
};
use myth_postfx::{
    Background, ClearFlags, Effect, EffectKind, GBuffer, PixelFormat, RenderBackend,
    RenderTarget2D, TextureDesc, TextureId,
};

use common::{Content, HEIGHT, RecordingBackend, WIDTH, test_camera};

struct Fixture {
    backend: RecordingBackend,
    gbuffer: GBuffer,
    input: RenderTarget2D,
    output: RenderTarget2D,
}

impl Fixture {
    fn new() -> Self {
        let mut backend = RecordingBackend::full();
        let gbuffer = GBuffer::new(&mut backend, WIDTH, HEIGHT);
        let desc = TextureDesc::new(WIDTH, HEIGHT, PixelFormat::Rgba16Float);
        let input = RenderTarget2D::new(&mut backend, desc.with_label("Input"));
        let output = RenderTarget2D::new(&mut backend, desc.with_label("Output"));
        backend.set_render_target(input.target);
        backend.clear(Vec4::new(0.5, 0.5, 0.5, 1.0), ClearFlags::COLOR);
        backend.clear_calls();
        Self {
            backend,
            gbuffer,
            input,
            output,
        }
    }

    fn apply(&mut self, effect: &mut dyn Effect, input: Option<TextureId>) {
        let mut ctx = EffectContext {
            backend: &mut self.backend,
            gbuffer: &self.gbuffer,
            frame: 0,
            width: WIDTH,
            height: HEIGHT,
        };
        effect.apply(&mut ctx, &test_camera(), input, self.output.target);
    }

    fn apply_input(&mut self, effect: &mut dyn Effect) {
        let input = self.input.texture;
        self.apply(effect, Some(input));
    }

    fn last_uniforms(&self, program: ShaderProgram) -> myth_postfx::renderer::core::Uniforms {
        self.backend
            .fullscreen_uniforms(program)
            .pop()
            .unwrap_or_else(|| panic!("no {program:?} draw recorded"))
    }
}

fn vec2(value: Option<&UniformValue>) -> Vec2 {
    match value {
        Some(UniformValue::Vec2(v)) => *v,
        other => panic!("expected vec2, got {other:?}"),
    }
}

// ============================================================================
// Stack
// ============================================================================

#[test]
fn only_background_is_enabled_by_default() {
    let mut backend = RecordingBackend::full();
    let stack = EffectStack::new(&mut backend, WIDTH, HEIGHT);

    assert_eq!(stack.enabled_kinds(), vec![EffectKind::Background]);
    assert_eq!(stack.enabled_mask(), EffectKind::Background.bit());
    assert!(!stack.needs_gbuffer());
}

#[test]
fn stack_iterates_in_fixed_order() {
    let mut backend = RecordingBackend::full();
    let stack = EffectStack::new(&mut backend, WIDTH, HEIGHT);
    let kinds: Vec<_> = stack.ordered().iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, EffectKind::ORDER);
}

#[test]
fn gbuffer_is_needed_only_by_screen_space_effects() {
    let mut backend = RecordingBackend::full();
    let mut stack = EffectStack::new(&mut backend, WIDTH, HEIGHT);

    for kind in [EffectKind::Bloom, EffectKind::ToneMapping, EffectKind::Vignette] {
        stack.set_enabled(kind, true);
    }
    assert!(!stack.needs_gbuffer());

    stack.set_enabled(EffectKind::Ssr, true);
    assert!(stack.needs_gbuffer());

    stack.set_enabled(EffectKind::Ssr, false);
    stack.set_enabled(EffectKind::Ssao, true);
    assert!(stack.needs_gbuffer());
}

#[test]
fn enabled_mask_tracks_every_toggle() {
    let mut backend = RecordingBackend::full();
    let mut stack = EffectStack::new(&mut backend, WIDTH, HEIGHT);
    let before = stack.enabled_mask();

    stack.set_enabled(EffectKind::Vignette, true);
    let after = stack.enabled_mask();
    assert_ne!(before, after);
    assert_eq!(after & EffectKind::Vignette.bit(), EffectKind::Vignette.bit());

    stack.set_enabled(EffectKind::Vignette, false);
    assert_eq!(stack.enabled_mask(), before);
}

#[test]
fn kind_bits_are_distinct() {
    let mask = EffectKind::ORDER.iter().fold(0u8, |m, k| {
        assert_eq!(m & k.bit(), 0);
        m | k.bit()
    });
    assert_eq!(mask.count_ones(), 6);
}

#[test]
fn stack_dirty_reaches_cached_effects() {
    let mut f = Fixture::new();
    let mut stack = EffectStack::new(&mut f.backend, WIDTH, HEIGHT);
    f.apply_input(&mut stack.ssao);
    f.apply_input(&mut stack.ssr);
    assert!(!stack.ssao.is_dirty());
    assert!(!stack.ssr.is_dirty());

    stack.dirty();
    assert!(stack.ssao.is_dirty());
    assert!(stack.ssr.is_dirty());
}

// ============================================================================
// SSAO
// ============================================================================

#[test]
fn ssao_is_computed_once_until_dirty() {
    let mut f = Fixture::new();
    let mut ssao = SsaoEffect::new(&mut f.backend, WIDTH, HEIGHT);

    f.apply_input(&mut ssao);
    f.apply_input(&mut ssao);
    assert_eq!(ssao.compute_count(), 1);
    assert_eq!(f.backend.fullscreen_count(ShaderProgram::Ssao), 1);
    assert_eq!(f.backend.fullscreen_count(ShaderProgram::MultiplyBlend), 2);

    ssao.dirty();
    f.apply_input(&mut ssao);
    assert_eq!(ssao.compute_count(), 2);
}

#[test]
fn ssao_resize_invalidates_cache() {
    let mut f = Fixture::new();
    let mut ssao = SsaoEffect::new(&mut f.backend, WIDTH, HEIGHT);
    f.apply_input(&mut ssao);

    ssao.resize(&mut f.backend, 32, 32);
    assert!(ssao.is_dirty());
    f.apply_input(&mut ssao);
    assert_eq!(ssao.compute_count(), 2);
}

#[test]
fn ssao_blends_blurred_occlusion_over_input() {
    let mut f = Fixture::new();
    let mut ssao = SsaoEffect::new(&mut f.backend, WIDTH, HEIGHT);
    f.apply_input(&mut ssao);

    let uniforms = f.last_uniforms(ShaderProgram::MultiplyBlend);
    assert_eq!(uniforms.texture("t_blend"), Some(ssao.occlusion_texture()));
    assert_eq!(uniforms.texture("t_base"), Some(f.input.texture));

    // Occlusion = vertical edge-aware blur of horizontal blur of the SSAO pass.
    let occlusion = f.backend.content(ssao.occlusion_texture());
    assert_eq!(occlusion.program(), Some(ShaderProgram::EdgeAwareBlur));
    let horizontal = occlusion.input("t_diffuse").and_then(Content::program);
    assert_eq!(horizontal, Some(ShaderProgram::EdgeAwareBlur));

    let blur = f.last_uniforms(ShaderProgram::EdgeAwareBlur);
    assert_eq!(blur.texture("t_depth"), Some(f.gbuffer.depth_texture()));
}

#[test]
fn ssao_uploads_kernel_and_follows_size_changes() {
    let mut f = Fixture::new();
    let mut ssao = SsaoEffect::new(&mut f.backend, WIDTH, HEIGHT);
    let kernel = f.backend.texture_by_label("SSAO Kernel").unwrap();
    assert_eq!(f.backend.content(kernel), Content::Undefined);

    f.apply_input(&mut ssao);
    assert_eq!(f.backend.content(kernel), Content::Uploaded);

    ssao.settings = SsaoSettings {
        kernel_size: 8,
        noise_size: 4,
        ..SsaoSettings::default()
    };
    ssao.dirty();
    f.apply_input(&mut ssao);

    let noise = f.backend.texture_by_label("SSAO Noise").unwrap();
    assert_eq!(f.backend.texture_desc(kernel).map(|d| d.size()), Some((8, 1)));
    assert_eq!(f.backend.texture_desc(noise).map(|d| d.size()), Some((4, 4)));
}

// ============================================================================
// SSR
// ============================================================================

#[test]
fn ssr_is_computed_once_until_dirty() {
    let mut f = Fixture::new();
    let mut ssr = SsrEffect::new(&mut f.backend, WIDTH, HEIGHT);

    f.apply_input(&mut ssr);
    f.apply_input(&mut ssr);
    assert_eq!(ssr.compute_count(), 1);
    assert_eq!(f.backend.fullscreen_count(ShaderProgram::SsrTrace), 1);
    assert_eq!(f.backend.fullscreen_count(ShaderProgram::ReflectionBlend), 2);

    ssr.dirty();
    f.apply_input(&mut ssr);
    assert_eq!(ssr.compute_count(), 2);
}

#[test]
fn ssr_traces_against_chain_input() {
    let mut f = Fixture::new();
    let mut ssr = SsrEffect::new(&mut f.backend, WIDTH, HEIGHT);
    f.apply_input(&mut ssr);

    let trace = f.last_uniforms(ShaderProgram::SsrTrace);
    assert_eq!(trace.texture("t_color"), Some(f.input.texture));
    assert_eq!(trace.texture("t_normal"), Some(f.gbuffer.normal_glossiness_texture()));

    let blend = f.last_uniforms(ShaderProgram::ReflectionBlend);
    assert_eq!(blend.texture("t_blend"), Some(ssr.reflection_texture()));
}

// ============================================================================
// Bloom / tone mapping / vignette / background
// ============================================================================

#[test]
fn bloom_recomputes_every_frame() {
    let mut f = Fixture::new();
    let mut bloom = BloomEffect::new(&mut f.backend, WIDTH, HEIGHT);
    f.apply_input(&mut bloom);
    f.apply_input(&mut bloom);

    assert_eq!(f.backend.fullscreen_count(ShaderProgram::BloomBright), 2);
    assert_eq!(f.backend.fullscreen_count(ShaderProgram::Blur), 4);
    assert_eq!(f.backend.fullscreen_count(ShaderProgram::AdditiveBlend), 2);
    assert!(!bloom.is_dirty());

    let composite = f.last_uniforms(ShaderProgram::AdditiveBlend);
    assert_eq!(composite.get("strength"), Some(&UniformValue::Float(0.5)));
    assert_eq!(composite.texture("t_base"), Some(f.input.texture));
}

#[test]
fn tone_mapping_encodes_mode_and_exposure() {
    let mut f = Fixture::new();
    let mut tone = ToneMappingEffect::new();
    f.apply_input(&mut tone);
    let default = vec2(f.last_uniforms(ShaderProgram::ToneMapping).get("tone"));
    assert_eq!(default, Vec2::new(2.0, 1.0));

    tone.settings = ToneMappingSettings {
        mode: ToneMappingMode::Reinhard,
        exposure: 2.5,
    };
    f.apply_input(&mut tone);
    let reinhard = vec2(f.last_uniforms(ShaderProgram::ToneMapping).get("tone"));
    assert_eq!(reinhard, Vec2::new(1.0, 2.5));
}

#[test]
fn vignette_encodes_offset_and_darkness() {
    let mut f = Fixture::new();
    let mut vignette = VignetteEffect::new();
    vignette.settings.darkness = 0.3;
    f.apply_input(&mut vignette);

    let uniforms = f.last_uniforms(ShaderProgram::Vignette);
    assert_eq!(vec2(uniforms.get("vignette")), Vec2::new(1.0, 0.3));
    assert_eq!(uniforms.texture("t_diffuse"), Some(f.input.texture));
}

#[test]
fn background_color_composites_input() {
    let mut f = Fixture::new();
    let mut background = BackgroundEffect::new();
    assert!(background.enabled());
    background.set(Background::Color(Vec4::new(0.1, 0.2, 0.3, 1.0)));
    f.apply_input(&mut background);

    let uniforms = f.last_uniforms(ShaderProgram::Background);
    assert_eq!(vec2(uniforms.get("flags")), Vec2::new(1.0, 0.0));
    assert_eq!(
        uniforms.get("color"),
        Some(&UniformValue::Vec4(Vec4::new(0.1, 0.2, 0.3, 1.0)))
    );
    assert_eq!(uniforms.texture("t_diffuse"), Some(f.input.texture));
}

#[test]
fn background_texture_without_input() {
    let mut f = Fixture::new();
    let image = f
        .backend
        .create_texture(&TextureDesc::new(8, 8, PixelFormat::Rgba8Unorm));
    let mut background = BackgroundEffect::new();
    background.set(Background::Texture(image));
    f.apply(&mut background, None);

    let uniforms = f.last_uniforms(ShaderProgram::Background);
    assert_eq!(vec2(uniforms.get("flags")), Vec2::new(0.0, 1.0));
    assert_eq!(uniforms.texture("t_background"), Some(image));
    assert_eq!(uniforms.texture("t_diffuse"), None);
}

#[test]
fn cleared_background_is_transparent() {
    let mut f = Fixture::new();
    let mut background = BackgroundEffect::new();
    background.clear();
    assert_eq!(background.background(), None);
    f.apply_input(&mut background);

    let uniforms = f.last_uniforms(ShaderProgram::Background);
    assert_eq!(uniforms.get("color"), Some(&UniformValue::Vec4(Vec4::ZERO)));
}

#[test]
fn default_background_is_opaque_black() {
    assert_eq!(
        Background::default(),
        Background::Color(Vec4::new(0.0, 0.0, 0.0, 1.0))
    );
}

// ============================================================================
// Sample generation
// ============================================================================

#[test]
fn kernel_stays_in_unit_hemisphere() {
    let kernel = generate_kernel(64, 7);
    assert_eq!(kernel.len(), 64);
    for sample in &kernel {
        assert!(sample.z >= 0.0);
        assert!(sample.truncate().length() <= 1.0 + 1e-5);
        assert_eq!(sample.w, 0.0);
    }
}

#[test]
fn kernel_is_deterministic_per_seed() {
    assert_eq!(generate_kernel(16, 3), generate_kernel(16, 3));
    assert_ne!(generate_kernel(16, 3), generate_kernel(16, 4));
}

#[test]
fn noise_covers_the_whole_texture() {
    let noise = generate_noise(4);
    assert_eq!(noise.len(), 16);
    assert!(noise.iter().all(|texel| texel[2] == 0 && texel[3] == 255));
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn settings_fill_missing_fields_with_defaults() {
    let ssao: SsaoSettings = serde_json::from_str(r#"{ "radius": 4.0 }"#).unwrap();
    assert_eq!(ssao.radius, 4.0);
    assert_eq!(ssao.kernel_size, SsaoSettings::default().kernel_size);

    let tone: ToneMappingSettings = serde_json::from_str(r#"{ "mode": "Linear" }"#).unwrap();
    assert_eq!(tone.mode, ToneMappingMode::Linear);
    assert_eq!(tone.exposure, 1.0);
}

#[test]
fn effect_kinds_use_snake_case_names() {
    let json = serde_json::to_string(&EffectKind::ToneMapping).unwrap();
    assert_eq!(json, r#""tone_mapping""#);
}
