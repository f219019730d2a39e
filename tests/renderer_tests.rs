//! Frame Orchestrator Integration Tests
//!
//! Tests for:
//! - Construction: context / resolution validation, render path, MSAA
//! - High-fidelity frame: effect order, final pass, G-buffer gating
//! - Temporal accumulation: convergence, jitter, projection restore, invalidation
//! - Resize propagation and disposal
//! - Basic forward fallback path

mod common;

use glam::{Mat4, Vec2, Vec3, Vec4};
use myth_postfx::renderer::core::{ShaderProgram, UniformValue};
use myth_postfx::renderer::super_sampling::jitter_offset;
use myth_postfx::{
    AdvancedRenderer, Background, Capabilities, ClearFlags, Effect, EffectKind, PostFxError,
    RenderPath, RendererConfig,
};

use common::{
    Call, Content, HEIGHT, RecordingBackend, WIDTH, no_taa, renderer, renderer_with, test_camera,
};

fn bits(m: Mat4) -> [u32; 16] {
    m.to_cols_array().map(f32::to_bits)
}

/// Programs along the main input chain of `content`, outermost first.
fn program_chain(content: &Content) -> (Vec<ShaderProgram>, Content) {
    let mut programs = Vec::new();
    let mut current = content.clone();
    while let Some(program) = current.program() {
        programs.push(program);
        let next = current
            .input("t_diffuse")
            .or_else(|| current.input("t_base"))
            .or_else(|| current.input("t_current"))
            .cloned()
            .unwrap_or(Content::Undefined);
        current = next;
    }
    (programs, current)
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn new_rejects_missing_graphics_context() {
    let backend = RecordingBackend::new(Capabilities {
        version: 0,
        ..Capabilities::full()
    });
    let result = AdvancedRenderer::new(backend, WIDTH, HEIGHT, RendererConfig::default());
    assert!(matches!(
        result,
        Err(PostFxError::UnsupportedContext { version: 0 })
    ));
}

#[test]
fn new_rejects_zero_resolution() {
    let result = AdvancedRenderer::new(RecordingBackend::full(), 0, HEIGHT, RendererConfig::default());
    assert!(matches!(
        result,
        Err(PostFxError::InvalidResolution { width: 0, .. })
    ));
}

#[test]
fn render_path_follows_api_version() {
    let (high, _) = renderer();
    assert_eq!(high.path(), RenderPath::HighFidelity);

    let (basic, _) = renderer_with(Capabilities::basic(), RendererConfig::default());
    assert_eq!(basic.path(), RenderPath::BasicForward);
}

#[test]
fn scene_target_uses_capped_msaa() {
    let sample_count = |capabilities, max_msaa_samples| {
        let config = RendererConfig {
            max_msaa_samples,
            ..RendererConfig::default()
        };
        let (renderer, _) = renderer_with(capabilities, config);
        let backend = renderer.backend();
        let color = backend.texture_by_label("Scene MSAA Color").unwrap();
        backend.textures[color].desc.sample_count
    };

    assert_eq!(sample_count(Capabilities::full(), 4), 4);
    assert_eq!(sample_count(Capabilities::full(), 1), 1);
    assert_eq!(sample_count(Capabilities::basic(), 4), 1);
}

// ============================================================================
// High-fidelity frame
// ============================================================================

#[test]
fn zero_enabled_effects_copy_the_resolved_scene() {
    let (mut renderer, mut scene) = renderer_with(Capabilities::full(), no_taa());
    renderer
        .effects_mut()
        .set_enabled(EffectKind::Background, false);
    let mut camera = test_camera();

    renderer.render(&mut scene, &mut camera);

    let stats = renderer.last_frame();
    assert!(stats.effects.is_empty());
    assert_eq!(stats.final_pass, Some(ShaderProgram::Copy));

    let back = renderer.backend().target_content(renderer.back_target());
    assert_eq!(
        back,
        Content::Program {
            program: ShaderProgram::Copy,
            inputs: vec![("t_diffuse", Content::Scene(0))],
        }
    );
}

#[test]
fn effects_run_in_fixed_order() {
    let (mut renderer, mut scene) = renderer_with(Capabilities::full(), no_taa());
    for kind in EffectKind::ORDER {
        renderer.effects_mut().set_enabled(kind, true);
    }
    let mut camera = test_camera();

    renderer.render(&mut scene, &mut camera);

    assert_eq!(renderer.last_frame().effects, EffectKind::ORDER.to_vec());

    let back = renderer.backend().target_content(renderer.back_target());
    let (programs, source) = program_chain(&back);
    assert_eq!(
        programs,
        vec![
            ShaderProgram::Copy,
            ShaderProgram::Vignette,
            ShaderProgram::Background,
            ShaderProgram::ToneMapping,
            ShaderProgram::AdditiveBlend,
            ShaderProgram::ReflectionBlend,
            ShaderProgram::MultiplyBlend,
        ]
    );
    assert_eq!(source, Content::Scene(0));
}

#[test]
fn disabled_effects_issue_no_draws() {
    let (mut renderer, mut scene) = renderer_with(Capabilities::full(), no_taa());
    let mut camera = test_camera();

    renderer.render(&mut scene, &mut camera);

    let backend = renderer.backend();
    assert_eq!(renderer.last_frame().effects, vec![EffectKind::Background]);
    for program in [
        ShaderProgram::Ssao,
        ShaderProgram::SsrTrace,
        ShaderProgram::BloomBright,
        ShaderProgram::ToneMapping,
        ShaderProgram::Vignette,
    ] {
        assert_eq!(backend.fullscreen_count(program), 0, "{program:?}");
    }
    assert_eq!(backend.fullscreen_count(ShaderProgram::Background), 1);
}

#[test]
fn fxaa_replaces_copy_as_final_pass() {
    let config = RendererConfig {
        fxaa: true,
        ..no_taa()
    };
    let (mut renderer, mut scene) = renderer_with(Capabilities::full(), config);
    let mut camera = test_camera();

    renderer.render(&mut scene, &mut camera);

    let backend = renderer.backend();
    assert_eq!(renderer.last_frame().final_pass, Some(ShaderProgram::Fxaa));
    assert_eq!(backend.fullscreen_count(ShaderProgram::Fxaa), 1);
    assert_eq!(backend.fullscreen_count(ShaderProgram::Copy), 0);
}

#[test]
fn back_target_is_cleared_before_final_pass() {
    let (mut renderer, mut scene) = renderer_with(Capabilities::full(), no_taa());
    let mut camera = test_camera();
    renderer.render(&mut scene, &mut camera);

    let back = renderer.back_target();
    let calls = &renderer.backend().calls;
    let clear = calls
        .iter()
        .position(|c| matches!(c, Call::Clear { target, flags, .. } if *target == back && *flags == ClearFlags::all()))
        .expect("back target cleared");
    let copy = calls
        .iter()
        .position(|c| matches!(c, Call::Fullscreen { target, program: ShaderProgram::Copy, .. } if *target == back))
        .expect("final copy");
    assert!(clear < copy);
    assert_eq!(calls.last(), Some(&Call::Flush));
}

#[test]
fn gbuffer_skipped_without_screen_space_effects() {
    let (mut renderer, mut scene) = renderer_with(Capabilities::full(), no_taa());
    let mut camera = test_camera();

    renderer.render(&mut scene, &mut camera);

    assert!(!renderer.last_frame().gbuffer_updated);
    assert_eq!(renderer.gbuffer().update_count(), 0);
    assert!(renderer.backend().geometry_passes().is_empty());
}

#[test]
fn gbuffer_updated_when_ssao_or_ssr_enabled() {
    for kind in [EffectKind::Ssao, EffectKind::Ssr] {
        let (mut renderer, mut scene) = renderer_with(Capabilities::full(), no_taa());
        renderer.effects_mut().set_enabled(kind, true);
        let mut camera = test_camera();

        renderer.render(&mut scene, &mut camera);
        renderer.render(&mut scene, &mut camera);

        assert!(renderer.last_frame().gbuffer_updated, "{kind:?}");
        assert_eq!(renderer.gbuffer().update_count(), 2, "{kind:?}");
    }
}

#[test]
fn scene_collaborator_called_in_order() {
    let (mut renderer, mut scene) = renderer_with(Capabilities::full(), no_taa());
    let mut camera = test_camera();

    renderer.render(&mut scene, &mut camera);

    assert_eq!(
        scene.calls,
        vec!["update_transforms", "update_lights", "update_render_list"]
    );
    let rendered = renderer.backend().calls.iter().find_map(|c| match c {
        Call::RenderScene {
            opaque, transparent, ..
        } => Some((*opaque, *transparent)),
        _ => None,
    });
    assert_eq!(rendered, Some((3, 1)));
}

// ============================================================================
// Temporal accumulation
// ============================================================================

fn taa(samples: u32) -> RendererConfig {
    RendererConfig {
        taa_samples: samples,
        ..RendererConfig::default()
    }
}

#[test]
fn accumulation_converges_and_stops_rendering() {
    let (mut renderer, mut scene) = renderer_with(Capabilities::full(), taa(4));
    let mut camera = test_camera();

    for i in 1..=4 {
        renderer.render(&mut scene, &mut camera);
        assert!(renderer.last_frame().scene_rendered);
        assert_eq!(renderer.last_frame().accumulated_samples, i);
    }
    assert!(renderer.super_sampling().finished());
    assert!(renderer.last_frame().converged);

    let converged = renderer.backend().target_content(renderer.back_target());
    let renders = renderer.backend().scene_render_count();

    renderer.render(&mut scene, &mut camera);
    renderer.render(&mut scene, &mut camera);

    assert!(!renderer.last_frame().scene_rendered);
    assert_eq!(renderer.backend().scene_render_count(), renders);
    assert_eq!(
        renderer.backend().target_content(renderer.back_target()),
        converged
    );
    assert_eq!(scene.calls.len(), 4 * 3);
}

#[test]
fn accumulation_mix_ratio_decreases() {
    let (mut renderer, mut scene) = renderer_with(Capabilities::full(), taa(3));
    let mut camera = test_camera();
    for _ in 0..3 {
        renderer.render(&mut scene, &mut camera);
    }

    let ratios: Vec<_> = renderer
        .backend()
        .fullscreen_uniforms(ShaderProgram::Accumulate)
        .iter()
        .map(|u| u.get("mix_ratio").copied())
        .collect();
    assert_eq!(
        ratios,
        vec![
            Some(UniformValue::Float(1.0)),
            Some(UniformValue::Float(0.5)),
            Some(UniformValue::Float(1.0 / 3.0)),
        ]
    );
}

#[test]
fn projection_restored_bit_identical() {
    let (mut renderer, mut scene) = renderer();
    let mut camera = test_camera();
    let original = camera.projection_matrix;

    renderer.render(&mut scene, &mut camera);
    assert_eq!(bits(camera.projection_matrix), bits(original));

    renderer.render(&mut scene, &mut camera);
    assert_eq!(bits(camera.projection_matrix), bits(original));
}

#[test]
fn scene_rendered_with_halton_jitter() {
    let (mut renderer, mut scene) = renderer();
    let mut camera = test_camera();
    let original = camera.projection_matrix;

    renderer.render(&mut scene, &mut camera);
    renderer.render(&mut scene, &mut camera);

    let projections: Vec<Mat4> = renderer
        .backend()
        .calls
        .iter()
        .filter_map(|c| match c {
            Call::RenderScene { projection, .. } => Some(*projection),
            _ => None,
        })
        .collect();
    assert_eq!(projections.len(), 2);

    for (sample, projection) in projections.iter().enumerate() {
        let offset = jitter_offset(sample as u32, WIDTH, HEIGHT);
        let expected = Mat4::from_translation(Vec3::new(offset.x, offset.y, 0.0)) * original;
        assert!(projection.abs_diff_eq(expected, 1e-6), "sample {sample}");
    }
    assert_ne!(projections[0], projections[1]);
}

#[test]
fn no_jitter_without_taa() {
    let (mut renderer, mut scene) = renderer_with(Capabilities::full(), no_taa());
    let mut camera = test_camera();
    let original = camera.projection_matrix;

    renderer.render(&mut scene, &mut camera);

    let projection = renderer.backend().calls.iter().find_map(|c| match c {
        Call::RenderScene { projection, .. } => Some(*projection),
        _ => None,
    });
    assert_eq!(projection, Some(original));
    assert_eq!(renderer.backend().fullscreen_count(ShaderProgram::Accumulate), 0);
}

#[test]
fn dirty_restarts_accumulation() {
    let (mut renderer, mut scene) = renderer();
    let mut camera = test_camera();
    for _ in 0..3 {
        renderer.render(&mut scene, &mut camera);
    }
    assert_eq!(renderer.super_sampling().frame(), 3);

    renderer.dirty();
    assert_eq!(renderer.super_sampling().frame(), 0);
    assert!(!renderer.super_sampling().finished());
}

#[test]
fn dirty_forces_ssao_recompute() {
    let (mut renderer, mut scene) = renderer();
    renderer.effects_mut().set_enabled(EffectKind::Ssao, true);
    let mut camera = test_camera();

    renderer.render(&mut scene, &mut camera);
    renderer.render(&mut scene, &mut camera);
    assert_eq!(renderer.effects().ssao.compute_count(), 1);
    assert_eq!(renderer.backend().fullscreen_count(ShaderProgram::MultiplyBlend), 2);

    renderer.dirty();
    renderer.render(&mut scene, &mut camera);
    assert_eq!(renderer.effects().ssao.compute_count(), 2);
}

#[test]
fn screen_space_effects_recompute_every_frame_without_taa() {
    let (mut renderer, mut scene) = renderer_with(Capabilities::full(), no_taa());
    renderer.effects_mut().set_enabled(EffectKind::Ssao, true);
    renderer.effects_mut().set_enabled(EffectKind::Ssr, true);
    let mut camera = test_camera();

    renderer.render(&mut scene, &mut camera);
    camera.look_at(Vec3::new(4.0, 1.0, 3.0), Vec3::ZERO, Vec3::Y);
    renderer.render(&mut scene, &mut camera);

    assert_eq!(renderer.effects().ssao.compute_count(), 2);
    assert_eq!(renderer.effects().ssr.compute_count(), 2);
}

#[test]
fn toggling_an_effect_restarts_accumulation() {
    let (mut renderer, mut scene) = renderer();
    let mut camera = test_camera();
    renderer.render(&mut scene, &mut camera);
    renderer.render(&mut scene, &mut camera);
    assert_eq!(renderer.super_sampling().frame(), 2);

    renderer.effects_mut().set_enabled(EffectKind::Bloom, true);
    renderer.render(&mut scene, &mut camera);
    assert_eq!(renderer.super_sampling().frame(), 1);
}

#[test]
fn changing_sample_count_restarts_accumulation() {
    let (mut renderer, mut scene) = renderer();
    let mut camera = test_camera();
    renderer.render(&mut scene, &mut camera);
    renderer.render(&mut scene, &mut camera);

    renderer.config_mut().taa_samples = 2;
    renderer.render(&mut scene, &mut camera);
    assert_eq!(renderer.super_sampling().sample_count(), 2);
    assert_eq!(renderer.super_sampling().frame(), 1);

    renderer.render(&mut scene, &mut camera);
    assert!(renderer.last_frame().converged);
}

#[test]
fn sample_count_set_before_first_frame_is_honored() {
    let (mut renderer, mut scene) = renderer();
    renderer.config_mut().taa_samples = 4;
    let mut camera = test_camera();

    for _ in 0..4 {
        assert!(!renderer.super_sampling().finished());
        renderer.render(&mut scene, &mut camera);
    }
    assert_eq!(renderer.super_sampling().sample_count(), 4);
    assert!(renderer.super_sampling().finished());
    assert!(renderer.last_frame().converged);
}

#[test]
fn background_change_restarts_accumulation() {
    let (mut renderer, mut scene) = renderer();
    let mut camera = test_camera();
    renderer.render(&mut scene, &mut camera);

    renderer.set_background(Background::Color(Vec4::new(0.2, 0.3, 0.4, 1.0)));
    assert_eq!(renderer.super_sampling().frame(), 0);
    renderer.render(&mut scene, &mut camera);

    let uniforms = renderer
        .backend()
        .fullscreen_uniforms(ShaderProgram::Background);
    let last = uniforms.last().unwrap();
    assert_eq!(
        last.get("color"),
        Some(&UniformValue::Vec4(Vec4::new(0.2, 0.3, 0.4, 1.0)))
    );

    renderer.clear_background();
    assert_eq!(renderer.super_sampling().frame(), 0);
}

// ============================================================================
// Resize & dispose
// ============================================================================

fn assert_all_sized(renderer: &AdvancedRenderer<RecordingBackend>, width: u32, height: u32) {
    let backend = renderer.backend();
    for (_, target) in &backend.targets {
        assert_eq!((target.width, target.height), (width, height), "{}", target.label);
    }
    for (_, texture) in &backend.textures {
        if texture.desc.label.starts_with("SSAO Noise") || texture.desc.label == "SSAO Kernel" {
            continue;
        }
        assert_eq!(texture.desc.size(), (width, height), "{}", texture.desc.label);
    }
}

#[test]
fn resize_propagates_to_every_owned_target() {
    let (mut renderer, mut scene) = renderer();
    renderer.effects_mut().set_enabled(EffectKind::Ssao, true);
    let mut camera = test_camera();
    renderer.render(&mut scene, &mut camera);

    renderer.resize(100, 80);

    assert_eq!(renderer.size(), (100, 80));
    assert_all_sized(&renderer, 100, 80);
    assert_eq!(renderer.gbuffer().size(), (100, 80));
    assert_eq!(
        renderer.super_sampling().size(renderer.backend()),
        Some((100, 80))
    );
    assert_eq!(renderer.super_sampling().frame(), 0);
    assert!(renderer.effects().ssao.is_dirty());

    renderer.render(&mut scene, &mut camera);
    assert!(renderer.last_frame().scene_rendered);
}

#[test]
fn resize_before_first_gbuffer_update() {
    let (mut renderer, _) = renderer();
    renderer.resize(33, 17);
    assert_all_sized(&renderer, 33, 17);
}

#[test]
fn resize_is_idempotent() {
    let (mut renderer, _) = renderer();
    renderer.resize(100, 80);
    let textures = renderer.backend().textures.len();
    renderer.resize(100, 80);
    assert_eq!(renderer.backend().textures.len(), textures);
    assert_all_sized(&renderer, 100, 80);
}

#[test]
fn resize_updates_fxaa_resolution() {
    let config = RendererConfig {
        fxaa: true,
        ..no_taa()
    };
    let (mut renderer, mut scene) = renderer_with(Capabilities::full(), config);
    let mut camera = test_camera();
    renderer.resize(200, 100);
    renderer.render(&mut scene, &mut camera);

    let uniforms = renderer.backend().fullscreen_uniforms(ShaderProgram::Fxaa);
    assert_eq!(
        uniforms[0].get("resolution"),
        Some(&UniformValue::Vec2(Vec2::new(1.0 / 200.0, 1.0 / 100.0)))
    );
}

#[test]
fn zero_resize_is_ignored() {
    let (mut renderer, _) = renderer();
    renderer.resize(0, 10);
    assert_eq!(renderer.size(), (WIDTH, HEIGHT));
    assert_all_sized(&renderer, WIDTH, HEIGHT);
}

#[test]
fn dispose_releases_every_resource() {
    let (mut renderer, mut scene) = renderer();
    for kind in EffectKind::ORDER {
        renderer.effects_mut().set_enabled(kind, true);
    }
    let mut camera = test_camera();
    renderer.render(&mut scene, &mut camera);

    let backend = renderer.dispose();
    assert!(backend.textures.is_empty());
    assert!(backend.targets.is_empty());
    assert!(backend.screen.is_none());
}

// ============================================================================
// Basic forward path
// ============================================================================

#[test]
fn basic_path_draws_background_then_scene() {
    let (mut renderer, mut scene) = renderer_with(Capabilities::basic(), RendererConfig::default());
    for kind in EffectKind::ORDER {
        renderer.effects_mut().set_enabled(kind, true);
    }
    let mut camera = test_camera();
    let back = renderer.back_target();

    renderer.render(&mut scene, &mut camera);

    let backend = renderer.backend();
    let kinds: Vec<_> = backend
        .calls
        .iter()
        .filter(|c| !matches!(c, Call::SetRenderTarget(_)))
        .collect();
    assert!(matches!(
        kinds[0],
        Call::Fullscreen { target, program: ShaderProgram::Background, .. } if *target == back
    ));
    assert!(matches!(
        kinds[1],
        Call::Clear { flags, .. } if *flags == ClearFlags::DEPTH_STENCIL
    ));
    assert!(matches!(kinds[2], Call::RenderScene { target, .. } if *target == back));
    assert_eq!(kinds[3], &Call::Flush);
    assert_eq!(kinds.len(), 4);

    let background = &backend.fullscreen_uniforms(ShaderProgram::Background)[0];
    assert_eq!(
        background.get("flags"),
        Some(&UniformValue::Vec2(Vec2::ZERO))
    );
    assert_eq!(renderer.gbuffer().update_count(), 0);
    assert_eq!(scene.calls.len(), 3);
}

#[test]
fn basic_path_without_background_clears_color() {
    let (mut renderer, mut scene) = renderer_with(Capabilities::basic(), RendererConfig::default());
    renderer
        .effects_mut()
        .set_enabled(EffectKind::Background, false);
    let mut camera = test_camera();

    renderer.render(&mut scene, &mut camera);

    let backend = renderer.backend();
    assert_eq!(backend.fullscreen_count(ShaderProgram::Background), 0);
    assert!(backend.calls.iter().any(|c| matches!(
        c,
        Call::Clear { flags, .. } if *flags == ClearFlags::COLOR
    )));
    assert_eq!(backend.target_content(renderer.back_target()), Content::Scene(0));
}
