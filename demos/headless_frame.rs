//! Renders a small lit scene through the full post-processing chain without a
//! window and writes the converged frame to a PNG.
//!
//! ```text
//! cargo run --example headless_frame -- out.png
//! ```

use glam::{Mat4, Vec3, Vec4};
use myth_postfx::scene::SceneObject;
use myth_postfx::{
    AdvancedRenderer, Background, BackendSettings, Camera, EffectKind, Light, MeshData,
    RenderBackend, RendererConfig, Scene, SurfaceMaterial, WgpuBackend,
};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

fn build_scene(backend: &mut WgpuBackend) -> Scene {
    let cube = backend.create_geometry(&MeshData::create_box(1.0, 1.0, 1.0));
    let ground = backend.create_geometry(&MeshData::create_plane(12.0, 12.0, 1));

    let mut scene = Scene::new();
    scene.add(
        SceneObject::new(ground, SurfaceMaterial::pbr(Vec3::splat(0.6), 0.8, 0.0))
            .with_transform(Mat4::from_translation(Vec3::new(0.0, -0.5, 0.0))),
    );
    for (i, color) in [
        Vec3::new(0.9, 0.25, 0.2),
        Vec3::new(0.2, 0.8, 0.3),
        Vec3::new(0.25, 0.35, 0.95),
    ]
    .into_iter()
    .enumerate()
    {
        let x = (i as f32 - 1.0) * 1.6;
        scene.add(
            SceneObject::new(cube, SurfaceMaterial::pbr(color, 0.25, 0.5))
                .with_transform(Mat4::from_translation(Vec3::new(x, 0.0, 0.0))),
        );
    }

    scene.add_light(Light::ambient(Vec3::ONE, 0.15));
    scene.add_light(Light::directional(
        Vec3::new(-0.5, -1.0, -0.3),
        Vec3::new(1.0, 0.95, 0.9),
        2.5,
    ));
    scene
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "headless_frame.png".to_string());

    let mut backend = WgpuBackend::headless(&BackendSettings::default())?;
    let mut scene = build_scene(&mut backend);

    let config = RendererConfig {
        taa_samples: 16,
        ..RendererConfig::default()
    };
    let mut renderer = AdvancedRenderer::new(backend, WIDTH, HEIGHT, config)?;
    for kind in [
        EffectKind::Ssao,
        EffectKind::Bloom,
        EffectKind::ToneMapping,
        EffectKind::Vignette,
    ] {
        renderer.effects_mut().set_enabled(kind, true);
    }
    renderer.set_background(Background::Color(Vec4::new(0.05, 0.06, 0.08, 1.0)));

    let mut camera = Camera::perspective(
        50.0_f32.to_radians(),
        WIDTH as f32 / HEIGHT as f32,
        0.1,
        100.0,
    );
    camera.look_at(Vec3::new(3.0, 3.0, 6.0), Vec3::ZERO, Vec3::Y);

    loop {
        renderer.render(&mut scene, &mut camera);
        if renderer.last_frame().converged {
            break;
        }
    }
    log::info!(
        "Converged after {} samples",
        renderer.last_frame().accumulated_samples
    );

    let back_target = renderer.back_target();
    let pixels = renderer.backend_mut().read_pixels(back_target)?;
    let image = image::RgbaImage::from_raw(WIDTH, HEIGHT, pixels)
        .ok_or_else(|| anyhow::anyhow!("readback size mismatch"))?;
    image.save(&output)?;
    println!("Wrote {output}");

    renderer.dispose();
    Ok(())
}
