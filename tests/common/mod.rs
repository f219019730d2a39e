//! Shared test doubles.
//!
//! - [`RecordingBackend`]: an in-memory [`RenderBackend`] that keeps texture
//!   descriptions, attachment tables and a log of every command. Each color
//!   texture carries a [`Content`] value describing how its pixels were
//!   produced, so tests can assert on the data flow of a frame.
//! - [`RecordingScene`]: a [`Scene`] wrapper logging the collaborator calls.

#![allow(dead_code)]

use glam::{Mat4, Vec3, Vec4};
use slotmap::SlotMap;

use myth_postfx::renderer::core::{
    BlendMode, GeometryPass, GeometryProgram, ShaderProgram, Uniforms,
};
use myth_postfx::renderer::gbuffer::GBufferMaterial;
use myth_postfx::scene::{
    GeometryRef, Light, RenderList, SceneObject, SurfaceMaterial, VertexAttributes,
};
use myth_postfx::{
    AdvancedRenderer, Attachment, Camera, Capabilities, ClearFlags, GeometryId, MeshData,
    PixelFormat, RenderBackend, RenderScene, RenderTargetId, RendererConfig, Scene, TextureDesc,
    TextureId,
};

// ============================================================================
// Content provenance
// ============================================================================

/// How the pixels of a color texture came to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Undefined,
    Uploaded,
    Cleared(Vec4),
    /// Forward scene render number `n` (0-based, counted per backend).
    Scene(u32),
    GBuffer(GeometryProgram),
    Program {
        program: ShaderProgram,
        inputs: Vec<(&'static str, Content)>,
    },
}

impl Content {
    /// The content bound to `name` when this is a fullscreen program result.
    pub fn input(&self, name: &str) -> Option<&Content> {
        match self {
            Self::Program { inputs, .. } => inputs.iter().find(|(n, _)| *n == name).map(|(_, c)| c),
            _ => None,
        }
    }

    pub fn program(&self) -> Option<ShaderProgram> {
        match self {
            Self::Program { program, .. } => Some(*program),
            _ => None,
        }
    }
}

// ============================================================================
// Command log
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetRenderTarget(RenderTargetId),
    Clear {
        target: RenderTargetId,
        color: Vec4,
        flags: ClearFlags,
    },
    Fullscreen {
        target: RenderTargetId,
        program: ShaderProgram,
        uniforms: Uniforms,
        blend: BlendMode,
    },
    Renderables {
        target: RenderTargetId,
        program: GeometryProgram,
        materials: Vec<GBufferMaterial>,
    },
    RenderScene {
        target: RenderTargetId,
        projection: Mat4,
        opaque: usize,
        transparent: usize,
    },
    Blit {
        src: RenderTargetId,
        dst: RenderTargetId,
    },
    Flush,
}

#[derive(Debug, Clone)]
pub struct TextureRecord {
    pub desc: TextureDesc,
    pub content: Content,
}

#[derive(Debug, Clone)]
pub struct TargetRecord {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub colors: Vec<Option<TextureId>>,
    pub depth: Option<TextureId>,
}

// ============================================================================
// Backend
// ============================================================================

pub struct RecordingBackend {
    pub capabilities: Capabilities,
    pub textures: SlotMap<TextureId, TextureRecord>,
    pub targets: SlotMap<RenderTargetId, TargetRecord>,
    pub geometries: SlotMap<GeometryId, VertexAttributes>,
    pub calls: Vec<Call>,
    pub screen: Option<RenderTargetId>,
    current: Option<RenderTargetId>,
    scene_renders: u32,
}

impl RecordingBackend {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            textures: SlotMap::with_key(),
            targets: SlotMap::with_key(),
            geometries: SlotMap::with_key(),
            calls: Vec::new(),
            screen: None,
            current: None,
            scene_renders: 0,
        }
    }

    pub fn full() -> Self {
        Self::new(Capabilities::full())
    }

    pub fn content(&self, texture: TextureId) -> Content {
        self.textures
            .get(texture)
            .map_or(Content::Undefined, |t| t.content.clone())
    }

    /// Content of color 0 of `target`.
    pub fn target_content(&self, target: RenderTargetId) -> Content {
        self.attachment(target, Attachment::Color(0))
            .map_or(Content::Undefined, |t| self.content(t))
    }

    pub fn texture_by_label(&self, label: &str) -> Option<TextureId> {
        self.textures
            .iter()
            .find(|(_, t)| t.desc.label == label)
            .map(|(id, _)| id)
    }

    /// The target that has `texture` at color attachment `index`.
    pub fn target_with_color(&self, texture: TextureId, index: usize) -> Option<RenderTargetId> {
        self.targets
            .iter()
            .find(|(_, t)| t.colors.get(index).copied().flatten() == Some(texture))
            .map(|(id, _)| id)
    }

    pub fn fullscreen_count(&self, program: ShaderProgram) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Fullscreen { program: p, .. } if *p == program))
            .count()
    }

    /// Uniforms of every draw of `program`, in order.
    pub fn fullscreen_uniforms(&self, program: ShaderProgram) -> Vec<Uniforms> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Fullscreen {
                    program: p,
                    uniforms,
                    ..
                } if *p == program => Some(uniforms.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn scene_render_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::RenderScene { .. }))
            .count()
    }

    pub fn geometry_passes(&self) -> Vec<(GeometryProgram, Vec<GBufferMaterial>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Renderables {
                    program, materials, ..
                } => Some((*program, materials.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn write_color(&mut self, content: &Content) {
        let Some(target) = self.current.and_then(|t| self.targets.get(t)) else {
            return;
        };
        let colors: Vec<TextureId> = target.colors.iter().flatten().copied().collect();
        for id in colors {
            if let Some(texture) = self.textures.get_mut(id) {
                texture.content = content.clone();
            }
        }
    }
}

impl RenderBackend for RecordingBackend {
    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        self.textures.insert(TextureRecord {
            desc: *desc,
            content: Content::Undefined,
        })
    }

    fn write_texture(&mut self, texture: TextureId, data: &[u8]) {
        if let Some(t) = self.textures.get_mut(texture) {
            let expected = t.desc.width * t.desc.height * t.desc.format.bytes_per_pixel();
            assert_eq!(data.len(), expected as usize, "write_texture size mismatch");
            t.content = Content::Uploaded;
        }
    }

    fn set_texture_format(&mut self, texture: TextureId, format: PixelFormat) {
        if let Some(t) = self.textures.get_mut(texture) {
            t.desc.format = format;
        }
    }

    fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc> {
        self.textures.get(texture).map(|t| t.desc)
    }

    fn resize_texture(&mut self, texture: TextureId, width: u32, height: u32) {
        if let Some(t) = self.textures.get_mut(texture) {
            t.desc.width = width;
            t.desc.height = height;
        }
    }

    fn dispose_texture(&mut self, texture: TextureId) {
        self.textures.remove(texture);
    }

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        label: &'static str,
    ) -> RenderTargetId {
        self.targets.insert(TargetRecord {
            label,
            width,
            height,
            colors: Vec::new(),
            depth: None,
        })
    }

    fn create_screen_target(&mut self, width: u32, height: u32) -> RenderTargetId {
        let color = self.create_texture(
            &TextureDesc::new(width, height, PixelFormat::Rgba8Unorm).with_label("Screen Color"),
        );
        let depth = self.create_texture(
            &TextureDesc::new(width, height, PixelFormat::Depth24PlusStencil8)
                .with_label("Screen Depth"),
        );
        let target = self.create_render_target(width, height, "Screen");
        self.attach(target, Attachment::Color(0), Some(color));
        self.attach(target, Attachment::DepthStencil, Some(depth));
        self.screen = Some(target);
        target
    }

    fn attach(&mut self, target: RenderTargetId, attachment: Attachment, texture: Option<TextureId>) {
        let Some(t) = self.targets.get_mut(target) else {
            return;
        };
        match attachment {
            Attachment::Color(index) => {
                let index = index as usize;
                if t.colors.len() <= index {
                    t.colors.resize(index + 1, None);
                }
                t.colors[index] = texture;
            }
            Attachment::DepthStencil => t.depth = texture,
        }
    }

    fn attachment(&self, target: RenderTargetId, attachment: Attachment) -> Option<TextureId> {
        let t = self.targets.get(target)?;
        match attachment {
            Attachment::Color(index) => t.colors.get(index as usize).copied().flatten(),
            Attachment::DepthStencil => t.depth,
        }
    }

    fn resize_render_target(&mut self, target: RenderTargetId, width: u32, height: u32) {
        let Some(t) = self.targets.get_mut(target) else {
            return;
        };
        t.width = width;
        t.height = height;
        let attached: Vec<TextureId> = t.colors.iter().flatten().copied().chain(t.depth).collect();
        for texture in attached {
            self.resize_texture(texture, width, height);
        }
    }

    fn render_target_size(&self, target: RenderTargetId) -> Option<(u32, u32)> {
        self.targets.get(target).map(|t| (t.width, t.height))
    }

    fn dispose_render_target(&mut self, target: RenderTargetId) {
        self.targets.remove(target);
        if self.current == Some(target) {
            self.current = None;
        }
        if self.screen == Some(target) {
            self.screen = None;
        }
    }

    fn create_geometry(&mut self, mesh: &MeshData) -> GeometryRef {
        let attributes = mesh.attributes();
        GeometryRef {
            id: self.geometries.insert(attributes),
            attributes,
        }
    }

    fn set_render_target(&mut self, target: RenderTargetId) {
        assert!(self.targets.contains_key(target), "unknown render target");
        self.current = Some(target);
        self.calls.push(Call::SetRenderTarget(target));
    }

    fn current_render_target(&self) -> Option<RenderTargetId> {
        self.current
    }

    fn clear(&mut self, color: Vec4, flags: ClearFlags) {
        let target = self.current.expect("clear without a render target");
        if flags.contains(ClearFlags::COLOR) {
            self.write_color(&Content::Cleared(color));
        }
        self.calls.push(Call::Clear {
            target,
            color,
            flags,
        });
    }

    fn draw_fullscreen(&mut self, program: ShaderProgram, uniforms: &Uniforms, blend: BlendMode) {
        let target = self.current.expect("draw without a render target");
        let color0 = self.attachment(target, Attachment::Color(0));
        for (name, texture) in uniforms.textures() {
            assert_ne!(
                Some(texture),
                color0,
                "{program:?} samples '{name}' from its own output"
            );
        }
        let inputs = uniforms
            .textures()
            .map(|(name, texture)| (name, self.content(texture)))
            .collect();
        self.write_color(&Content::Program { program, inputs });
        self.calls.push(Call::Fullscreen {
            target,
            program,
            uniforms: uniforms.clone(),
            blend,
        });
    }

    fn draw_renderables(&mut self, pass: &GeometryPass<'_>) {
        let target = self.current.expect("draw without a render target");
        let materials = pass.draws().map(|(_, material)| material).collect();
        self.write_color(&Content::GBuffer(pass.program));
        self.calls.push(Call::Renderables {
            target,
            program: pass.program,
            materials,
        });
    }

    fn render_scene(&mut self, scene: &dyn RenderScene, camera: &Camera) {
        let target = self.current.expect("render without a render target");
        let n = self.scene_renders;
        self.scene_renders += 1;
        self.write_color(&Content::Scene(n));
        let list = scene.render_list();
        self.calls.push(Call::RenderScene {
            target,
            projection: camera.projection_matrix,
            opaque: list.opaque.len(),
            transparent: list.transparent.len(),
        });
    }

    fn blit(&mut self, src: RenderTargetId, dst: RenderTargetId) {
        let content = self.target_content(src);
        if let Some(texture) = self
            .attachment(dst, Attachment::Color(0))
            .and_then(|t| self.textures.get_mut(t))
        {
            texture.content = content;
        }
        self.calls.push(Call::Blit { src, dst });
    }

    fn flush(&mut self) {
        self.calls.push(Call::Flush);
    }
}

// ============================================================================
// Scene
// ============================================================================

/// A [`Scene`] that records the order of collaborator calls.
pub struct RecordingScene {
    pub scene: Scene,
    pub calls: Vec<&'static str>,
}

impl RecordingScene {
    pub fn new(scene: Scene) -> Self {
        Self {
            scene,
            calls: Vec::new(),
        }
    }
}

impl RenderScene for RecordingScene {
    fn update_transforms(&mut self) {
        self.calls.push("update_transforms");
        self.scene.update_transforms();
    }

    fn update_lights(&mut self) {
        self.calls.push("update_lights");
        self.scene.update_lights();
    }

    fn update_render_list(&mut self, camera: &Camera) {
        self.calls.push("update_render_list");
        self.scene.update_render_list(camera);
    }

    fn render_list(&self) -> &RenderList {
        self.scene.render_list()
    }

    fn lights(&self) -> &[Light] {
        self.scene.lights()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Two lit boxes, one ground plane without normals and one transparent box.
pub fn test_scene(backend: &mut dyn RenderBackend) -> RecordingScene {
    let cube = backend.create_geometry(&MeshData::create_box(1.0, 1.0, 1.0));
    let plane = backend.create_geometry(&MeshData::create_plane(10.0, 10.0, 1).without_normals());

    let mut scene = Scene::new();
    scene.add(
        SceneObject::new(cube, SurfaceMaterial::pbr(Vec3::new(0.8, 0.2, 0.2), 0.3, 0.9))
            .with_transform(Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0))),
    );
    scene.add(
        SceneObject::new(cube, SurfaceMaterial::new(Vec3::ONE))
            .with_transform(Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0))),
    );
    scene.add(SceneObject::new(plane, SurfaceMaterial::new(Vec3::splat(0.5))));
    scene.add(SceneObject::new(
        cube,
        SurfaceMaterial {
            opacity: 0.5,
            transparent: true,
            ..SurfaceMaterial::new(Vec3::new(0.2, 0.2, 0.8))
        },
    ));
    scene.add_light(Light::ambient(Vec3::ONE, 0.2));
    scene.add_light(Light::directional(Vec3::new(-1.0, -1.0, -1.0), Vec3::ONE, 1.0));

    RecordingScene::new(scene)
}

pub fn test_camera() -> Camera {
    let mut camera = Camera::perspective(60.0_f32.to_radians(), 4.0 / 3.0, 0.1, 100.0);
    camera.look_at(Vec3::new(0.0, 2.0, 6.0), Vec3::ZERO, Vec3::Y);
    camera
}

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

pub fn renderer_with(
    capabilities: Capabilities,
    config: RendererConfig,
) -> (AdvancedRenderer<RecordingBackend>, RecordingScene) {
    let mut backend = RecordingBackend::new(capabilities);
    let scene = test_scene(&mut backend);
    let renderer = AdvancedRenderer::new(backend, WIDTH, HEIGHT, config)
        .unwrap_or_else(|e| panic!("renderer construction failed: {e}"));
    (renderer, scene)
}

pub fn renderer() -> (AdvancedRenderer<RecordingBackend>, RecordingScene) {
    renderer_with(Capabilities::full(), RendererConfig::default())
}

/// Configuration without temporal accumulation.
pub fn no_taa() -> RendererConfig {
    RendererConfig {
        taa: false,
        ..RendererConfig::default()
    }
}
