//! wgpu Backend
//!
//! [`WgpuBackend`] implements [`RenderBackend`] on top of `wgpu`.
//!
//! # Command recording
//!
//! Commands accumulate in a single command encoder that is submitted by
//! [`flush`](RenderBackend::flush). Each draw opens its own render pass on
//! the current target:
//!
//! ```text
//! set_render_target(A)   clear(..)            draw_fullscreen(..)
//!        │                   │                        │
//!        ▼                   ▼                        ▼
//!   current = A     pending_clear = Some    pass(A, load = Clear) + draw
//! ```
//!
//! Clears are deferred and folded into the load operations of the next pass
//! on the same target. Switching targets (or flushing) with a clear still
//! pending records a clear-only pass.
//!
//! # Resource binding
//!
//! Fullscreen programs get a fresh uniform block per draw. Texture slots that
//! are missing, disposed or incompatible with the slot (for example a depth
//! texture in a color slot, or the draw's own attachment) are bound to 1x1
//! fallbacks: opaque white for color slots, far-plane depth for depth slots.

mod context;
mod pipelines;
mod resources;
mod shaders;

pub use context::{BackendSettings, GpuContext};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use slotmap::SlotMap;
use smallvec::SmallVec;
use wgpu::util::DeviceExt;

use self::pipelines::{
    FullscreenKey, GeometryKey, GeometryShading, MAX_DIRECTIONAL_LIGHTS, PipelineCache,
};
use self::resources::{FallbackTextures, GpuGeometry, GpuTarget, GpuTexture};
use self::shaders::{PARAMS_BINDING, PassParams};
use crate::errors::{PostFxError, Result};
use crate::renderer::core::{
    Attachment, BlendMode, Capabilities, ClearFlags, FilterMode, GeometryId, GeometryPass,
    PixelFormat, RenderBackend, RenderTargetId, ShaderProgram, TextureDesc, TextureId, TextureSlot,
    Uniforms,
};
use crate::renderer::gbuffer::{GBufferMaterial, Shading};
use crate::scene::{Camera, GeometryRef, Light, MeshData, RenderScene, Renderable};

// ============================================================================
// Per-draw data
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct PendingClear {
    color: Vec4,
    flags: ClearFlags,
}

impl PendingClear {
    fn color_load(clear: Option<Self>) -> wgpu::LoadOp<wgpu::Color> {
        match clear {
            Some(c) if c.flags.contains(ClearFlags::COLOR) => wgpu::LoadOp::Clear(wgpu::Color {
                r: f64::from(c.color.x),
                g: f64::from(c.color.y),
                b: f64::from(c.color.z),
                a: f64::from(c.color.w),
            }),
            _ => wgpu::LoadOp::Load,
        }
    }

    fn depth_load(clear: Option<Self>) -> wgpu::LoadOp<f32> {
        match clear {
            Some(c) if c.flags.contains(ClearFlags::DEPTH) => wgpu::LoadOp::Clear(1.0),
            _ => wgpu::LoadOp::Load,
        }
    }

    fn stencil_load(clear: Option<Self>) -> wgpu::LoadOp<u32> {
        match clear {
            Some(c) if c.flags.contains(ClearFlags::STENCIL) => wgpu::LoadOp::Clear(0),
            _ => wgpu::LoadOp::Load,
        }
    }
}

/// Views of one render pass, resolved from a target's attachment table.
struct PassAttachments {
    colors: SmallVec<[(wgpu::TextureView, wgpu::TextureFormat); 2]>,
    /// View, format, has stencil.
    depth: Option<(wgpu::TextureView, wgpu::TextureFormat, bool)>,
    samples: u32,
    /// Attachments cannot be sampled by the pass that writes them.
    textures: SmallVec<[TextureId; 3]>,
}

/// GPU image of `geometry.wgsl`'s `DrawParams`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DrawParams {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    view_projection: [[f32; 4]; 4],
    diffuse: [f32; 4],
    surface: [f32; 4],
    maps: [f32; 4],
    ambient: [f32; 4],
    lights: [f32; 4],
    light_directions: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    light_colors: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
}

#[derive(Debug, Clone, Copy, Default)]
struct LightBlock {
    ambient: [f32; 4],
    count: usize,
    directions: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    colors: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
}

impl LightBlock {
    fn from_lights(lights: &[Light]) -> Self {
        let mut block = Self::default();
        let mut ambient = glam::Vec3::ZERO;
        for light in lights {
            match *light {
                Light::Ambient { .. } => ambient += light.radiance(),
                Light::Directional { direction, .. } => {
                    if block.count == MAX_DIRECTIONAL_LIGHTS {
                        log::debug!("Dropping directional light beyond {MAX_DIRECTIONAL_LIGHTS}");
                        continue;
                    }
                    block.directions[block.count] = direction.extend(0.0).to_array();
                    block.colors[block.count] = light.radiance().extend(0.0).to_array();
                    block.count += 1;
                }
            }
        }
        block.ambient = ambient.extend(0.0).to_array();
        block
    }
}

/// Material block shared by forward and G-buffer draws.
#[derive(Debug, Clone, Copy)]
struct DrawMaterial {
    diffuse: Vec4,
    roughness: f32,
    metalness: f32,
    alpha_test: Option<f32>,
    flat: bool,
    maps: [Option<TextureId>; 3],
}

impl DrawMaterial {
    fn forward(renderable: &Renderable) -> Self {
        let m = &renderable.material;
        Self {
            diffuse: m.diffuse.extend(m.opacity),
            roughness: m.roughness.unwrap_or(GBufferMaterial::DEFAULT_ROUGHNESS),
            metalness: m.metalness.unwrap_or(GBufferMaterial::DEFAULT_METALNESS),
            alpha_test: None,
            flat: !renderable.geometry.has_normals(),
            maps: [m.diffuse_map, m.roughness_map, m.metalness_map],
        }
    }

    fn gbuffer(m: &GBufferMaterial) -> Self {
        Self {
            diffuse: m.diffuse.extend(1.0),
            roughness: m.roughness,
            metalness: m.metalness,
            alpha_test: m.alpha_test,
            flat: m.shading == Shading::Flat,
            maps: [m.diffuse_map, m.roughness_map, m.metalness_map],
        }
    }
}

fn forward(items: &[Renderable]) -> Vec<(&Renderable, DrawMaterial)> {
    items
        .iter()
        .map(|r| (r, DrawMaterial::forward(r)))
        .collect()
}

struct PreparedDraw {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    geometry: GeometryId,
}

// ============================================================================
// Backend
// ============================================================================

pub struct WgpuBackend {
    context: GpuContext,
    textures: SlotMap<TextureId, GpuTexture>,
    targets: SlotMap<RenderTargetId, GpuTarget>,
    geometries: SlotMap<GeometryId, GpuGeometry>,
    pipelines: PipelineCache,
    fallback: FallbackTextures,

    encoder: Option<wgpu::CommandEncoder>,
    current: Option<RenderTargetId>,
    pending_clear: Option<PendingClear>,
    screen: Option<RenderTargetId>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.context.adapter_info.name)
            .field("capabilities", &self.context.capabilities)
            .field("textures", &self.textures.len())
            .field("targets", &self.targets.len())
            .field("geometries", &self.geometries.len())
            .finish_non_exhaustive()
    }
}

impl WgpuBackend {
    /// Creates an offscreen backend. Frames are retrieved with
    /// [`read_pixels`](Self::read_pixels).
    pub fn headless(settings: &BackendSettings) -> Result<Self> {
        let context = pollster::block_on(GpuContext::headless(settings))?;
        Self::from_context(context)
    }

    /// Creates a backend presenting to `window`.
    pub fn with_surface<W>(
        window: W,
        width: u32,
        height: u32,
        settings: &BackendSettings,
    ) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        let context = pollster::block_on(GpuContext::with_surface(window, settings, width, height))?;
        Self::from_context(context)
    }

    pub fn from_context(context: GpuContext) -> Result<Self> {
        let pipelines = PipelineCache::new(&context.device)?;
        let fallback = FallbackTextures::new(&context.device, &context.queue);
        Ok(Self {
            context,
            textures: SlotMap::with_key(),
            targets: SlotMap::with_key(),
            geometries: SlotMap::with_key(),
            pipelines,
            fallback,
            encoder: None,
            current: None,
            pending_clear: None,
            screen: None,
        })
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.context.device
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.context.queue
    }

    /// Render pipelines compiled so far.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.pipeline_count()
    }

    pub fn resize_surface(&mut self, width: u32, height: u32) {
        self.context.resize_surface(width, height);
    }

    /// Copies the screen target onto the window surface and presents it.
    pub fn present(&mut self) -> Result<()> {
        let (Some(screen), Some(format)) = (self.screen, self.context.surface_format()) else {
            return Ok(());
        };
        self.flush();

        let Some(state) = &self.context.surface else {
            return Ok(());
        };
        let frame = match state.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(frame)
            | wgpu::CurrentSurfaceTexture::Suboptimal(frame) => frame,
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                self.context.reconfigure_surface();
                return Ok(());
            }
            e => return Err(PostFxError::SurfaceAcquireFailed(format!("{e:?}"))),
        };

        let Some(color) = self.targets.get(screen).and_then(|t| t.get(Attachment::Color(0))) else {
            return Ok(());
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let attachments = PassAttachments {
            colors: smallvec::smallvec![(view, format)],
            depth: None,
            samples: 1,
            textures: SmallVec::new(),
        };
        let uniforms = Uniforms::new().with("t_diffuse", color).with("opacity", 1.0);
        let clear = PendingClear {
            color: Vec4::ZERO,
            flags: ClearFlags::COLOR,
        };
        self.record_fullscreen(
            ShaderProgram::Copy,
            &uniforms,
            BlendMode::Replace,
            &attachments,
            Some(clear),
        );
        self.flush();
        frame.present();
        Ok(())
    }

    /// Reads color 0 of `target` back as tightly packed RGBA8 rows, top row first.
    pub fn read_pixels(&mut self, target: RenderTargetId) -> Result<Vec<u8>> {
        self.flush();

        let texture = self
            .targets
            .get(target)
            .and_then(|t| t.get(Attachment::Color(0)))
            .and_then(|id| self.textures.get(id))
            .ok_or_else(|| PostFxError::Readback("target has no color attachment".to_string()))?;
        if texture.desc.format != PixelFormat::Rgba8Unorm || texture.desc.sample_count != 1 {
            return Err(PostFxError::Readback(format!(
                "cannot read back {:?} x{}",
                texture.desc.format, texture.desc.sample_count
            )));
        }

        let extent = texture.extent();
        let unpadded = extent.width * 4;
        let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let device = &self.context.device;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: u64::from(padded * extent.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback"),
        });
        encoder.copy_texture_to_buffer(
            texture.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(extent.height),
                },
            },
            extent,
        );
        self.context.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = flume::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let mapped = loop {
            device
                .poll(wgpu::PollType::Poll)
                .map_err(|e| PostFxError::Readback(e.to_string()))?;
            match rx.try_recv() {
                Ok(result) => break result,
                Err(flume::TryRecvError::Empty) => std::thread::yield_now(),
                Err(flume::TryRecvError::Disconnected) => {
                    return Err(PostFxError::Readback("map callback dropped".to_string()));
                }
            }
        };
        mapped.map_err(|e| PostFxError::Readback(e.to_string()))?;

        let mut pixels = Vec::with_capacity((unpadded * extent.height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded as usize) {
                pixels.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        buffer.unmap();
        Ok(pixels)
    }

    /// The target created by [`create_screen_target`](RenderBackend::create_screen_target).
    #[inline]
    #[must_use]
    pub fn screen_target(&self) -> Option<RenderTargetId> {
        self.screen
    }

    // ========================================================================
    // Recording
    // ========================================================================

    fn take_encoder(&mut self) -> wgpu::CommandEncoder {
        self.encoder.take().unwrap_or_else(|| {
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("PostFX Commands"),
                })
        })
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(Some(encoder.finish()));
        }
    }

    fn attachments(&self, target: RenderTargetId, with_depth: bool) -> Option<PassAttachments> {
        let t = self.targets.get(target)?;

        let mut textures = SmallVec::new();
        let mut samples = None;
        let mut colors = SmallVec::new();
        for id in t.leading_colors() {
            let Some(texture) = self.textures.get(id) else {
                break;
            };
            samples.get_or_insert(texture.desc.sample_count);
            colors.push((texture.view.clone(), texture.format()));
            textures.push(id);
        }

        let depth = t
            .depth
            .and_then(|id| self.textures.get(id).map(|texture| (id, texture)))
            .filter(|_| with_depth)
            .map(|(id, texture)| {
                samples.get_or_insert(texture.desc.sample_count);
                textures.push(id);
                (
                    texture.view.clone(),
                    texture.format(),
                    texture.desc.format.has_stencil(),
                )
            });

        if colors.is_empty() && depth.is_none() {
            return None;
        }
        Some(PassAttachments {
            colors,
            depth,
            samples: samples.unwrap_or(1),
            textures,
        })
    }

    fn record_pass(
        &mut self,
        label: &str,
        attachments: &PassAttachments,
        clear: Option<PendingClear>,
        record: impl FnOnce(&mut wgpu::RenderPass<'_>, &Self),
    ) {
        let mut encoder = self.take_encoder();
        {
            let color_attachments: SmallVec<[Option<wgpu::RenderPassColorAttachment<'_>>; 2]> =
                attachments
                    .colors
                    .iter()
                    .map(|(view, _)| {
                        Some(wgpu::RenderPassColorAttachment {
                            view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: PendingClear::color_load(clear),
                                store: wgpu::StoreOp::Store,
                            },
                            depth_slice: None,
                        })
                    })
                    .collect();

            let depth_stencil_attachment =
                attachments
                    .depth
                    .as_ref()
                    .map(|(view, _, has_stencil)| wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: PendingClear::depth_load(clear),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: has_stencil.then(|| wgpu::Operations {
                            load: PendingClear::stencil_load(clear),
                            store: wgpu::StoreOp::Store,
                        }),
                    });

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                ..Default::default()
            });
            record(&mut pass, self);
        }
        self.encoder = Some(encoder);
    }

    /// Records the pending clear of the current target as its own pass.
    fn flush_clear(&mut self) {
        let Some(clear) = self.pending_clear.take() else {
            return;
        };
        let Some(attachments) = self.current.and_then(|t| self.attachments(t, true)) else {
            return;
        };
        self.record_pass("Clear", &attachments, Some(clear), |_, _| {});
    }

    fn record_fullscreen(
        &mut self,
        program: ShaderProgram,
        uniforms: &Uniforms,
        blend: BlendMode,
        attachments: &PassAttachments,
        clear: Option<PendingClear>,
    ) {
        let Some(&(_, format)) = attachments.colors.first() else {
            log::warn!("{}: target has no color attachment", program.label());
            return;
        };
        let key = FullscreenKey {
            program,
            format,
            samples: attachments.samples,
            blend,
        };
        let Some(pipeline) = self.pipelines.fullscreen(&self.context.device, key) else {
            return;
        };
        let Some(bind_group) = self.fullscreen_bind_group(program, uniforms, &attachments.textures)
        else {
            return;
        };

        self.record_pass(program.label(), attachments, clear, |pass, _| {
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        });
    }

    fn fullscreen_bind_group(
        &self,
        program: ShaderProgram,
        uniforms: &Uniforms,
        written: &[TextureId],
    ) -> Option<wgpu::BindGroup> {
        let layout = program.layout();
        let bind_group_layout = self.pipelines.bind_group_layout(program)?;
        let device = &self.context.device;

        let params = PassParams::pack(program, uniforms);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(program.label()),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut entries: SmallVec<[wgpu::BindGroupEntry<'_>; 9]> = SmallVec::new();
        entries.push(wgpu::BindGroupEntry {
            binding: PARAMS_BINDING,
            resource: buffer.as_entire_binding(),
        });

        for (slot, &(name, kind)) in layout.textures.iter().enumerate() {
            let requested = uniforms.texture(name);
            let texture = requested
                .filter(|id| !written.contains(id))
                .and_then(|id| self.textures.get(id));

            let (view, sampler) = match kind {
                TextureSlot::Depth => (texture.and_then(|t| t.depth_view.as_ref()), None),
                TextureSlot::Unfiltered => (texture.filter(|t| t.is_color()).map(|t| &t.view), None),
                TextureSlot::Filtered => {
                    let texture = texture.filter(|t| t.is_filterable());
                    let sampler = match texture.map(|t| t.desc.filter) {
                        Some(FilterMode::Nearest) => &self.pipelines.nearest_sampler,
                        _ => &self.pipelines.linear_sampler,
                    };
                    (texture.map(|t| &t.view), Some(sampler))
                }
            };

            if requested.is_some() && view.is_none() {
                log::warn!(
                    "{}: texture '{name}' is missing or cannot be bound here",
                    program.label()
                );
            }
            let view = view.unwrap_or(match kind {
                TextureSlot::Depth => &self.fallback.depth,
                TextureSlot::Filtered | TextureSlot::Unfiltered => &self.fallback.white.view,
            });

            entries.push(wgpu::BindGroupEntry {
                binding: shaders::texture_binding(slot),
                resource: wgpu::BindingResource::TextureView(view),
            });
            if let Some(sampler) = sampler {
                entries.push(wgpu::BindGroupEntry {
                    binding: shaders::sampler_binding(slot),
                    resource: wgpu::BindingResource::Sampler(sampler),
                });
            }
        }

        Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.label()),
            layout: bind_group_layout,
            entries: &entries,
        }))
    }

    /// Material map view, or `None` when the handle cannot be sampled.
    fn map_view(&self, map: Option<TextureId>) -> Option<&wgpu::TextureView> {
        map.and_then(|id| self.textures.get(id))
            .filter(|t| t.is_filterable())
            .map(|t| &t.view)
    }

    fn geometry_bind_group(
        &self,
        renderable: &Renderable,
        material: &DrawMaterial,
        view_projection: Mat4,
        lights: &LightBlock,
    ) -> wgpu::BindGroup {
        let maps = material.maps.map(|m| self.map_view(m));
        let flag = |present: bool| if present { 1.0 } else { 0.0 };

        let model = renderable.world_matrix;
        let params = DrawParams {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            view_projection: view_projection.to_cols_array_2d(),
            diffuse: material.diffuse.to_array(),
            surface: [
                material.roughness,
                material.metalness,
                material.alpha_test.unwrap_or(-1.0),
                flag(material.flat),
            ],
            maps: [
                flag(maps[0].is_some()),
                flag(maps[1].is_some()),
                flag(maps[2].is_some()),
                0.0,
            ],
            ambient: lights.ambient,
            lights: [lights.count as f32, 0.0, 0.0, 0.0],
            light_directions: lights.directions,
            light_colors: lights.colors,
        };

        let device = &self.context.device;
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Draw Params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let white = &self.fallback.white.view;

        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw BindGroup"),
            layout: self.pipelines.geometry_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(maps[0].unwrap_or(white)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(maps[1].unwrap_or(white)),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(maps[2].unwrap_or(white)),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.pipelines.material_sampler),
                },
            ],
        })
    }

    /// Draws batches of renderables into the current target in one pass.
    fn draw_geometry(
        &mut self,
        label: &str,
        batches: &[(GeometryShading, Vec<(&Renderable, DrawMaterial)>)],
        camera: &Camera,
        lights: &LightBlock,
    ) {
        let Some(target) = self.current else {
            log::warn!("{label}: no render target set");
            return;
        };
        let Some(attachments) = self.attachments(target, true) else {
            log::warn!("{label}: render target has no attachments");
            return;
        };

        let view_projection = camera.view_projection();
        let mut prepared = Vec::new();
        for (shading, draws) in batches {
            if draws.is_empty() {
                continue;
            }
            if shading.color_targets() != attachments.colors.len() {
                log::warn!(
                    "{label}: program writes {} color targets, target has {}",
                    shading.color_targets(),
                    attachments.colors.len()
                );
                continue;
            }

            let key = GeometryKey {
                shading: *shading,
                colors: attachments.colors.iter().map(|(_, f)| *f).collect(),
                depth: attachments.depth.as_ref().map(|(_, f, _)| *f),
                samples: attachments.samples,
            };
            let pipeline = self.pipelines.geometry(&self.context.device, &key);

            for (renderable, material) in draws {
                let id = renderable.geometry.id;
                if self.geometries.get(id).is_none_or(GpuGeometry::is_empty) {
                    continue;
                }
                prepared.push(PreparedDraw {
                    pipeline: pipeline.clone(),
                    bind_group: self.geometry_bind_group(
                        renderable,
                        material,
                        view_projection,
                        lights,
                    ),
                    geometry: id,
                });
            }
        }

        let clear = self.pending_clear.take();
        self.record_pass(label, &attachments, clear, |pass, this| {
            for draw in &prepared {
                let Some(geometry) = this.geometries.get(draw.geometry) else {
                    continue;
                };
                pass.set_pipeline(&draw.pipeline);
                pass.set_bind_group(0, &draw.bind_group, &[]);
                pass.set_vertex_buffer(0, geometry.positions.slice(..));
                pass.set_vertex_buffer(1, geometry.normals.slice(..));
                pass.set_vertex_buffer(2, geometry.uvs.slice(..));
                match &geometry.indices {
                    Some((indices, count)) => {
                        pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                        pass.draw_indexed(0..*count, 0, 0..1);
                    }
                    None => pass.draw(0..geometry.vertex_count, 0..1),
                }
            }
        });
    }

    fn reallocate(&mut self, texture: TextureId, desc: TextureDesc) {
        let device = &self.context.device;
        if let Some(slot) = self.textures.get_mut(texture) {
            *slot = GpuTexture::new(device, desc);
        }
    }
}

// ============================================================================
// RenderBackend
// ============================================================================

impl RenderBackend for WgpuBackend {
    fn capabilities(&self) -> &Capabilities {
        &self.context.capabilities
    }

    // ---- Textures ----

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        self.textures.insert(GpuTexture::new(&self.context.device, *desc))
    }

    fn write_texture(&mut self, texture: TextureId, data: &[u8]) {
        let Some(tex) = self.textures.get(texture) else {
            log::warn!("write_texture: unknown texture");
            return;
        };
        if !tex.is_color() {
            log::warn!("write_texture: {:?} cannot be written", tex.desc.format);
            return;
        }
        let bytes_per_row = tex.desc.width * tex.desc.format.bytes_per_pixel();
        let expected = (bytes_per_row * tex.desc.height) as usize;
        if data.len() != expected {
            log::warn!(
                "write_texture: expected {expected} bytes for '{}', got {}",
                tex.desc.label,
                data.len()
            );
            return;
        }
        let (handle, extent, height) = (tex.texture.clone(), tex.extent(), tex.desc.height);

        // Commands recorded so far must observe the old contents.
        self.submit();
        self.context.queue.write_texture(
            handle.as_image_copy(),
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
            extent,
        );
    }

    fn set_texture_format(&mut self, texture: TextureId, format: PixelFormat) {
        if let Some(desc) = self.texture_desc(texture)
            && desc.format != format
        {
            self.reallocate(texture, TextureDesc { format, ..desc });
        }
    }

    fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc> {
        self.textures.get(texture).map(|t| t.desc)
    }

    fn resize_texture(&mut self, texture: TextureId, width: u32, height: u32) {
        if let Some(desc) = self.texture_desc(texture)
            && desc.size() != (width, height)
        {
            self.reallocate(
                texture,
                TextureDesc {
                    width,
                    height,
                    ..desc
                },
            );
        }
    }

    fn dispose_texture(&mut self, texture: TextureId) {
        self.textures.remove(texture);
    }

    // ---- Render targets ----

    fn create_render_target(
        &mut self,
        width: u32,
        height: u32,
        label: &'static str,
    ) -> RenderTargetId {
        self.targets.insert(GpuTarget::new(width, height, label))
    }

    fn create_screen_target(&mut self, width: u32, height: u32) -> RenderTargetId {
        let color = self.create_texture(
            &TextureDesc::new(width, height, PixelFormat::Rgba8Unorm)
                .with_filter(FilterMode::Linear)
                .with_label("Screen Color"),
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
        if let Some(t) = self.targets.get_mut(target) {
            t.set(attachment, texture);
        }
    }

    fn attachment(&self, target: RenderTargetId, attachment: Attachment) -> Option<TextureId> {
        self.targets.get(target)?.get(attachment)
    }

    fn resize_render_target(&mut self, target: RenderTargetId, width: u32, height: u32) {
        let Some(t) = self.targets.get_mut(target) else {
            return;
        };
        t.width = width;
        t.height = height;
        let attached: SmallVec<[TextureId; 3]> = t.attached().collect();
        for texture in attached {
            self.resize_texture(texture, width, height);
        }
    }

    fn render_target_size(&self, target: RenderTargetId) -> Option<(u32, u32)> {
        self.targets.get(target).map(|t| (t.width, t.height))
    }

    fn dispose_render_target(&mut self, target: RenderTargetId) {
        if self.current == Some(target) {
            self.flush_clear();
            self.current = None;
        }
        if self.screen == Some(target) {
            self.screen = None;
        }
        if let Some(t) = self.targets.remove(target) {
            log::trace!("Disposed render target '{}'", t.label);
        }
    }

    // ---- Geometry ----

    fn create_geometry(&mut self, mesh: &MeshData) -> GeometryRef {
        let id = self
            .geometries
            .insert(GpuGeometry::new(&self.context.device, mesh));
        GeometryRef {
            id,
            attributes: mesh.attributes(),
        }
    }

    // ---- Commands ----

    fn set_render_target(&mut self, target: RenderTargetId) {
        if self.current == Some(target) {
            return;
        }
        self.flush_clear();
        if !self.targets.contains_key(target) {
            log::warn!("set_render_target: unknown render target");
        }
        self.current = Some(target);
    }

    fn current_render_target(&self) -> Option<RenderTargetId> {
        self.current
    }

    fn clear(&mut self, color: Vec4, flags: ClearFlags) {
        if self.current.is_none() {
            log::warn!("clear: no render target set");
            return;
        }
        self.pending_clear = Some(match self.pending_clear {
            Some(prev) => PendingClear {
                color: if flags.contains(ClearFlags::COLOR) {
                    color
                } else {
                    prev.color
                },
                flags: prev.flags | flags,
            },
            None => PendingClear { color, flags },
        });
    }

    fn draw_fullscreen(&mut self, program: ShaderProgram, uniforms: &Uniforms, blend: BlendMode) {
        let Some(target) = self.current else {
            log::warn!("{}: no render target set", program.label());
            return;
        };
        // Fullscreen passes only bind color 0.
        if self
            .pending_clear
            .is_some_and(|c| c.flags.intersects(ClearFlags::DEPTH_STENCIL))
        {
            self.flush_clear();
        }
        let Some(mut attachments) = self.attachments(target, false) else {
            log::warn!("{}: render target has no attachments", program.label());
            return;
        };
        attachments.colors.truncate(1);
        let clear = self.pending_clear.take();
        self.record_fullscreen(program, uniforms, blend, &attachments, clear);
    }

    fn draw_renderables(&mut self, pass: &GeometryPass<'_>) {
        let draws: Vec<_> = pass
            .draws()
            .map(|(renderable, material)| (renderable, DrawMaterial::gbuffer(&material)))
            .collect();
        self.draw_geometry(
            pass.program.label(),
            &[(GeometryShading::GBuffer(pass.program), draws)],
            pass.camera,
            &LightBlock::default(),
        );
    }

    fn render_scene(&mut self, scene: &dyn RenderScene, camera: &Camera) {
        let list = scene.render_list();
        let lights = LightBlock::from_lights(scene.lights());
        self.draw_geometry(
            "Forward",
            &[
                (
                    GeometryShading::Forward { transparent: false },
                    forward(&list.opaque),
                ),
                (
                    GeometryShading::Forward { transparent: true },
                    forward(&list.transparent),
                ),
            ],
            camera,
            &lights,
        );
    }

    fn blit(&mut self, src: RenderTargetId, dst: RenderTargetId) {
        self.flush_clear();

        let color0 = |target| {
            self.targets
                .get(target)
                .and_then(|t: &GpuTarget| t.get(Attachment::Color(0)))
        };
        let (Some(src_id), Some(dst_id)) = (color0(src), color0(dst)) else {
            log::warn!("blit: source or destination has no color attachment");
            return;
        };
        let (Some(s), Some(d)) = (self.textures.get(src_id), self.textures.get(dst_id)) else {
            return;
        };

        let same_shape = s.desc.format == d.desc.format && s.desc.size() == d.desc.size();
        let (src_texture, src_view, src_desc, extent) =
            (s.texture.clone(), s.view.clone(), s.desc, s.extent());
        let (dst_texture, dst_view, dst_desc) = (d.texture.clone(), d.view.clone(), d.desc);

        if src_desc.sample_count > 1 {
            if !same_shape || dst_desc.sample_count != 1 {
                log::warn!(
                    "blit: cannot resolve {:?} x{} into {:?} x{}",
                    src_desc.format,
                    src_desc.sample_count,
                    dst_desc.format,
                    dst_desc.sample_count
                );
                return;
            }
            let mut encoder = self.take_encoder();
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Resolve"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &src_view,
                    resolve_target: Some(&dst_view),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                ..Default::default()
            });
            self.encoder = Some(encoder);
        } else if same_shape && dst_desc.sample_count == 1 {
            let mut encoder = self.take_encoder();
            encoder.copy_texture_to_texture(
                src_texture.as_image_copy(),
                dst_texture.as_image_copy(),
                extent,
            );
            self.encoder = Some(encoder);
        } else if let Some(mut attachments) = self.attachments(dst, false) {
            attachments.colors.truncate(1);
            let uniforms = Uniforms::new()
                .with("t_diffuse", src_id)
                .with("opacity", 1.0);
            self.record_fullscreen(
                ShaderProgram::Copy,
                &uniforms,
                BlendMode::Replace,
                &attachments,
                None,
            );
        }
    }

    fn flush(&mut self) {
        self.flush_clear();
        self.submit();
    }
}
