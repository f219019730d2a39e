//! Pipeline Cache
//!
//! Shader modules and bind group layouts are built once per program when the
//! backend starts. Render pipelines depend on the target they draw into and
//! are created lazily, keyed by program, formats, sample count and blending.

use std::borrow::Cow;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::resources::VERTEX_LAYOUTS;
use super::shaders::{self, PARAMS_BINDING};
use crate::errors::Result;
use crate::renderer::core::{BlendMode, GeometryProgram, ShaderProgram, TextureSlot};

/// Directional lights the forward shader evaluates per draw.
pub(super) const MAX_DIRECTIONAL_LIGHTS: usize = 4;

// ============================================================================
// Keys
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) struct FullscreenKey {
    pub program: ShaderProgram,
    pub format: wgpu::TextureFormat,
    pub samples: u32,
    pub blend: BlendMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum GeometryShading {
    /// Lit forward shading. Transparent draws blend and skip depth writes.
    Forward { transparent: bool },
    GBuffer(GeometryProgram),
}

impl GeometryShading {
    fn entry_point(self) -> &'static str {
        match self {
            Self::Forward { .. } => "fs_forward",
            Self::GBuffer(GeometryProgram::GBufferNormalGlossiness) => "fs_normal_glossiness",
            Self::GBuffer(GeometryProgram::GBufferAlbedoMetalness) => "fs_albedo_metalness",
            Self::GBuffer(GeometryProgram::GBufferMrt) => "fs_mrt",
        }
    }

    /// Color attachments the fragment entry point writes.
    pub fn color_targets(self) -> usize {
        match self {
            Self::Forward { .. } => 1,
            Self::GBuffer(program) => program.color_targets() as usize,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Forward { transparent: false } => "Forward Opaque",
            Self::Forward { transparent: true } => "Forward Transparent",
            Self::GBuffer(program) => program.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct GeometryKey {
    pub shading: GeometryShading,
    pub colors: SmallVec<[wgpu::TextureFormat; 2]>,
    pub depth: Option<wgpu::TextureFormat>,
    pub samples: u32,
}

fn blend_state(blend: BlendMode) -> Option<wgpu::BlendState> {
    match blend {
        BlendMode::Replace => None,
        BlendMode::Alpha => Some(wgpu::BlendState::ALPHA_BLENDING),
    }
}

// ============================================================================
// Cache
// ============================================================================

struct FullscreenProgram {
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

pub(super) struct PipelineCache {
    fullscreen_programs: FxHashMap<ShaderProgram, FullscreenProgram>,
    fullscreen_pipelines: FxHashMap<FullscreenKey, wgpu::RenderPipeline>,

    geometry_module: wgpu::ShaderModule,
    geometry_bind_group_layout: wgpu::BindGroupLayout,
    geometry_pipeline_layout: wgpu::PipelineLayout,
    geometry_pipelines: FxHashMap<GeometryKey, wgpu::RenderPipeline>,

    pub linear_sampler: wgpu::Sampler,
    pub nearest_sampler: wgpu::Sampler,
    /// Repeating sampler for material maps.
    pub material_sampler: wgpu::Sampler,
}

impl PipelineCache {
    pub fn new(device: &wgpu::Device) -> Result<Self> {
        let env = shaders::environment()?;

        let mut fullscreen_programs = FxHashMap::default();
        for program in ShaderProgram::ALL {
            let source = shaders::fullscreen_source(&env, program)?;
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(program.label()),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
            });
            let bind_group_layout = fullscreen_bind_group_layout(device, program);
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(program.label()),
                bind_group_layouts: &[Some(&bind_group_layout)],
                immediate_size: 0,
            });
            fullscreen_programs.insert(
                program,
                FullscreenProgram {
                    module,
                    bind_group_layout,
                    pipeline_layout,
                },
            );
        }

        let geometry_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Geometry Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(shaders::GEOMETRY_SOURCE)),
        });
        let geometry_bind_group_layout = geometry_bind_group_layout(device);
        let geometry_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Geometry Pipeline Layout"),
                bind_group_layouts: &[Some(&geometry_bind_group_layout)],
                immediate_size: 0,
            });

        let clamp_sampler = |label, filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                mag_filter: filter,
                min_filter: filter,
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                ..Default::default()
            })
        };
        let linear_sampler = clamp_sampler("Linear Sampler", wgpu::FilterMode::Linear);
        let nearest_sampler = clamp_sampler("Nearest Sampler", wgpu::FilterMode::Nearest);
        let material_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            ..Default::default()
        });

        Ok(Self {
            fullscreen_programs,
            fullscreen_pipelines: FxHashMap::default(),
            geometry_module,
            geometry_bind_group_layout,
            geometry_pipeline_layout,
            geometry_pipelines: FxHashMap::default(),
            linear_sampler,
            nearest_sampler,
            material_sampler,
        })
    }

    pub fn bind_group_layout(&self, program: ShaderProgram) -> Option<&wgpu::BindGroupLayout> {
        self.fullscreen_programs
            .get(&program)
            .map(|p| &p.bind_group_layout)
    }

    #[inline]
    pub fn geometry_layout(&self) -> &wgpu::BindGroupLayout {
        &self.geometry_bind_group_layout
    }

    pub fn fullscreen(
        &mut self,
        device: &wgpu::Device,
        key: FullscreenKey,
    ) -> Option<wgpu::RenderPipeline> {
        if let Some(pipeline) = self.fullscreen_pipelines.get(&key) {
            return Some(pipeline.clone());
        }

        let program = self.fullscreen_programs.get(&key.program)?;
        log::debug!(
            "Compiling {} pipeline ({:?}, {}x MSAA, {:?})",
            key.program.label(),
            key.format,
            key.samples,
            key.blend
        );

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(key.program.label()),
            layout: Some(&program.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.format,
                    blend: blend_state(key.blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: key.samples,
                ..Default::default()
            },
            multiview_mask: None,
            cache: None,
        });

        self.fullscreen_pipelines.insert(key, pipeline.clone());
        Some(pipeline)
    }

    pub fn geometry(&mut self, device: &wgpu::Device, key: &GeometryKey) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.geometry_pipelines.get(key) {
            return pipeline.clone();
        }

        log::debug!(
            "Compiling {} pipeline ({:?}, depth {:?}, {}x MSAA)",
            key.shading.label(),
            key.colors,
            key.depth,
            key.samples
        );

        let transparent = matches!(key.shading, GeometryShading::Forward { transparent: true });
        let blend = if transparent {
            BlendMode::Alpha
        } else {
            BlendMode::Replace
        };
        let targets: SmallVec<[Option<wgpu::ColorTargetState>; 2]> = key
            .colors
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format,
                    blend: blend_state(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let depth_stencil = key.depth.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: Some(!transparent),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(key.shading.label()),
            layout: Some(&self.geometry_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.geometry_module,
                entry_point: Some("vs_main"),
                buffers: &VERTEX_LAYOUTS,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.geometry_module,
                entry_point: Some(key.shading.entry_point()),
                targets: &targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil,
            multisample: wgpu::MultisampleState {
                count: key.samples,
                ..Default::default()
            },
            multiview_mask: None,
            cache: None,
        });

        self.geometry_pipelines.insert(key.clone(), pipeline.clone());
        pipeline
    }

    /// Number of render pipelines compiled so far.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.fullscreen_pipelines.len() + self.geometry_pipelines.len()
    }
}

// ============================================================================
// Bind group layouts
// ============================================================================

fn fullscreen_bind_group_layout(
    device: &wgpu::Device,
    program: ShaderProgram,
) -> wgpu::BindGroupLayout {
    let layout = program.layout();
    let mut entries: SmallVec<[wgpu::BindGroupLayoutEntry; 9]> = SmallVec::new();

    entries.push(wgpu::BindGroupLayoutEntry {
        binding: PARAMS_BINDING,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    });

    for (slot, (_, kind)) in layout.textures.iter().enumerate() {
        let sample_type = match kind {
            TextureSlot::Filtered => wgpu::TextureSampleType::Float { filterable: true },
            TextureSlot::Unfiltered => wgpu::TextureSampleType::Float { filterable: false },
            TextureSlot::Depth => wgpu::TextureSampleType::Depth,
        };
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: shaders::texture_binding(slot),
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        if *kind == TextureSlot::Filtered {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: shaders::sampler_binding(slot),
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
    }

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(program.label()),
        entries: &entries,
    })
}

fn geometry_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Geometry BindGroup Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            texture(1),
            texture(2),
            texture(3),
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}
