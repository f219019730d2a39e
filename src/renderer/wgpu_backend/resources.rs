//! GPU-side storage behind the backend handles.

use smallvec::SmallVec;
use wgpu::util::DeviceExt;

use crate::renderer::core::{Attachment, PixelFormat, TextureDesc, TextureId};
use crate::scene::MeshData;

#[must_use]
pub(super) fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        PixelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        PixelFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
        PixelFormat::Depth32FloatStencil8 => wgpu::TextureFormat::Depth32FloatStencil8,
    }
}

// ============================================================================
// Textures
// ============================================================================

pub(super) struct GpuTexture {
    pub desc: TextureDesc,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    /// Depth aspect only, for sampling depth/stencil textures.
    pub depth_view: Option<wgpu::TextureView>,
}

impl GpuTexture {
    pub fn new(device: &wgpu::Device, desc: TextureDesc) -> Self {
        let format = texture_format(desc.format);
        let usage = if desc.sample_count > 1 {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        } else if desc.format.is_depth() {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        } else {
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: (!desc.label.is_empty()).then_some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: desc.sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = (desc.format.is_depth() && desc.sample_count == 1).then(|| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                aspect: wgpu::TextureAspect::DepthOnly,
                ..Default::default()
            })
        });

        Self {
            desc,
            texture,
            view,
            depth_view,
        }
    }

    /// Single-sampled color texture that a filtering sampler may read.
    #[inline]
    pub fn is_filterable(&self) -> bool {
        self.is_color() && self.desc.format != PixelFormat::Rgba32Float
    }

    #[inline]
    pub fn is_color(&self) -> bool {
        !self.desc.format.is_depth() && self.desc.sample_count == 1
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        texture_format(self.desc.format)
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        self.texture.size()
    }
}

/// Bound in place of missing or incompatible textures.
pub(super) struct FallbackTextures {
    /// Opaque white, 1x1.
    pub white: GpuTexture,
    /// Far-plane depth, 1x1.
    pub depth: wgpu::TextureView,
}

impl FallbackTextures {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let white = GpuTexture::new(
            device,
            TextureDesc::new(1, 1, PixelFormat::Rgba8Unorm).with_label("Fallback White"),
        );
        queue.write_texture(
            white.texture.as_image_copy(),
            &[255u8; 4],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            white.extent(),
        );

        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Fallback Depth"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Depth textures cannot be written by copies; clear once instead.
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Fallback Depth Clear"),
        });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Fallback Depth Clear"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
        }
        queue.submit(Some(encoder.finish()));

        Self { white, depth }
    }
}

// ============================================================================
// Render targets
// ============================================================================

/// Attachment table of a render target. Textures are referenced, not owned.
pub(super) struct GpuTarget {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub colors: SmallVec<[Option<TextureId>; 2]>,
    pub depth: Option<TextureId>,
}

impl GpuTarget {
    pub fn new(width: u32, height: u32, label: &'static str) -> Self {
        Self {
            label,
            width,
            height,
            colors: SmallVec::new(),
            depth: None,
        }
    }

    pub fn get(&self, attachment: Attachment) -> Option<TextureId> {
        match attachment {
            Attachment::Color(index) => self.colors.get(index as usize).copied().flatten(),
            Attachment::DepthStencil => self.depth,
        }
    }

    pub fn set(&mut self, attachment: Attachment, texture: Option<TextureId>) {
        match attachment {
            Attachment::Color(index) => {
                let index = index as usize;
                if self.colors.len() <= index {
                    self.colors.resize(index + 1, None);
                }
                self.colors[index] = texture;
                while self.colors.last().is_some_and(Option::is_none) {
                    self.colors.pop();
                }
            }
            Attachment::DepthStencil => self.depth = texture,
        }
    }

    /// Color attachments from slot 0 up to the first gap.
    pub fn leading_colors(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.colors.iter().map_while(|c| *c)
    }

    pub fn attached(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.colors.iter().flatten().copied().chain(self.depth)
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Uploaded mesh. Absent normals / uvs are zero-filled so that every mesh
/// binds the same vertex layout.
pub(super) struct GpuGeometry {
    pub positions: wgpu::Buffer,
    pub normals: wgpu::Buffer,
    pub uvs: wgpu::Buffer,
    pub indices: Option<(wgpu::Buffer, u32)>,
    pub vertex_count: u32,
}

impl GpuGeometry {
    pub fn new(device: &wgpu::Device, mesh: &MeshData) -> Self {
        let count = mesh.vertex_count();
        let zero_normals;
        let normals: &[[f32; 3]] = if let Some(normals) = &mesh.normals {
            normals
        } else {
            zero_normals = vec![[0.0f32; 3]; count];
            &zero_normals
        };
        let zero_uvs;
        let uvs: &[[f32; 2]] = if let Some(uvs) = &mesh.uvs {
            uvs
        } else {
            zero_uvs = vec![[0.0f32; 2]; count];
            &zero_uvs
        };

        let indices = mesh.indices.as_ref().filter(|i| !i.is_empty()).map(|indices| {
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Indices"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            (buffer, indices.len() as u32)
        });

        Self {
            positions: vertex_buffer(device, "Mesh Positions", bytemuck::cast_slice(&mesh.positions)),
            normals: vertex_buffer(device, "Mesh Normals", bytemuck::cast_slice(normals)),
            uvs: vertex_buffer(device, "Mesh UVs", bytemuck::cast_slice(uvs)),
            indices,
            vertex_count: count as u32,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }
}

fn vertex_buffer(device: &wgpu::Device, label: &str, contents: &[u8]) -> wgpu::Buffer {
    // Zero-sized vertex buffers cannot be bound.
    let padding = [0u8; 16];
    let contents = if contents.is_empty() { &padding[..] } else { contents };
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage: wgpu::BufferUsages::VERTEX,
    })
}

/// Vertex buffer layouts matching `geometry.wgsl`'s `VertexInput`.
pub(super) const VERTEX_LAYOUTS: [wgpu::VertexBufferLayout<'static>; 3] = [
    wgpu::VertexBufferLayout {
        array_stride: 12,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x3,
            offset: 0,
            shader_location: 0,
        }],
    },
    wgpu::VertexBufferLayout {
        array_stride: 12,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x3,
            offset: 0,
            shader_location: 1,
        }],
    },
    wgpu::VertexBufferLayout {
        array_stride: 8,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: 2,
        }],
    },
];
