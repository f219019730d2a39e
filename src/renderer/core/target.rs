use super::{Capabilities, RenderBackend, RenderTargetId, TextureId};

/// Storage formats used by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8Unorm,
    Rgba16Float,
    Rgba32Float,
    Depth24PlusStencil8,
    Depth32FloatStencil8,
}

impl PixelFormat {
    #[inline]
    #[must_use]
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth24PlusStencil8 | Self::Depth32FloatStencil8)
    }

    #[inline]
    #[must_use]
    pub fn has_stencil(self) -> bool {
        self.is_depth()
    }

    /// Working color format of the effect chain: half float when the backend
    /// can render into it, 8-bit otherwise.
    #[inline]
    #[must_use]
    pub fn chain_color(capabilities: &Capabilities) -> Self {
        if capabilities.float_color_attachments {
            Self::Rgba16Float
        } else {
            Self::Rgba8Unorm
        }
    }

    /// Bytes per texel for color formats; depth formats report 4.
    #[must_use]
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba8Unorm | Self::Depth24PlusStencil8 => 4,
            Self::Rgba16Float | Self::Depth32FloatStencil8 => 8,
            Self::Rgba32Float => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

/// Description of a backend texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub sample_count: u32,
    pub filter: FilterMode,
    pub label: &'static str,
}

impl TextureDesc {
    #[must_use]
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            sample_count: 1,
            filter: FilterMode::Nearest,
            label: "",
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_samples(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count.max(1);
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Attachment point on a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color(u32),
    DepthStencil,
}

/// A render target with a single color texture attached at slot 0.
///
/// This is the unit every effect scratch buffer, ping-pong buffer and
/// accumulation buffer is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget2D {
    pub target: RenderTargetId,
    pub texture: TextureId,
}

impl RenderTarget2D {
    pub fn new<B: RenderBackend + ?Sized>(backend: &mut B, desc: TextureDesc) -> Self {
        let texture = backend.create_texture(&desc);
        let target = backend.create_render_target(desc.width, desc.height, desc.label);
        backend.attach(target, Attachment::Color(0), Some(texture));
        Self { target, texture }
    }

    pub fn resize<B: RenderBackend + ?Sized>(&self, backend: &mut B, width: u32, height: u32) {
        backend.resize_render_target(self.target, width, height);
    }

    #[must_use]
    pub fn size<B: RenderBackend + ?Sized>(&self, backend: &B) -> Option<(u32, u32)> {
        backend.render_target_size(self.target)
    }

    /// Releases the target and its color texture.
    pub fn dispose<B: RenderBackend + ?Sized>(self, backend: &mut B) {
        backend.dispose_render_target(self.target);
        backend.dispose_texture(self.texture);
    }
}
