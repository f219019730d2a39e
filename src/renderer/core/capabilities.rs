/// Immutable snapshot of what the backend's GPU context can do.
///
/// Read once when the orchestrator is built (render path) and once on the first
/// G-buffer update (G-buffer mode). Never changes for the lifetime of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Graphics API generation. `0` means no usable context, `1` is the basic
    /// forward-only tier, `2` and above enable the full pipeline.
    pub version: u32,
    /// Several color attachments can be written in one pass.
    pub multiple_render_targets: bool,
    /// 16/32-bit float textures can be rendered into.
    pub float_color_attachments: bool,
    /// Highest supported MSAA sample count.
    pub max_samples: u32,
    /// `Depth32FloatStencil8` is available for depth/stencil attachments.
    pub depth32_stencil8: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::full()
    }
}

impl Capabilities {
    /// Modern desktop-class context.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            version: 2,
            multiple_render_targets: true,
            float_color_attachments: true,
            max_samples: 4,
            depth32_stencil8: true,
        }
    }

    /// Forward-only context without MRT, float targets or multisampling.
    #[must_use]
    pub const fn basic() -> Self {
        Self {
            version: 1,
            multiple_render_targets: false,
            float_color_attachments: false,
            max_samples: 1,
            depth32_stencil8: false,
        }
    }

    /// Sample count for the scene target, capped by `requested`.
    #[inline]
    #[must_use]
    pub fn msaa_samples(&self, requested: u32) -> u32 {
        // wgpu only accepts 1 or 4 for portable render targets
        if requested >= 4 && self.max_samples >= 4 {
            4
        } else {
            1
        }
    }

    /// What both `self` and `other` support.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            version: self.version.min(other.version),
            multiple_render_targets: self.multiple_render_targets && other.multiple_render_targets,
            float_color_attachments: self.float_color_attachments && other.float_color_attachments,
            max_samples: self.max_samples.min(other.max_samples),
            depth32_stencil8: self.depth32_stencil8 && other.depth32_stencil8,
        }
    }
}
