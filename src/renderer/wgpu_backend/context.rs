//! wgpu Context
//!
//! [`GpuContext`] holds the device, the queue and (optionally) a configured
//! window surface. It also derives the backend [`Capabilities`] from what the
//! adapter reports.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::errors::{PostFxError, Result};
use crate::renderer::core::Capabilities;

/// Device selection settings.
///
/// | Field | Default | Notes |
/// |-------|---------|-------|
/// | `power_preference` | `HighPerformance` | |
/// | `vsync` | `true` | surface present mode |
/// | `capability_limit` | `None` | caps detected capabilities, e.g. [`Capabilities::basic`] |
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub power_preference: wgpu::PowerPreference,
    pub vsync: bool,
    pub capability_limit: Option<Capabilities>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            vsync: true,
            capability_limit: None,
        }
    }
}

pub(crate) struct SurfaceState {
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
}

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
    pub capabilities: Capabilities,
    pub(crate) surface: Option<SurfaceState>,
}

impl GpuContext {
    /// Offscreen context: frames are read back instead of presented.
    pub async fn headless(settings: &BackendSettings) -> Result<Self> {
        let instance = wgpu::Instance::default();
        Self::create(&instance, None, settings, 0, 0).await
    }

    pub async fn with_surface<W>(
        window: W,
        settings: &BackendSettings,
        width: u32,
        height: u32,
    ) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window)?;
        Self::create(&instance, Some(surface), settings, width, height).await
    }

    async fn create(
        instance: &wgpu::Instance,
        surface: Option<wgpu::Surface<'static>>,
        settings: &BackendSettings,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: settings.power_preference,
                compatible_surface: surface.as_ref(),
                force_fallback_adapter: false,
            })
            .await?;

        let mut capabilities = detect_capabilities(&adapter);
        if let Some(limit) = &settings.capability_limit {
            capabilities = capabilities.intersect(limit);
        }

        let mut required_features = wgpu::Features::empty();
        if capabilities.depth32_stencil8 {
            required_features |= wgpu::Features::DEPTH32FLOAT_STENCIL8;
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("PostFX Device"),
                required_features,
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        let adapter_info = adapter.get_info();
        log::info!(
            "GPU adapter: {} ({:?}), {:?}",
            adapter_info.name,
            adapter_info.backend,
            capabilities
        );

        let surface = match surface {
            Some(surface) => {
                let mut config = surface
                    .get_default_config(&adapter, width.max(1), height.max(1))
                    .ok_or(PostFxError::SurfaceUnsupported)?;

                // Frames are composed in linear 8-bit; present them as-is.
                if let Some(format) = surface
                    .get_capabilities(&adapter)
                    .formats
                    .into_iter()
                    .find(|f| !f.is_srgb())
                {
                    config.format = format;
                }
                config.present_mode = if settings.vsync {
                    wgpu::PresentMode::AutoVsync
                } else {
                    wgpu::PresentMode::AutoNoVsync
                };
                surface.configure(&device, &config);
                Some(SurfaceState { surface, config })
            }
            None => None,
        };

        Ok(Self {
            device,
            queue,
            adapter_info,
            capabilities,
            surface,
        })
    }

    pub fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(state) = &mut self.surface {
            state.config.width = width;
            state.config.height = height;
            state.surface.configure(&self.device, &state.config);
        }
    }

    /// Reconfigures the surface with its current size after it was lost.
    pub(crate) fn reconfigure_surface(&self) {
        if let Some(state) = &self.surface {
            state.surface.configure(&self.device, &state.config);
        }
    }

    #[must_use]
    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.surface.as_ref().map(|s| s.config.format)
    }
}

fn detect_capabilities(adapter: &wgpu::Adapter) -> Capabilities {
    let downlevel = adapter.get_downlevel_capabilities();
    let limits = adapter.limits();

    let half_float = adapter.get_texture_format_features(wgpu::TextureFormat::Rgba16Float);
    let float_color_attachments = half_float
        .allowed_usages
        .contains(wgpu::TextureUsages::RENDER_ATTACHMENT);

    let chain_format = if float_color_attachments {
        wgpu::TextureFormat::Rgba16Float
    } else {
        wgpu::TextureFormat::Rgba8Unorm
    };
    let max_samples = if adapter
        .get_texture_format_features(chain_format)
        .flags
        .contains(wgpu::TextureFormatFeatureFlags::MULTISAMPLE_X4)
    {
        4
    } else {
        1
    };

    Capabilities {
        version: if downlevel.is_webgpu_compliant() { 2 } else { 1 },
        multiple_render_targets: limits.max_color_attachments >= 2,
        float_color_attachments,
        max_samples,
        depth32_stencil8: adapter
            .features()
            .contains(wgpu::Features::DEPTH32FLOAT_STENCIL8),
    }
}
