//! Renderer Settings & Render Path Selection
//!
//! [`RenderPath`] decides, once per orchestrator, whether the full
//! post-processing pipeline runs or the pipeline degrades to a single forward
//! pass. [`RendererConfig`] carries the runtime toggles.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use myth_postfx::RendererConfig;
//!
//! // Defaults: TAA on (30 samples), FXAA off, up to 4x MSAA.
//! let config = RendererConfig::default();
//!
//! // Partial documents fill in the remaining defaults.
//! let config: RendererConfig = serde_json::from_str(r#"{ "fxaa": true }"#)?;
//! ```

use serde::{Deserialize, Serialize};

use super::core::Capabilities;

// ---------------------------------------------------------------------------
// RenderPath
// ---------------------------------------------------------------------------

/// Per-frame control flow chosen from the backend's capabilities.
///
/// | Capability            | `BasicForward` | `HighFidelity` |
/// |-----------------------|----------------|----------------|
/// | G-buffer              | ❌             | ✅             |
/// | Effect chain          | Background only| ✅             |
/// | MSAA scene target     | ❌             | ✅             |
/// | Temporal accumulation | ❌             | ✅             |
/// | FXAA / Copy resolve   | ❌             | ✅             |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderPath {
    /// Full pipeline. Requires API version 2 or later.
    #[default]
    HighFidelity,
    /// Background pass plus one direct forward render into the back target.
    BasicForward,
}

impl RenderPath {
    /// Resolves the path for a backend. Version 0 is rejected earlier.
    #[inline]
    #[must_use]
    pub fn resolve(capabilities: &Capabilities) -> Self {
        if capabilities.version >= 2 {
            Self::HighFidelity
        } else {
            Self::BasicForward
        }
    }

    #[inline]
    #[must_use]
    pub fn supports_post_processing(&self) -> bool {
        matches!(self, Self::HighFidelity)
    }
}

// ---------------------------------------------------------------------------
// RendererConfig
// ---------------------------------------------------------------------------

/// Runtime configuration of the [`AdvancedRenderer`](super::AdvancedRenderer).
///
/// | Field              | Description                                   | Default |
/// |--------------------|-----------------------------------------------|---------|
/// | `taa`              | Jittered temporal accumulation                | `true`  |
/// | `fxaa`             | FXAA instead of a plain copy for the resolve  | `false` |
/// | `taa_samples`      | Samples accumulated before convergence        | `30`    |
/// | `max_msaa_samples` | Upper bound for the scene target's MSAA       | `4`     |
///
/// Changing `taa` or `taa_samples` between frames restarts accumulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub taa: bool,
    pub fxaa: bool,
    pub taa_samples: u32,
    pub max_msaa_samples: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            taa: true,
            fxaa: false,
            taa_samples: 30,
            max_msaa_samples: 4,
        }
    }
}
