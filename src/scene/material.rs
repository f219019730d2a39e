use glam::Vec3;

use crate::renderer::core::TextureId;

/// Surface description of a renderable as authored by the application.
///
/// Roughness, metalness and all texture slots are optional: consumers such as
/// the G-buffer substitute fixed defaults for anything missing.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMaterial {
    pub diffuse: Vec3,
    pub opacity: f32,
    pub diffuse_map: Option<TextureId>,
    pub roughness: Option<f32>,
    pub roughness_map: Option<TextureId>,
    pub metalness: Option<f32>,
    pub metalness_map: Option<TextureId>,
    /// Routes the renderable into the transparent render list.
    pub transparent: bool,
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self {
            diffuse: Vec3::ONE,
            opacity: 1.0,
            diffuse_map: None,
            roughness: None,
            roughness_map: None,
            metalness: None,
            metalness_map: None,
            transparent: false,
        }
    }
}

impl SurfaceMaterial {
    #[must_use]
    pub fn new(diffuse: Vec3) -> Self {
        Self {
            diffuse,
            ..Default::default()
        }
    }

    /// Physically-based material with explicit roughness / metalness.
    #[must_use]
    pub fn pbr(diffuse: Vec3, roughness: f32, metalness: f32) -> Self {
        Self {
            diffuse,
            roughness: Some(roughness),
            metalness: Some(metalness),
            ..Default::default()
        }
    }
}
