use glam::Vec3;

use crate::renderer::core::TextureId;
use crate::scene::Renderable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Shading {
    #[default]
    Smooth,
    /// Face normals derived from screen-space derivatives.
    Flat,
}

/// Parameters of one renderable in a G-buffer pass.
///
/// Built fresh for every draw from the renderable's own material, so the
/// MRT and dual-pass strategies see exactly the same values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GBufferMaterial {
    pub shading: Shading,
    pub diffuse: Vec3,
    pub diffuse_map: Option<TextureId>,
    /// Fragments whose diffuse-map alpha falls below this are discarded.
    pub alpha_test: Option<f32>,
    pub roughness: f32,
    pub roughness_map: Option<TextureId>,
    pub metalness: f32,
    pub metalness_map: Option<TextureId>,
}

impl GBufferMaterial {
    pub const DEFAULT_ROUGHNESS: f32 = 0.5;
    pub const DEFAULT_METALNESS: f32 = 0.5;
    pub const ALPHA_TEST: f32 = 0.999;

    #[must_use]
    pub fn from_renderable(renderable: &Renderable) -> Self {
        let material = &renderable.material;
        let shading = if renderable.geometry.has_normals() {
            Shading::Smooth
        } else {
            Shading::Flat
        };

        Self {
            shading,
            diffuse: material.diffuse,
            diffuse_map: material.diffuse_map,
            alpha_test: material.diffuse_map.map(|_| Self::ALPHA_TEST),
            roughness: material.roughness.unwrap_or(Self::DEFAULT_ROUGHNESS),
            roughness_map: material.roughness_map,
            metalness: material.metalness.unwrap_or(Self::DEFAULT_METALNESS),
            metalness_map: material.metalness_map,
        }
    }

    #[inline]
    #[must_use]
    pub fn glossiness(&self) -> f32 {
        1.0 - self.roughness
    }
}

/// Visibility predicate shared by every G-buffer pass: geometry without
/// normals cannot contribute to the normal buffer and is skipped.
#[inline]
#[must_use]
pub fn has_normals(renderable: &Renderable) -> bool {
    renderable.geometry.has_normals()
}
