use glam::{Mat4, Vec3};
use slotmap::{SlotMap, new_key_type};

use super::{Camera, GeometryRef, Light, SurfaceMaterial};

new_key_type! {
    /// Handle to an object inserted into a [`Scene`].
    pub struct ObjectId;
}

// ============================================================================
// Collaborator interface
// ============================================================================

/// What the renderer needs from a scene.
///
/// The renderer calls `update_transforms`, `update_lights` and
/// `update_render_list` in that order once per rendered frame, then reads
/// [`render_list`](Self::render_list) from the geometry and scene passes.
pub trait RenderScene {
    fn update_transforms(&mut self);
    fn update_lights(&mut self);
    fn update_render_list(&mut self, camera: &Camera);
    fn render_list(&self) -> &RenderList;
    fn lights(&self) -> &[Light];
}

/// One drawable item after the scene has resolved its world transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Renderable {
    pub geometry: GeometryRef,
    pub material: SurfaceMaterial,
    pub world_matrix: Mat4,
}

/// Renderables split by blending. Transparent items are sorted back-to-front.
#[derive(Debug, Clone, Default)]
pub struct RenderList {
    pub opaque: Vec<Renderable>,
    pub transparent: Vec<Renderable>,
}

impl RenderList {
    pub fn clear(&mut self) {
        self.opaque.clear();
        self.transparent.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }
}

// ============================================================================
// Flat scene
// ============================================================================

#[derive(Debug, Clone)]
pub struct SceneObject {
    pub geometry: GeometryRef,
    pub material: SurfaceMaterial,
    /// Transform relative to `parent`, or to the world when there is none.
    pub transform: Mat4,
    pub parent: Option<ObjectId>,
    pub visible: bool,
    world_matrix: Mat4,
}

impl SceneObject {
    #[must_use]
    pub fn new(geometry: GeometryRef, material: SurfaceMaterial) -> Self {
        Self {
            geometry,
            material,
            transform: Mat4::IDENTITY,
            parent: None,
            visible: true,
            world_matrix: Mat4::IDENTITY,
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// World transform as of the last `update_transforms`.
    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> Mat4 {
        self.world_matrix
    }
}

/// Minimal scene: a slot map of objects with optional parenting and a light list.
#[derive(Debug, Default)]
pub struct Scene {
    objects: SlotMap<ObjectId, SceneObject>,
    lights: Vec<Light>,
    active_lights: Vec<Light>,
    render_list: RenderList,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: SceneObject) -> ObjectId {
        self.objects.insert(object)
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        self.objects.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(id)
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn clear_lights(&mut self) {
        self.lights.clear();
    }

    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Walks the parent chain. A chain longer than the object count can only
    /// be a cycle, and is cut there.
    fn resolve_world(&self, id: ObjectId) -> Mat4 {
        let mut world = Mat4::IDENTITY;
        let mut current = Some(id);
        let mut depth = 0;
        while let Some(key) = current {
            let Some(object) = self.objects.get(key) else {
                break;
            };
            world = object.transform * world;
            current = object.parent;
            depth += 1;
            if depth > self.objects.len() {
                log::warn!("Parent cycle detected while resolving scene transforms");
                break;
            }
        }
        world
    }
}

impl RenderScene for Scene {
    fn update_transforms(&mut self) {
        let worlds: Vec<(ObjectId, Mat4)> = self
            .objects
            .keys()
            .map(|id| (id, self.resolve_world(id)))
            .collect();
        for (id, world) in worlds {
            if let Some(object) = self.objects.get_mut(id) {
                object.world_matrix = world;
            }
        }
    }

    fn update_lights(&mut self) {
        self.active_lights.clear();
        self.active_lights.extend(
            self.lights
                .iter()
                .filter(|light| light.radiance() != Vec3::ZERO)
                .copied(),
        );
    }

    fn update_render_list(&mut self, camera: &Camera) {
        let view = camera.view_matrix();
        self.render_list.clear();

        let mut transparent: Vec<(f32, Renderable)> = Vec::new();
        for object in self.objects.values().filter(|o| o.visible) {
            let renderable = Renderable {
                geometry: object.geometry,
                material: object.material.clone(),
                world_matrix: object.world_matrix,
            };
            if object.material.transparent {
                let view_z = view.transform_point3(object.world_matrix.w_axis.truncate()).z;
                transparent.push((view_z, renderable));
            } else {
                self.render_list.opaque.push(renderable);
            }
        }

        // Camera looks down -Z: farthest has the most negative view z.
        transparent.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.render_list
            .transparent
            .extend(transparent.into_iter().map(|(_, r)| r));
    }

    fn render_list(&self) -> &RenderList {
        &self.render_list
    }

    fn lights(&self) -> &[Light] {
        &self.active_lights
    }
}
