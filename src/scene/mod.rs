//! Scene collaborator interfaces.
//!
//! The pipeline does not own a scene graph. It consumes anything implementing
//! [`RenderScene`] plus a [`Camera`]. A flat [`Scene`] implementation is
//! provided for demos and tests.

pub mod camera;
pub mod geometry;
pub mod light;
pub mod material;
#[allow(clippy::module_inception)]
pub mod scene;

pub use camera::Camera;
pub use geometry::{GeometryRef, MeshData, VertexAttributes};
pub use light::Light;
pub use material::SurfaceMaterial;
pub use scene::{ObjectId, RenderList, RenderScene, Renderable, Scene, SceneObject};
