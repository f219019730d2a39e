//! CPU-side mesh data and the backend geometry reference carried by renderables.

use bitflags::bitflags;

use crate::renderer::core::GeometryId;

bitflags! {
    /// Vertex attributes present on an uploaded geometry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VertexAttributes: u8 {
        const POSITION = 1 << 0;
        const NORMAL   = 1 << 1;
        const UV       = 1 << 2;
    }
}

/// Handle to geometry that has been uploaded to a backend, plus the attribute
/// set the pipeline needs to decide pass eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryRef {
    pub id: GeometryId,
    pub attributes: VertexAttributes,
}

impl GeometryRef {
    #[inline]
    #[must_use]
    pub fn has_normals(&self) -> bool {
        self.attributes.contains(VertexAttributes::NORMAL)
    }

    #[inline]
    #[must_use]
    pub fn has_uvs(&self) -> bool {
        self.attributes.contains(VertexAttributes::UV)
    }
}

/// Plain vertex data ready for upload via
/// [`RenderBackend::create_geometry`](crate::renderer::core::RenderBackend::create_geometry).
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub uvs: Option<Vec<[f32; 2]>>,
    pub indices: Option<Vec<u32>>,
}

impl MeshData {
    #[must_use]
    pub fn attributes(&self) -> VertexAttributes {
        let mut attributes = VertexAttributes::POSITION;
        if self.normals.is_some() {
            attributes |= VertexAttributes::NORMAL;
        }
        if self.uvs.is_some() {
            attributes |= VertexAttributes::UV;
        }
        attributes
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Axis-aligned box centered at the origin, 4 vertices per face.
    #[must_use]
    pub fn create_box(width: f32, height: f32, depth: f32) -> Self {
        let (w, h, d) = (width / 2.0, height / 2.0, depth / 2.0);

        // (normal, u axis, v axis) per face
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut uvs = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (n, u, v) in faces {
            let base = positions.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = [
                    (n[0] + u[0] * su + v[0] * sv) * w,
                    (n[1] + u[1] * su + v[1] * sv) * h,
                    (n[2] + u[2] * su + v[2] * sv) * d,
                ];
                positions.push(p);
                normals.push(n);
                uvs.push([(su + 1.0) * 0.5, 1.0 - (sv + 1.0) * 0.5]);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self {
            positions,
            normals: Some(normals),
            uvs: Some(uvs),
            indices: Some(indices),
        }
    }

    /// Subdivided plane in the XZ plane facing +Y.
    #[must_use]
    pub fn create_plane(width: f32, depth: f32, segments: u32) -> Self {
        let segments = segments.max(1);
        let row = segments + 1;

        let mut positions = Vec::with_capacity((row * row) as usize);
        let mut normals = Vec::with_capacity((row * row) as usize);
        let mut uvs = Vec::with_capacity((row * row) as usize);
        let mut indices = Vec::with_capacity((segments * segments * 6) as usize);

        for iz in 0..row {
            let tz = iz as f32 / segments as f32;
            for ix in 0..row {
                let tx = ix as f32 / segments as f32;
                positions.push([(tx - 0.5) * width, 0.0, (tz - 0.5) * depth]);
                normals.push([0.0, 1.0, 0.0]);
                uvs.push([tx, tz]);
            }
        }

        for iz in 0..segments {
            for ix in 0..segments {
                let a = ix + row * iz;
                let b = ix + row * (iz + 1);
                let c = (ix + 1) + row * (iz + 1);
                let d = (ix + 1) + row * iz;
                indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }

        Self {
            positions,
            normals: Some(normals),
            uvs: Some(uvs),
            indices: Some(indices),
        }
    }

    /// Drops the normal attribute. Such meshes are still drawn by the forward
    /// pass but are invisible to G-buffer consumers.
    #[must_use]
    pub fn without_normals(mut self) -> Self {
        self.normals = None;
        self
    }
}
