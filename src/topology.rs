use crate::{RenderError, RenderResult};
use vek::{Vec2, Vec3};

/// A validated, immutable set of triangles over a fixed vertex count.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    faces: Vec<[u32; 3]>,
    vertex_count: usize,
}

impl Topology {
    /// Validates that every index addresses one of `vertex_count` vertices.
    pub fn new(faces: Vec<[u32; 3]>, vertex_count: usize) -> RenderResult<Self> {
        if vertex_count > u32::MAX as usize {
            return Err(RenderError::topology(format!(
                "{vertex_count} vertices exceed the 32 bit index range"
            )));
        }
        for (f, face) in faces.iter().enumerate() {
            if let Some(index) = face.iter().find(|i| **i as usize >= vertex_count) {
                return Err(RenderError::topology(format!(
                    "face {f} references vertex {index}, but only {vertex_count} vertices exist"
                )));
            }
        }
        Ok(Self {
            faces,
            vertex_count,
        })
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Regular triangulation of a `height x width` vertex grid, vertex `y * width + x`.
    ///
    /// Every cell is split into two triangles wound as (row step) x (column step). For a
    /// texel grid whose rows run along decreasing v this matches dP/du x dP/dv, so normals
    /// recomputed over the grid agree with those of the coarse mesh.
    pub fn grid(height: usize, width: usize) -> RenderResult<Self> {
        let mut faces = Vec::with_capacity(2 * height.saturating_sub(1) * width.saturating_sub(1));
        for y in 0..height.saturating_sub(1) {
            for x in 0..width.saturating_sub(1) {
                let i00 = (y * width + x) as u32;
                let i01 = (y * width + x + 1) as u32;
                let i10 = ((y + 1) * width + x) as u32;
                let i11 = ((y + 1) * width + x + 1) as u32;
                faces.push([i00, i10, i01]);
                faces.push([i01, i10, i11]);
            }
        }
        Self::new(faces, height * width)
    }
}

/// The external geometry asset: template vertices, faces and the UV parameterization.
///
/// `uv_faces[f]` holds the UV indices of the corners of `faces[f]`, so both index sets
/// must have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshAsset {
    pub vertices: Vec<Vec3<f32>>,
    pub faces: Vec<[u32; 3]>,
    pub uvcoords: Vec<Vec2<f32>>,
    pub uv_faces: Vec<[u32; 3]>,
}

impl MeshAsset {
    pub fn new(
        vertices: Vec<Vec3<f32>>,
        faces: Vec<[u32; 3]>,
        uvcoords: Vec<Vec2<f32>>,
        uv_faces: Vec<[u32; 3]>,
    ) -> Self {
        Self {
            vertices,
            faces,
            uvcoords,
            uv_faces,
        }
    }

    /// Validates the asset and returns the mesh topology and the UV topology.
    pub fn topologies(&self) -> RenderResult<(Topology, Topology)> {
        if self.faces.is_empty() {
            return Err(RenderError::topology("mesh has no faces"));
        }
        if self.uv_faces.len() != self.faces.len() {
            return Err(RenderError::topology(format!(
                "{} faces but {} uv faces",
                self.faces.len(),
                self.uv_faces.len()
            )));
        }
        let mesh = Topology::new(self.faces.clone(), self.vertices.len())?;
        let uv = Topology::new(self.uv_faces.clone(), self.uvcoords.len())
            .map_err(|err| RenderError::topology(format!("uv faces: {err}")))?;
        Ok((mesh, uv))
    }
}
