//! Expansion of per-vertex values into per-face-corner values.

use crate::{FaceAttributes, RenderError, RenderResult, Topology, VertexAttributes, VertexBatch};

/// Face indices used by [`face_vertices`].
#[derive(Debug, Clone, Copy)]
pub enum FaceIndices<'a> {
    /// One `[F, 3]` index set shared by every instance.
    Shared(&'a [[u32; 3]]),
    /// Pre-expanded `[N, F, 3]` indices, `faces` triangles per instance.
    Batched { indices: &'a [[u32; 3]], faces: usize },
}

impl FaceIndices<'_> {
    fn face_count(&self) -> usize {
        match self {
            FaceIndices::Shared(indices) => indices.len(),
            FaceIndices::Batched { faces, .. } => *faces,
        }
    }

    #[inline(always)]
    fn face(&self, n: usize, f: usize) -> [u32; 3] {
        match self {
            FaceIndices::Shared(indices) => indices[f],
            FaceIndices::Batched { indices, faces } => indices[n * faces + f],
        }
    }
}

impl<'a> From<&'a Topology> for FaceIndices<'a> {
    fn from(topology: &'a Topology) -> Self {
        FaceIndices::Shared(topology.faces())
    }
}

/// Gathers `[N, V, C]` per-vertex values through `faces` into `[N, F, 3, C]`.
pub fn face_vertices<'a>(
    values: &VertexAttributes,
    faces: impl Into<FaceIndices<'a>>,
) -> RenderResult<FaceAttributes> {
    let faces = faces.into();
    let instances = values.instances();
    let face_count = faces.face_count();
    let channels = values.channels();

    if let FaceIndices::Batched { indices, faces } = faces {
        if indices.len() != instances * faces {
            return Err(RenderError::shape(format!(
                "batched face indices hold {} triangles, expected {instances}x{faces}",
                indices.len()
            )));
        }
    }

    let mut data = Vec::with_capacity(instances * face_count * 3 * channels);
    for n in 0..instances {
        for f in 0..face_count {
            for index in faces.face(n, f) {
                let index = index as usize;
                if index >= values.vertex_count() {
                    return Err(RenderError::shape(format!(
                        "face {f} references vertex {index}, but only {} vertices were given",
                        values.vertex_count()
                    )));
                }
                data.extend_from_slice(values.value(n, index));
            }
        }
    }

    FaceAttributes::new(instances, face_count, channels, data)
}

/// [`face_vertices`] for a batch of 3D points.
pub fn face_points(points: &VertexBatch, topology: &Topology) -> RenderResult<FaceAttributes> {
    if points.vertex_count() != topology.vertex_count() {
        return Err(RenderError::shape(format!(
            "topology expects {} vertices per instance, got {}",
            topology.vertex_count(),
            points.vertex_count()
        )));
    }
    face_vertices(&VertexAttributes::from(points), topology)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vek::Vec3;

    fn values() -> VertexAttributes {
        // Two instances, four vertices, one channel: value = 10 * n + v
        let data = (0..2)
            .flat_map(|n| (0..4).map(move |v| (10 * n + v) as f32))
            .collect();
        VertexAttributes::new(2, 4, 1, data).unwrap()
    }

    #[test]
    fn test_shared_indices() {
        let faces = [[0, 1, 2], [3, 2, 1]];
        let gathered = face_vertices(&values(), FaceIndices::Shared(&faces)).unwrap();
        assert_eq!(gathered.face_count(), 2);
        assert_eq!(gathered.corner(0, 1, 0), &[3.0]);
        assert_eq!(gathered.corner(1, 1, 2), &[11.0]);
    }

    #[test]
    fn test_batched_indices() {
        let indices = [[0, 1, 2], [1, 2, 3]];
        let faces = FaceIndices::Batched {
            indices: &indices,
            faces: 1,
        };
        let gathered = face_vertices(&values(), faces).unwrap();
        assert_eq!(gathered.corner(0, 0, 0), &[0.0]);
        assert_eq!(gathered.corner(1, 0, 0), &[11.0]);

        let short = FaceIndices::Batched {
            indices: &indices[..1],
            faces: 1,
        };
        assert!(face_vertices(&values(), short).is_err());
    }

    #[test]
    fn test_face_points_checks_vertex_count() {
        let topology = Topology::new(vec![[0, 1, 2]], 3).unwrap();
        let points = VertexBatch::single(vec![
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ]);
        let corners = face_points(&points, &topology).unwrap();
        assert_eq!(corners.channels(), 3);
        assert_eq!(corners.corner(0, 0, 2), &[0.0, 0.0, 1.0]);

        let short = VertexBatch::single(vec![Vec3::zero(); 2]);
        assert!(face_points(&short, &topology).is_err());
    }
}
