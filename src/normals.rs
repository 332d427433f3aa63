use crate::{RenderError, RenderResult, Topology, VertexBatch};
use rayon::prelude::*;
use vek::Vec3;

/// Normals shorter than this are left at zero instead of being blown up.
const NORMAL_EPS: f32 = 1e-6;

/// Normalizes `v`, dividing by at least `eps` so zero vectors stay zero.
#[inline(always)]
pub fn normalize_or_zero(v: Vec3<f32>, eps: f32) -> Vec3<f32> {
    v / v.magnitude().max(eps)
}

/// Per-vertex normals of every instance.
///
/// Each face adds, at each of its corners, the cross product of the two edges leaving
/// that corner. The cross product scales with the face area, so larger faces weigh more.
/// The sums are normalized; vertices without any non-degenerate face get a zero normal.
pub fn vertex_normals(vertices: &VertexBatch, topology: &Topology) -> RenderResult<VertexBatch> {
    if vertices.vertex_count() != topology.vertex_count() {
        return Err(RenderError::shape(format!(
            "topology expects {} vertices per instance, got {}",
            topology.vertex_count(),
            vertices.vertex_count()
        )));
    }

    let data: Vec<Vec3<f32>> = (0..vertices.instances())
        .into_par_iter()
        .flat_map_iter(|n| instance_normals(vertices.instance(n), topology))
        .collect();

    VertexBatch::new(vertices.instances(), vertices.vertex_count(), data)
}

fn instance_normals(points: &[Vec3<f32>], topology: &Topology) -> Vec<Vec3<f32>> {
    let mut normals = vec![Vec3::zero(); points.len()];
    for face in topology.faces() {
        let [i0, i1, i2] = face.map(|i| i as usize);
        let (v0, v1, v2) = (points[i0], points[i1], points[i2]);
        normals[i0] += (v1 - v0).cross(v2 - v0);
        normals[i1] += (v2 - v1).cross(v0 - v1);
        normals[i2] += (v0 - v2).cross(v1 - v2);
    }
    for normal in &mut normals {
        *normal = normalize_or_zero(*normal, NORMAL_EPS);
    }
    normals
}
