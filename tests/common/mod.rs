#![allow(dead_code)]

use uvraster::prelude::*;
use vek::{Vec2, Vec3};

/// A `n x n` vertex sheet over the unit square whose texture coordinates equal its x and y,
/// lifted to `z = height(u, v)`.
pub fn sheet(n: usize, height: impl Fn(f32, f32) -> f32) -> MeshAsset {
    let step = 1.0 / (n - 1) as f32;
    let mut vertices = Vec::with_capacity(n * n);
    let mut uvcoords = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let (u, v) = (j as f32 * step, i as f32 * step);
            vertices.push(Vec3::new(u, v, height(u, v)));
            uvcoords.push(Vec2::new(u, v));
        }
    }

    let mut faces = Vec::with_capacity(2 * (n - 1) * (n - 1));
    for i in 0..n - 1 {
        for j in 0..n - 1 {
            let a = (i * n + j) as u32;
            let n = n as u32;
            faces.push([a, a + 1, a + n + 1]);
            faces.push([a, a + n + 1, a + n]);
        }
    }

    MeshAsset::new(vertices, faces.clone(), uvcoords, faces)
}

pub fn settings(image_size: usize, uv_size: usize) -> RenderSettings {
    RenderSettings {
        image_size,
        uv_size,
        tile_size: 16,
        ..Default::default()
    }
}

/// Orthographic view of the sheet: x and y to [-0.8, 0.8], z unchanged.
pub fn project(vertices: &[Vec3<f32>]) -> Vec<Vec3<f32>> {
    vertices
        .iter()
        .map(|v| Vec3::new(v.x * 1.6 - 0.8, v.y * 1.6 - 0.8, v.z))
        .collect()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
