use uvraster::prelude::*;
use vek::{Vec2, Vec3};

use criterion::{Criterion, criterion_group, criterion_main};

/// A latitude/longitude sphere with its texture coordinates.
fn sphere(rings: usize, segments: usize) -> MeshAsset {
    let mut vertices = Vec::new();
    let mut uvcoords = Vec::new();
    for i in 0..=rings {
        let v = i as f32 / rings as f32;
        let theta = v * std::f32::consts::PI;
        for j in 0..=segments {
            let u = j as f32 / segments as f32;
            let phi = u * std::f32::consts::TAU;
            vertices.push(Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()) * 0.8);
            uvcoords.push(Vec2::new(u, 1.0 - v));
        }
    }

    let stride = (segments + 1) as u32;
    let mut faces = Vec::new();
    for i in 0..rings as u32 {
        for j in 0..segments as u32 {
            let a = i * stride + j;
            faces.push([a, a + stride, a + 1]);
            faces.push([a + 1, a + stride, a + stride + 1]);
        }
    }
    MeshAsset::new(vertices, faces.clone(), uvcoords, faces)
}

fn rasterize_mesh(c: &mut Criterion) {
    let asset = sphere(64, 128);
    let renderer = UvRenderer::new(&asset, RenderSettings::default()).unwrap();

    let batch = 4;
    let vertices = VertexBatch::from_instances(vec![asset.vertices.clone(); batch]).unwrap();
    let albedo = ImageBatch::filled(batch, 3, 256, 256, 0.5);
    let lighting = Lighting::SphericalHarmonics(vec![[[0.3; 3]; 9]; batch]);
    let normals = uvraster::vertex_normals(&vertices, renderer.geometry().mesh()).unwrap();
    let displacement = ImageBatch::zeros(batch, 1, 256, 256);
    let detail = DetailReconstructor::new();

    c.bench_function("render", |b| {
        b.iter(|| renderer.render(&vertices, &vertices, &albedo, Some(&lighting)).unwrap())
    });

    c.bench_function("world2uv", |b| b.iter(|| renderer.world2uv(&vertices).unwrap()));

    c.bench_function("displacement_to_normal", |b| {
        b.iter(|| {
            detail
                .displacement_to_normal(&renderer, &displacement, &vertices, &normals)
                .unwrap()
        })
    });
}

criterion_group!(benches, rasterize_mesh);
criterion_main!(benches);
