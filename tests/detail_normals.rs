mod common;

use uvraster::prelude::*;
use uvraster::vertex_normals;
use vek::Vec3;

const UV_SIZE: usize = 32;

#[test]
fn zero_displacement_reproduces_coarse_normals() {
    let asset = common::sheet(5, |u, v| 0.3 * u + 0.2 * v);
    let renderer = UvRenderer::new(&asset, common::settings(16, UV_SIZE)).unwrap();
    let vertices = VertexBatch::single(asset.vertices.clone());
    let normals = vertex_normals(&vertices, renderer.geometry().mesh()).unwrap();

    let expected = Vec3::new(-0.3, -0.2, 1.0).normalized();
    assert!((normals.instance(0)[12] - expected).magnitude() < 1e-5);

    let maps = DetailReconstructor::new()
        .displacement_to_normal(
            &renderer,
            &ImageBatch::zeros(1, 1, UV_SIZE, UV_SIZE),
            &vertices,
            &normals,
        )
        .unwrap();

    for y in 1..UV_SIZE - 1 {
        for x in 1..UV_SIZE - 1 {
            let detail = Vec3::new(
                maps.normals.get(0, 0, y, x),
                maps.normals.get(0, 1, y, x),
                maps.normals.get(0, 2, y, x),
            );
            assert!((detail - expected).magnitude() < 1e-4, "texel {y},{x}: {detail:?}");
        }
    }
}

#[test]
fn detail_normals_are_unit_length_for_random_bumps() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let asset = common::sheet(5, |u, v| (u - 0.5) * (v - 0.5));
    let renderer = UvRenderer::new(&asset, common::settings(16, UV_SIZE)).unwrap();
    let vertices = VertexBatch::from_instances(vec![asset.vertices.clone(); 2]).unwrap();
    let normals = vertex_normals(&vertices, renderer.geometry().mesh()).unwrap();

    let mut rng = StdRng::seed_from_u64(3);
    let bumps: Vec<f32> = (0..2 * UV_SIZE * UV_SIZE)
        .map(|_| rng.random_range(-0.01..0.01))
        .collect();
    let displacement = ImageBatch::new(2, 1, UV_SIZE, UV_SIZE, bumps).unwrap();

    let maps = DetailReconstructor::new()
        .displacement_to_normal(&renderer, &displacement, &vertices, &normals)
        .unwrap();
    assert_eq!(maps.normals.instances(), 2);
    assert_eq!(maps.coarse_vertices.channels(), 3);

    for n in 0..2 {
        for i in 0..UV_SIZE * UV_SIZE {
            let normal = Vec3::new(
                maps.normals.plane(n, 0)[i],
                maps.normals.plane(n, 1)[i],
                maps.normals.plane(n, 2)[i],
            );
            assert!((normal.magnitude() - 1.0).abs() < 1e-4);
        }
    }
    // Different bumps per instance give different normals
    assert_ne!(maps.normals.plane(0, 0), maps.normals.plane(1, 0));
}
