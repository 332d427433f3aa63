mod common;

use std::sync::Arc;
use uvraster::prelude::*;
use uvraster::visualize;
use vek::Vec3;

const OBJ: &str = "
# two triangles at different depths, the second one nearer
v -0.5 -0.5 0.5
v  0.5 -0.5 0.5
v  0.0  0.5 0.5
v -0.5  0.5 0.2
v  0.5  0.5 0.2
v  0.0 -0.5 0.2
vt 0.1 0.1
vt 0.4 0.1
vt 0.25 0.4
vt 0.6 0.6
vt 0.9 0.6
vt 0.75 0.9
f 1/1 2/2 3/3
f 4/4 6/6 5/5
";

const TOML: &str = "
[render]
image_size = 32
uv_size = 16
tile_size = 8
";

fn renderer() -> UvRenderer {
    common::init_tracing();
    let mut settings = RenderSettings::default();
    settings.read(TOML).unwrap();
    let asset = Wavefront::parse_string(OBJ).unwrap().into_mesh_asset();
    UvRenderer::new(&asset, settings).unwrap()
}

fn vertices(renderer: &UvRenderer) -> VertexBatch {
    let obj = Wavefront::parse_string(OBJ).unwrap();
    assert_eq!(renderer.geometry().mesh().vertex_count(), obj.vertices.len());
    VertexBatch::from_instances(vec![obj.vertices.clone(), obj.vertices]).unwrap()
}

#[test]
fn render_outputs_are_zero_where_nothing_is_visible() {
    let renderer = renderer();
    let vertices = vertices(&renderer);
    let albedo = ImageBatch::filled(2, 3, 8, 8, 0.7);
    let lighting = Lighting::SphericalHarmonics(vec![[[0.5; 3]; 9]; 2]);

    let rendering = renderer
        .render(&vertices, &vertices, &albedo, Some(&lighting))
        .unwrap();
    assert_eq!(rendering.images.height(), 32);
    assert_eq!(rendering.normals.instances(), 2);

    let alpha = &rendering.alpha_images;
    let covered = alpha.data().iter().filter(|a| **a == 1.0).count();
    assert!(covered > 0);
    assert!(alpha.data().iter().all(|a| *a == 0.0 || *a == 1.0));

    for image in [
        &rendering.images,
        &rendering.albedo_images,
        &rendering.grid,
        &rendering.uv_images,
        &rendering.normal_images,
        &rendering.position_images,
        &rendering.transformed_normal_images,
        &rendering.pos_mask,
    ] {
        for n in 0..image.instances() {
            for c in 0..image.channels() {
                for (value, a) in image.plane(n, c).iter().zip(alpha.plane(n, 0)) {
                    if *a == 0.0 {
                        assert_eq!(*value, 0.0);
                    }
                }
            }
        }
    }
}

#[test]
fn nearer_triangle_owns_the_overlap() {
    let renderer = renderer();
    let vertices = vertices(&renderer);
    let albedo = ImageBatch::zeros(2, 3, 4, 4);
    let rendering = renderer.render(&vertices, &vertices, &albedo, None).unwrap();

    // The image center is covered by both faces; the second one is nearer
    let z = rendering.position_images.get(0, 2, 16, 16);
    assert!((z - 0.2).abs() < 1e-5);
    let u = rendering.uv_images.get(0, 0, 16, 16);
    assert!(u > 0.6 && u < 0.9);
}

#[test]
fn depth_and_shape_renderings() {
    let renderer = renderer();
    let vertices = vertices(&renderer);

    let depth = renderer.render_depth(&vertices).unwrap();
    // Nearer faces map to larger values, the nearest to 1
    assert!((depth.get(0, 0, 16, 16) - 1.0).abs() < 1e-5);

    let shape = renderer
        .render_shape(&vertices, &vertices, None, None, None)
        .unwrap();
    assert_eq!(shape.channels(), 3);
    assert_eq!(shape.get(1, 0, 0, 0), 0.0);
    assert!(shape.get(1, 0, 16, 16) > 0.0);

    let normals = VertexBatch::from_instances(vec![vec![Vec3::unit_y(); 6]; 2]).unwrap();
    let normal_image = renderer.render_normal(&vertices, &normals).unwrap();
    assert!((normal_image.get(0, 1, 16, 16) - 1.0).abs() < 1e-5);

    let rgb = visualize::to_rgb_image(&visualize::normals_to_colors(&normal_image), 0).unwrap();
    assert_eq!(rgb.dimensions(), (32, 32));
}

#[test]
fn geometry_is_shared_across_resolutions() {
    let renderer = renderer();
    let geometry = Arc::clone(renderer.geometry());
    let small = UvRenderer::with_geometry(geometry, common::settings(8, 8)).unwrap();
    assert!(Arc::ptr_eq(renderer.geometry(), small.geometry()));

    let vertices = vertices(&renderer);
    let uv = small.world2uv(&vertices).unwrap();
    assert_eq!(uv.height(), 8);

    std::thread::scope(|scope| {
        let a = scope.spawn(|| renderer.render_depth(&vertices).unwrap());
        let b = scope.spawn(|| renderer.render_depth(&vertices).unwrap());
        assert_eq!(a.join().unwrap(), b.join().unwrap());
    });
}

#[test]
fn non_square_frames_are_rejected() {
    assert!(matches!(
        Rasterizer::new(32, 16),
        Err(RenderError::NonSquare { height: 32, width: 16 })
    ));
}
