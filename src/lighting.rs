//! Analytic shading used to visualize rendered normals.
//!
//! All functions work on batches of points (one slice per instance) and return one RGB
//! shading factor per point. Light and point counts may differ between instances.

use crate::normals::normalize_or_zero;
use crate::{RenderError, RenderResult, VertexBatch};
use rayon::prelude::*;
use vek::Vec3;

/// Nine spherical harmonics coefficients (rows) for each RGB channel (columns).
pub type ShCoefficients = [[f32; 3]; 9];

/// Normalization constants of the nine SH basis terms, including the clamped cosine
/// lobe convolution factors.
pub const SH_CONSTANTS: [f32; 9] = [
    0.282_094_8, // 1 / sqrt(4 pi)
    1.023_326_7, // (2 pi / 3) sqrt(3 / (4 pi))
    1.023_326_7,
    1.023_326_7,
    0.858_085_5, // (pi / 4) 3 sqrt(5 / (12 pi))
    0.858_085_5,
    0.858_085_5,
    0.429_042_8, // (pi / 4) (3 / 2) sqrt(5 / (12 pi))
    0.247_708_0, // (pi / 4) (1 / 2) sqrt(5 / (4 pi))
];

const DIRECTION_EPS: f32 = 1e-12;

/// A light source. `position` holds the direction for directional lights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: Vec3<f32>,
    pub color: Vec3<f32>,
}

impl Light {
    pub fn new(position: Vec3<f32>, color: Vec3<f32>) -> Self {
        Self { position, color }
    }

    /// Builds a light from packed `[x, y, z, r, g, b]`.
    pub fn from_array(v: [f32; 6]) -> Self {
        Self {
            position: Vec3::new(v[0], v[1], v[2]),
            color: Vec3::new(v[3], v[4], v[5]),
        }
    }
}

/// Lighting of a batch, one entry per instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Lighting {
    SphericalHarmonics(Vec<ShCoefficients>),
    Point(Vec<Vec<Light>>),
    Directional(Vec<Vec<Light>>),
}

impl Lighting {
    pub fn instances(&self) -> usize {
        match self {
            Lighting::SphericalHarmonics(coefficients) => coefficients.len(),
            Lighting::Point(lights) | Lighting::Directional(lights) => lights.len(),
        }
    }

    /// Shading of every point given its position and normal.
    pub fn shade(&self, positions: &VertexBatch, normals: &VertexBatch) -> RenderResult<VertexBatch> {
        match self {
            Lighting::SphericalHarmonics(coefficients) => sh_shading(normals, coefficients),
            Lighting::Point(lights) => point_shading(positions, normals, lights),
            Lighting::Directional(lights) => directional_shading(normals, lights),
        }
    }
}

/// The scaled SH basis `(1, x, y, z, xy, xz, yz, x² - y², 3z² - 1)` of a normal.
#[inline(always)]
pub fn sh_basis(n: Vec3<f32>) -> [f32; 9] {
    let basis = [
        1.0,
        n.x,
        n.y,
        n.z,
        n.x * n.y,
        n.x * n.z,
        n.y * n.z,
        n.x * n.x - n.y * n.y,
        3.0 * n.z * n.z - 1.0,
    ];
    std::array::from_fn(|i| basis[i] * SH_CONSTANTS[i])
}

/// Evaluates SH lighting for a single normal.
#[inline(always)]
pub fn shade_sh(normal: Vec3<f32>, coefficients: &ShCoefficients) -> Vec3<f32> {
    sh_basis(normal)
        .iter()
        .zip(coefficients)
        .fold(Vec3::zero(), |acc, (b, c)| acc + Vec3::<f32>::from(*c) * *b)
}

/// Mean over `lights` of `dot(normal, normalize(light - point)) * color`, unclamped.
#[inline(always)]
pub fn shade_point(point: Vec3<f32>, normal: Vec3<f32>, lights: &[Light]) -> Vec3<f32> {
    mean(lights, |light| {
        let direction = normalize_or_zero(light.position - point, DIRECTION_EPS);
        light.color * normal.dot(direction)
    })
}

/// Mean over `lights` of `clamp(dot(normal, normalize(direction)), 0, 1) * color`.
#[inline(always)]
pub fn shade_directional(normal: Vec3<f32>, lights: &[Light]) -> Vec3<f32> {
    mean(lights, |light| {
        let direction = normalize_or_zero(light.position, DIRECTION_EPS);
        light.color * normal.dot(direction).clamp(0.0, 1.0)
    })
}

fn mean(lights: &[Light], f: impl Fn(&Light) -> Vec3<f32>) -> Vec3<f32> {
    if lights.is_empty() {
        return Vec3::zero();
    }
    lights.iter().map(f).fold(Vec3::zero(), |a, b| a + b) / lights.len() as f32
}

/// SH shading of a batch of normals.
pub fn sh_shading(normals: &VertexBatch, coefficients: &[ShCoefficients]) -> RenderResult<VertexBatch> {
    expect_instances(normals, coefficients.len(), "sh coefficients")?;
    shade_batch(normals, |n, i| shade_sh(normals.instance(n)[i], &coefficients[n]))
}

/// Point light shading of a batch of surface points.
pub fn point_shading(
    positions: &VertexBatch,
    normals: &VertexBatch,
    lights: &[Vec<Light>],
) -> RenderResult<VertexBatch> {
    positions.expect_same_shape(normals, "point light normals")?;
    expect_instances(normals, lights.len(), "point lights")?;
    shade_batch(normals, |n, i| {
        shade_point(positions.instance(n)[i], normals.instance(n)[i], &lights[n])
    })
}

/// Directional light shading of a batch of normals.
pub fn directional_shading(normals: &VertexBatch, lights: &[Vec<Light>]) -> RenderResult<VertexBatch> {
    expect_instances(normals, lights.len(), "directional lights")?;
    shade_batch(normals, |n, i| shade_directional(normals.instance(n)[i], &lights[n]))
}

fn expect_instances(points: &VertexBatch, instances: usize, what: &str) -> RenderResult<()> {
    if points.instances() != instances {
        return Err(RenderError::shape(format!(
            "{what} given for {instances} instances, batch has {}",
            points.instances()
        )));
    }
    Ok(())
}

fn shade_batch(
    points: &VertexBatch,
    shade: impl Fn(usize, usize) -> Vec3<f32> + Sync,
) -> RenderResult<VertexBatch> {
    let count = points.vertex_count();
    let data: Vec<Vec3<f32>> = (0..points.instances() * count)
        .into_par_iter()
        .map(|i| shade(i / count, i % count))
        .collect();
    VertexBatch::new(points.instances(), count, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3<f32>, b: Vec3<f32>) -> bool {
        (a - b).magnitude() < 1e-5
    }

    #[test]
    fn test_sh_constant_term() {
        let mut coefficients = [[0.0; 3]; 9];
        coefficients[0] = [1.0, 2.0, 3.0];
        let shading = shade_sh(Vec3::new(0.0, 0.6, 0.8), &coefficients);
        assert!(close(shading, Vec3::new(1.0, 2.0, 3.0) * SH_CONSTANTS[0]));
    }

    #[test]
    fn test_sh_basis_terms() {
        let basis = sh_basis(Vec3::new(0.0, 0.0, 1.0));
        assert!((basis[3] - SH_CONSTANTS[3]).abs() < 1e-6);
        assert!((basis[8] - 2.0 * SH_CONSTANTS[8]).abs() < 1e-6);
        assert!(basis[1].abs() < 1e-6 && basis[4].abs() < 1e-6 && basis[7].abs() < 1e-6);

        let basis = sh_basis(Vec3::new(1.0, 0.0, 0.0));
        assert!((basis[7] - SH_CONSTANTS[7]).abs() < 1e-6);
        assert!((basis[8] + SH_CONSTANTS[8]).abs() < 1e-6);
    }

    #[test]
    fn test_directional_ignores_position() {
        let normals = VertexBatch::single(vec![Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.6, 0.8)]);
        let near = VertexBatch::single(vec![Vec3::zero(), Vec3::zero()]);
        let far = VertexBatch::single(vec![Vec3::new(5.0, -3.0, 2.0), Vec3::new(-4.0, 1.0, 9.0)]);
        let lighting = Lighting::Directional(vec![vec![Light::from_array([0.0, 1.0, 1.0, 1.0, 0.5, 0.25])]]);

        let a = lighting.shade(&near, &normals).unwrap();
        let b = lighting.shade(&far, &normals).unwrap();
        assert_eq!(a, b);
        let expected = Vec3::new(1.0, 0.5, 0.25) * (0.5_f32).sqrt();
        assert!(close(a.instance(0)[0], expected));
    }

    #[test]
    fn test_point_depends_on_position() {
        let normals = VertexBatch::single(vec![Vec3::new(0.0, 0.0, 1.0)]);
        let lighting = Lighting::Point(vec![vec![Light::new(Vec3::new(0.0, 0.0, 2.0), Vec3::one())]]);

        let below = lighting.shade(&VertexBatch::single(vec![Vec3::zero()]), &normals).unwrap();
        assert!(close(below.instance(0)[0], Vec3::one()));

        let aside = lighting
            .shade(&VertexBatch::single(vec![Vec3::new(2.0, 0.0, 2.0)]), &normals)
            .unwrap();
        assert!(close(aside.instance(0)[0], Vec3::zero()));

        // Point lights are not clamped, lights behind the surface darken it
        let above = lighting
            .shade(&VertexBatch::single(vec![Vec3::new(0.0, 0.0, 3.0)]), &normals)
            .unwrap();
        assert!(close(above.instance(0)[0], -Vec3::one()));
    }

    #[test]
    fn test_directional_clamps_and_averages() {
        let normal = Vec3::new(0.0, 0.0, 1.0);
        let lights = [
            Light::new(Vec3::new(0.0, 0.0, 3.0), Vec3::new(2.0, 2.0, 2.0)),
            Light::new(Vec3::new(0.0, 0.0, -1.0), Vec3::new(5.0, 5.0, 5.0)),
        ];
        assert!(close(shade_directional(normal, &lights), Vec3::one()));
        assert!(close(shade_directional(normal, &[]), Vec3::zero()));
    }

    #[test]
    fn test_instance_counts() {
        let normals = VertexBatch::single(vec![Vec3::new(0.0, 0.0, 1.0)]);
        assert!(sh_shading(&normals, &[]).is_err());
        assert!(directional_shading(&normals, &[vec![], vec![]]).is_err());

        let batch = VertexBatch::from_instances(vec![vec![Vec3::unit_z()], vec![Vec3::unit_x()]]).unwrap();
        let lights = vec![
            vec![Light::new(Vec3::unit_z(), Vec3::one())],
            vec![Light::new(Vec3::unit_z(), Vec3::one()); 3],
        ];
        let shading = directional_shading(&batch, &lights).unwrap();
        assert!(close(shading.instance(0)[0], Vec3::one()));
        assert!(close(shading.instance(1)[0], Vec3::zero()));
    }
}
