//! Detail normals from displacement maps.
//!
//! The coarse mesh is baked into UV space, every texel is pushed along the coarse normal
//! by its displacement, and the texel grid is read back as the vertices of the dense UV
//! triangulation whose normals are recomputed.

use crate::normals::vertex_normals;
use crate::{ImageBatch, RenderError, RenderResult, UvRenderer, VertexBatch};
use image::imageops::{self, FilterType};
use std::path::Path;
use tracing::instrument;
use vek::Vec3;

/// Result of [`DetailReconstructor::displacement_to_normal`].
#[derive(Debug, Clone, PartialEq)]
pub struct DetailMaps {
    /// Unit detail normals, `[N, 3, uv_size, uv_size]`.
    pub normals: ImageBatch,
    /// Coarse world positions baked into UV space.
    pub coarse_vertices: ImageBatch,
}

/// Turns per-texel displacements into detail normal maps.
///
/// An optional static mask is multiplied into every displacement, and an optional fixed
/// offset map is added on top of it. Both are single channel `[1, 1, S, S]` (or one map
/// per instance) at the renderer's UV resolution.
#[derive(Debug, Clone, Default)]
pub struct DetailReconstructor {
    mask: Option<ImageBatch>,
    fixed_offset: Option<ImageBatch>,
}

impl DetailReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the displacement mask using the builder pattern.
    pub fn with_mask(mut self, mask: ImageBatch) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Sets the fixed offset map using the builder pattern.
    pub fn with_fixed_offset(mut self, fixed_offset: ImageBatch) -> Self {
        self.fixed_offset = Some(fixed_offset);
        self
    }

    pub fn mask(&self) -> Option<&ImageBatch> {
        self.mask.as_ref()
    }

    pub fn fixed_offset(&self) -> Option<&ImageBatch> {
        self.fixed_offset.as_ref()
    }

    /// Loads a grayscale mask image, resized to `size x size` with nearest sampling.
    pub fn load_mask(path: impl AsRef<Path>, size: usize) -> RenderResult<ImageBatch> {
        let luma = image::open(path)?.to_luma32f();
        let resized = imageops::resize(&luma, size as u32, size as u32, FilterType::Nearest);
        ImageBatch::new(1, 1, size, size, resized.into_raw())
    }

    /// Computes detail normals of the coarse mesh displaced by `displacement`.
    ///
    /// `displacement` is `[N, 1, S, S]` with `S` the renderer's UV size;
    /// `coarse_vertices` and `coarse_normals` are per-vertex world positions and normals.
    #[instrument(skip_all, fields(instances = displacement.instances()))]
    pub fn displacement_to_normal(
        &self,
        renderer: &UvRenderer,
        displacement: &ImageBatch,
        coarse_vertices: &VertexBatch,
        coarse_normals: &VertexBatch,
    ) -> RenderResult<DetailMaps> {
        let size = renderer.uv_size();
        let instances = displacement.instances();
        expect_map(displacement, instances, size, "displacement", false)?;
        coarse_vertices.expect_same_shape(coarse_normals, "coarse normals")?;
        if coarse_vertices.instances() != instances {
            return Err(RenderError::shape(format!(
                "{} displacement maps for {} meshes",
                instances,
                coarse_vertices.instances()
            )));
        }
        if let Some(mask) = &self.mask {
            expect_map(mask, instances, size, "displacement mask", true)?;
        }
        if let Some(offset) = &self.fixed_offset {
            expect_map(offset, instances, size, "fixed offset", true)?;
        }

        let uv_vertices = renderer.world2uv(coarse_vertices)?;
        let uv_normals = renderer.world2uv(coarse_normals)?;

        let len = size * size;
        let mut dense = Vec::with_capacity(instances * len);
        for n in 0..instances {
            let d = displacement.plane(n, 0);
            let mask = self.mask.as_ref().map(|m| m.plane(n % m.instances(), 0));
            let offset = self.fixed_offset.as_ref().map(|f| f.plane(n % f.instances(), 0));
            let positions = [0, 1, 2].map(|c| uv_vertices.plane(n, c));
            let normals = [0, 1, 2].map(|c| uv_normals.plane(n, c));

            dense.extend((0..len).map(|i| {
                let p = Vec3::new(positions[0][i], positions[1][i], positions[2][i]);
                let normal = Vec3::new(normals[0][i], normals[1][i], normals[2][i]);
                let shift = d[i] * mask.map_or(1.0, |m| m[i]) + offset.map_or(0.0, |f| f[i]);
                p + normal * shift
            }));
        }

        let dense = VertexBatch::new(instances, len, dense)?;
        let normals = vertex_normals(&dense, renderer.dense_topology())?;

        Ok(DetailMaps {
            normals: ImageBatch::from_vertex_batch(&normals, size, size)?,
            coarse_vertices: uv_vertices,
        })
    }
}

fn expect_map(
    map: &ImageBatch,
    instances: usize,
    size: usize,
    what: &str,
    shared: bool,
) -> RenderResult<()> {
    let instances_ok = map.instances() == instances || (shared && map.instances() == 1);
    if !instances_ok || map.channels() != 1 || map.height() != size || map.width() != size {
        return Err(RenderError::shape(format!(
            "{what} must be {instances}x1x{size}x{size}, got {}x{}x{}x{}",
            map.instances(),
            map.channels(),
            map.height(),
            map.width()
        )));
    }
    Ok(())
}
