//! Image-space and texture-space rendering of a fixed mesh.
//!
//! One [`UvRenderer`] owns two rasterizers: one at image resolution projecting the
//! transformed mesh, and one at UV resolution that uses the texture parameterization as
//! the projection plane so world-space values can be baked into UV maps.

use crate::gather::{face_points, face_vertices};
use crate::lighting::{Light, Lighting, directional_shading};
use crate::normals::vertex_normals;
use crate::sample::{SampleMode, grid_sample};
use crate::wavefront::Wavefront;
use crate::{
    FaceAttributes, Fragments, ImageBatch, MeshAsset, Rasterizer, RenderError, RenderResult, RenderSettings,
    Topology, VertexAttributes, VertexBatch,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};
use vek::Vec3;

/// Light positions of shape renderings when no lights are given.
pub const SHAPE_LIGHT_POSITIONS: [[f32; 3]; 5] = [
    [-1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [0.0, 0.0, 1.0],
];

/// Validated geometry of a mesh asset, shared by every renderer built from it.
#[derive(Debug)]
pub struct UvGeometry {
    mesh: Topology,
    uv: Topology,
    /// Texture coordinates as clip-space vertices `(2u - 1, 1 - 2v, 1)`.
    uv_vertices: VertexBatch,
    /// Per face corner `(u, 1 - v, 1)`.
    face_uvcoords: FaceAttributes,
}

impl UvGeometry {
    pub fn new(asset: &MeshAsset) -> RenderResult<Self> {
        let (mesh, uv) = asset.topologies()?;

        let uv_vertices = VertexBatch::single(
            asset
                .uvcoords
                .iter()
                .map(|t| Vec3::new(2.0 * t.x - 1.0, 1.0 - 2.0 * t.y, 1.0))
                .collect(),
        );
        let normalized = asset
            .uvcoords
            .iter()
            .flat_map(|t| [t.x, 1.0 - t.y, 1.0])
            .collect();
        let normalized = VertexAttributes::new(1, asset.uvcoords.len(), 3, normalized)?;
        let face_uvcoords = face_vertices(&normalized, &uv)?;

        Ok(Self {
            mesh,
            uv,
            uv_vertices,
            face_uvcoords,
        })
    }

    /// Topology of the mesh vertices.
    pub fn mesh(&self) -> &Topology {
        &self.mesh
    }

    /// Topology of the texture coordinates, one UV triangle per mesh face.
    pub fn uv(&self) -> &Topology {
        &self.uv
    }

    pub fn uv_vertices(&self) -> &VertexBatch {
        &self.uv_vertices
    }

    pub fn face_uvcoords(&self) -> &FaceAttributes {
        &self.face_uvcoords
    }
}

/// The named buffers of [`UvRenderer::render`].
///
/// Images are `[N, C, image_size, image_size]`; pixels no face covers are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendering {
    /// Albedo times shading times alpha, 3 channels.
    pub images: ImageBatch,
    pub albedo_images: ImageBatch,
    /// Visibility mask, 1 channel.
    pub alpha_images: ImageBatch,
    /// 1 where the transformed normal faces the viewer, 1 channel.
    pub pos_mask: ImageBatch,
    /// Lighting factor, 3 channels. Zero when rendered without lighting.
    pub shading_images: ImageBatch,
    /// Texture coordinates remapped to [-1, 1], 2 channels.
    pub grid: ImageBatch,
    /// Interpolated `(u, 1 - v, 1)`.
    pub uv_images: ImageBatch,
    /// World-space normals.
    pub normal_images: ImageBatch,
    /// World-space positions.
    pub position_images: ImageBatch,
    pub transformed_normal_images: ImageBatch,
    /// Per-vertex world-space normals.
    pub normals: VertexBatch,
    /// Per-vertex normals of the transformed vertices.
    pub transformed_normals: VertexBatch,
}

/// Renders a fixed mesh into image space and bakes per-vertex values into UV space.
///
/// The geometry is immutable after construction; every call allocates its own buffers,
/// so a renderer can be shared across threads.
#[derive(Debug)]
pub struct UvRenderer {
    settings: RenderSettings,
    geometry: Arc<UvGeometry>,
    dense: Arc<Topology>,
    rasterizer: Rasterizer,
    uv_rasterizer: Rasterizer,
    /// The UV layout rasterized once, shared by every bake.
    uv_fragments: Fragments,
}

impl UvRenderer {
    /// Validates `asset` and creates a renderer for it.
    pub fn new(asset: &MeshAsset, settings: RenderSettings) -> RenderResult<Self> {
        Self::with_geometry(Arc::new(UvGeometry::new(asset)?), settings)
    }

    /// Loads the mesh asset from an OBJ file.
    pub fn from_obj(path: impl AsRef<Path>, settings: RenderSettings) -> RenderResult<Self> {
        let asset = Wavefront::parse_file(path)?.into_mesh_asset();
        Self::new(&asset, settings)
    }

    /// Creates a renderer for already validated geometry, e.g. to render the same mesh at
    /// several resolutions.
    pub fn with_geometry(geometry: Arc<UvGeometry>, settings: RenderSettings) -> RenderResult<Self> {
        let rasterizer =
            Rasterizer::square(settings.image_size)?.with_tile_size(settings.tile_size);
        let uv_rasterizer = Rasterizer::square(settings.uv_size)?.with_tile_size(settings.tile_size);
        let dense = Arc::new(Topology::grid(settings.uv_size, settings.uv_size)?);
        let uv_fragments = uv_rasterizer.rasterize_fragments(&geometry.uv_vertices, &geometry.uv)?;

        debug!(
            vertices = geometry.mesh.vertex_count(),
            faces = geometry.mesh.face_count(),
            uv_vertices = geometry.uv.vertex_count(),
            image_size = settings.image_size,
            uv_size = settings.uv_size,
            "created uv renderer"
        );

        Ok(Self {
            settings,
            geometry,
            dense,
            rasterizer,
            uv_rasterizer,
            uv_fragments,
        })
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn geometry(&self) -> &Arc<UvGeometry> {
        &self.geometry
    }

    /// Triangulation of the `uv_size x uv_size` texel grid.
    pub fn dense_topology(&self) -> &Topology {
        &self.dense
    }

    pub fn image_size(&self) -> usize {
        self.rasterizer.size()
    }

    pub fn uv_size(&self) -> usize {
        self.uv_rasterizer.size()
    }

    /// Renders the textured, lit mesh.
    ///
    /// `vertices` are world-space positions used for normals and lighting,
    /// `transformed_vertices` the same vertices in clip space. `albedos` is a 3 channel
    /// texture per instance, sampled through the rasterized texture coordinates. Without
    /// lighting the images are the masked albedo and the shading is zero.
    #[instrument(skip_all, fields(instances = vertices.instances()))]
    pub fn render(
        &self,
        vertices: &VertexBatch,
        transformed_vertices: &VertexBatch,
        albedos: &ImageBatch,
        lights: Option<&Lighting>,
    ) -> RenderResult<Rendering> {
        self.expect_mesh_vertices(vertices, "world vertices")?;
        vertices.expect_same_shape(transformed_vertices, "transformed vertices")?;
        if albedos.instances() != vertices.instances() || albedos.channels() != 3 {
            return Err(RenderError::shape(format!(
                "albedos must be {}x3 channels, got {}x{}",
                vertices.instances(),
                albedos.instances(),
                albedos.channels()
            )));
        }

        let instances = vertices.instances();
        let mesh = &self.geometry.mesh;
        let transformed_vertices = transformed_vertices.offset_z(self.settings.depth_offset);

        let normals = vertex_normals(vertices, mesh)?;
        let transformed_normals = vertex_normals(&transformed_vertices, mesh)?;

        let attributes = FaceAttributes::concat(&[
            &self.geometry.face_uvcoords,
            &face_points(&transformed_normals, mesh)?,
            &face_points(vertices, mesh)?,
            &face_points(&normals, mesh)?,
        ])?;
        let rendering = self.rasterizer.rasterize(&transformed_vertices, mesh, &attributes)?;

        let alpha_images = rendering.select(12..13)?;
        let uv_images = rendering.select(0..3)?;
        let transformed_normal_images = rendering.select(3..6)?;
        let position_images = rendering.select(6..9)?;
        let normal_images = rendering.select(9..12)?;

        let grid = self.grid(&uv_images, &alpha_images)?;
        let threshold = self.settings.pos_mask_threshold;
        let pos_mask = rendering
            .select(5..6)?
            .map(|z| if z < threshold { 1.0 } else { 0.0 });

        let albedo_images = grid_sample(albedos, &grid, Some(&alpha_images), SampleMode::Linear)?;
        let size = self.image_size();
        let (images, shading_images) = match lights {
            Some(lighting) => {
                let shading = lighting.shade(
                    &position_images.to_vertex_batch(0)?,
                    &normal_images.to_vertex_batch(0)?,
                )?;
                let shading = ImageBatch::from_vertex_batch(&shading, size, size)?;
                (albedo_images.mul(&shading)?.mul(&alpha_images)?, shading)
            }
            None => (
                albedo_images.mul(&alpha_images)?,
                ImageBatch::zeros(instances, 3, size, size),
            ),
        };

        Ok(Rendering {
            images,
            albedo_images,
            alpha_images,
            pos_mask,
            shading_images,
            grid,
            uv_images,
            normal_images,
            position_images,
            transformed_normal_images,
            normals,
            transformed_normals,
        })
    }

    /// Bakes world-space positions (or any per-vertex 3-vectors) into UV maps,
    /// `[N, 3, uv_size, uv_size]`.
    #[instrument(skip_all, fields(instances = vertices.instances()))]
    pub fn world2uv(&self, vertices: &VertexBatch) -> RenderResult<ImageBatch> {
        self.world2uv_attributes(&VertexAttributes::from(vertices))
    }

    /// Bakes per-vertex values with any channel count into UV maps.
    #[instrument(skip_all, fields(instances = values.instances(), channels = values.channels()))]
    pub fn world2uv_attributes(&self, values: &VertexAttributes) -> RenderResult<ImageBatch> {
        let mesh = &self.geometry.mesh;
        if values.vertex_count() != mesh.vertex_count() {
            return Err(RenderError::shape(format!(
                "mesh has {} vertices, got values for {}",
                mesh.vertex_count(),
                values.vertex_count()
            )));
        }

        // Corner k of mesh face f and of uv face f are the same surface point
        let attributes = face_vertices(values, mesh)?;
        let uv_maps = self.uv_rasterizer.interpolate(&self.uv_fragments, &attributes)?;
        uv_maps.select(0..values.channels())
    }

    /// Renders depth normalized over the whole batch to [0, 1], nearer is brighter.
    #[instrument(skip_all, fields(instances = transformed_vertices.instances()))]
    pub fn render_depth(&self, transformed_vertices: &VertexBatch) -> RenderResult<ImageBatch> {
        self.expect_mesh_vertices(transformed_vertices, "transformed vertices")?;

        let min_z = transformed_vertices
            .data()
            .iter()
            .map(|v| v.z)
            .fold(f32::INFINITY, f32::min);
        let shifted = transformed_vertices.map(|v| Vec3::new(v.x, v.y, v.z - min_z));

        let mut depth: Vec<f32> = shifted.data().iter().map(|v| -v.z).collect();
        let min_depth = depth.iter().copied().fold(f32::INFINITY, f32::min);
        depth.iter_mut().for_each(|z| *z -= min_depth);
        let max_depth = depth.iter().copied().fold(0.0, f32::max);
        if max_depth > 0.0 {
            depth.iter_mut().for_each(|z| *z /= max_depth);
        }

        let depth = VertexAttributes::new(shifted.instances(), shifted.vertex_count(), 1, depth)?;
        let attributes = face_vertices(&depth, &self.geometry.mesh)?;
        let rendering = self
            .rasterizer
            .rasterize(&shifted, &self.geometry.mesh, &attributes)?;
        rendering.select(0..1)
    }

    /// Renders per-vertex normals, `[N, 3, image_size, image_size]`.
    #[instrument(skip_all, fields(instances = transformed_vertices.instances()))]
    pub fn render_normal(
        &self,
        transformed_vertices: &VertexBatch,
        normals: &VertexBatch,
    ) -> RenderResult<ImageBatch> {
        self.expect_mesh_vertices(transformed_vertices, "transformed vertices")?;
        transformed_vertices.expect_same_shape(normals, "normals")?;

        let attributes = face_points(normals, &self.geometry.mesh)?;
        let rendering = self
            .rasterizer
            .rasterize(transformed_vertices, &self.geometry.mesh, &attributes)?;
        rendering.select(0..3)
    }

    /// Renders the untextured shape, lit by directional lights, over `background`.
    ///
    /// `detail_normal_images` replace the rendered world normals for shading. Without
    /// lights, five lights of the configured intensity surround the viewer.
    #[instrument(skip_all, fields(instances = vertices.instances()))]
    pub fn render_shape(
        &self,
        vertices: &VertexBatch,
        transformed_vertices: &VertexBatch,
        background: Option<&ImageBatch>,
        detail_normal_images: Option<&ImageBatch>,
        lights: Option<&[Vec<Light>]>,
    ) -> RenderResult<ImageBatch> {
        self.expect_mesh_vertices(vertices, "world vertices")?;
        vertices.expect_same_shape(transformed_vertices, "transformed vertices")?;

        let instances = vertices.instances();
        let size = self.image_size();
        for (image, what) in [(background, "background"), (detail_normal_images, "detail normals")] {
            if let Some(image) = image {
                if image.instances() != instances
                    || image.channels() != 3
                    || image.height() != size
                    || image.width() != size
                {
                    return Err(RenderError::shape(format!(
                        "{what} must be {instances}x3x{size}x{size}, got {}x{}x{}x{}",
                        image.instances(),
                        image.channels(),
                        image.height(),
                        image.width()
                    )));
                }
            }
        }

        let default_lights;
        let lights = match lights {
            Some(lights) => lights,
            None => {
                let color = Vec3::broadcast(self.settings.shape_light_intensity);
                let lights: Vec<Light> = SHAPE_LIGHT_POSITIONS
                    .iter()
                    .map(|p| Light::new(Vec3::<f32>::from(*p), color))
                    .collect();
                default_lights = vec![lights; instances];
                &default_lights[..]
            }
        };

        let mesh = &self.geometry.mesh;
        let transformed_vertices = transformed_vertices.offset_z(self.settings.depth_offset);
        let normals = vertex_normals(vertices, mesh)?;
        let rendering =
            self.rasterizer
                .rasterize(&transformed_vertices, mesh, &face_points(&normals, mesh)?)?;

        let alpha = rendering.select(3..4)?;
        let normal_images = match detail_normal_images {
            Some(images) => images.clone(),
            None => rendering.select(0..3)?,
        };
        let shading = directional_shading(&normal_images.to_vertex_batch(0)?, lights)?;
        let mut shape = ImageBatch::from_vertex_batch(&shading, size, size)?;

        for n in 0..instances {
            let mask = alpha.plane(n, 0).to_vec();
            for c in 0..3 {
                let albedo = self.settings.shape_color[c];
                let back = background.map(|b| b.plane(n, c));
                for (i, value) in shape.plane_mut(n, c).iter_mut().enumerate() {
                    let a = mask[i];
                    let behind = back.map_or(0.0, |b| b[i]);
                    *value = albedo * *value * a + behind * (1.0 - a);
                }
            }
        }
        Ok(shape)
    }

    /// `[-1, 1]` texture coordinates of visible pixels, zero elsewhere.
    fn grid(&self, uv_images: &ImageBatch, alpha: &ImageBatch) -> RenderResult<ImageBatch> {
        let mut grid = uv_images.select(0..2)?;
        for n in 0..grid.instances() {
            let mask = alpha.plane(n, 0).to_vec();
            for c in 0..2 {
                for (value, a) in grid.plane_mut(n, c).iter_mut().zip(&mask) {
                    *value = if *a > 0.0 { *value * 2.0 - 1.0 } else { 0.0 };
                }
            }
        }
        Ok(grid)
    }

    fn expect_mesh_vertices(&self, vertices: &VertexBatch, what: &str) -> RenderResult<()> {
        let expected = self.geometry.mesh.vertex_count();
        if vertices.vertex_count() != expected {
            return Err(RenderError::shape(format!(
                "{what}: mesh has {expected} vertices, got {}",
                vertices.vertex_count()
            )));
        }
        Ok(())
    }
}
