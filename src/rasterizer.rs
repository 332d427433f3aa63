use crate::edge::Edges;
use crate::pool::ScratchPool;
use crate::{FaceAttributes, ImageBatch, RenderError, RenderResult, Topology, VertexBatch};
use rayon::prelude::*;
use tracing::debug;
use vek::{Vec2, Vec3};

/// Depth of a pixel no face covers. Rasterized depths must stay below it.
pub const EMPTY_DEPTH: f32 = 1e6;

/// Face id of a pixel no face covers.
pub const NO_FACE: u32 = u32::MAX;

const DEFAULT_TILE_SIZE: usize = 32;

#[derive(Debug, Clone, Copy)]
struct TileRect {
    x: usize,
    y: usize,
    width: usize,
    height: usize,
}

/// A face projected into pixel space.
#[derive(Debug, Clone, Copy)]
struct ScreenTriangle {
    face: u32,
    edges: Edges,
    depth: Vec3<f32>,
    min: Vec2<f32>,
    max: Vec2<f32>,
}

/// Tile-local z-buffer, checked out of the rasterizer's pools.
struct TileBuffers {
    depth: Vec<f32>,
    face: Vec<u32>,
    bary: Vec<[f32; 3]>,
}

/// The per-pixel frame buffer of one rasterization call: the depth, owning face and
/// barycentric weights of the nearest covering face.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragments {
    instances: usize,
    faces: usize,
    size: usize,
    depth: Vec<f32>,
    face: Vec<u32>,
    bary: Vec<[f32; 3]>,
}

impl Fragments {
    pub fn instances(&self) -> usize {
        self.instances
    }

    /// Number of faces of the rasterized topology.
    pub fn face_count(&self) -> usize {
        self.faces
    }

    /// Width and height of the square frame.
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline(always)]
    fn index(&self, n: usize, y: usize, x: usize) -> usize {
        (n * self.size + y) * self.size + x
    }

    /// Depth at a pixel, [`EMPTY_DEPTH`] if uncovered.
    pub fn depth(&self, n: usize, y: usize, x: usize) -> f32 {
        self.depth[self.index(n, y, x)]
    }

    /// The face owning a pixel.
    pub fn face(&self, n: usize, y: usize, x: usize) -> Option<u32> {
        let face = self.face[self.index(n, y, x)];
        (face != NO_FACE).then_some(face)
    }

    /// Barycentric weights at a pixel, zero if uncovered.
    pub fn bary(&self, n: usize, y: usize, x: usize) -> [f32; 3] {
        self.bary[self.index(n, y, x)]
    }

    pub fn is_visible(&self, n: usize, y: usize, x: usize) -> bool {
        self.face(n, y, x).is_some()
    }

    /// Number of covered pixels of instance `n`.
    pub fn coverage(&self, n: usize) -> usize {
        let len = self.size * self.size;
        self.face[n * len..(n + 1) * len]
            .iter()
            .filter(|f| **f != NO_FACE)
            .count()
    }
}

/// Rasterizes batches of triangle meshes sharing one topology into square frames.
///
/// Vertices come in normalized device coordinates: x and y in [-1, 1] map to columns and
/// rows (`p = v * size / 2 + size / 2`, row 0 at y = -1), z is scaled by the same factor
/// and compared directly, smaller is nearer. Each pixel is sampled once at its center.
#[derive(Debug)]
pub struct Rasterizer {
    size: usize,
    tile_size: usize,
    depth_pool: ScratchPool<f32>,
    face_pool: ScratchPool<u32>,
    bary_pool: ScratchPool<[f32; 3]>,
}

impl Rasterizer {
    /// Creates a rasterizer for `height x width` frames. Only square frames are supported.
    pub fn new(height: usize, width: usize) -> RenderResult<Self> {
        if height != width {
            return Err(RenderError::NonSquare { height, width });
        }
        if height == 0 {
            return Err(RenderError::shape("frame size must be at least one pixel"));
        }
        Ok(Self {
            size: height,
            tile_size: DEFAULT_TILE_SIZE,
            depth_pool: ScratchPool::new(),
            face_pool: ScratchPool::new(),
            bary_pool: ScratchPool::new(),
        })
    }

    pub fn square(size: usize) -> RenderResult<Self> {
        Self::new(size, size)
    }

    /// Sets the edge length of the square tiles processed in parallel using the builder
    /// pattern.
    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.tile_size = tile_size.max(1);
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Rasterizes `vertices` and interpolates the per-corner `attributes`.
    ///
    /// Returns `[N, D + 1, size, size]`: the `D` interpolated channels followed by the
    /// visibility mask.
    pub fn rasterize(
        &self,
        vertices: &VertexBatch,
        topology: &Topology,
        attributes: &FaceAttributes,
    ) -> RenderResult<ImageBatch> {
        if attributes.instances() != vertices.instances()
            || attributes.face_count() != topology.face_count()
        {
            return Err(RenderError::shape(format!(
                "attributes cover {}x{} faces, vertices and topology describe {}x{}",
                attributes.instances(),
                attributes.face_count(),
                vertices.instances(),
                topology.face_count()
            )));
        }
        let fragments = self.rasterize_fragments(vertices, topology)?;
        self.interpolate(&fragments, attributes)
    }

    /// Resolves the nearest covering face of every pixel.
    pub fn rasterize_fragments(
        &self,
        vertices: &VertexBatch,
        topology: &Topology,
    ) -> RenderResult<Fragments> {
        if vertices.vertex_count() != topology.vertex_count() {
            return Err(RenderError::shape(format!(
                "topology expects {} vertices per instance, got {}",
                topology.vertex_count(),
                vertices.vertex_count()
            )));
        }

        let instances = vertices.instances();
        let size = self.size;
        let triangles: Vec<Vec<ScreenTriangle>> = (0..instances)
            .into_par_iter()
            .map(|n| self.project(vertices.instance(n), topology))
            .collect();

        let degenerate: usize = triangles
            .iter()
            .map(|t| topology.face_count() - t.len())
            .sum();
        debug!(
            instances,
            faces = topology.face_count(),
            size,
            degenerate,
            "rasterizing"
        );

        let frame = size * size;
        let len = instances * frame;
        let mut depth = vec![EMPTY_DEPTH; len];
        let mut face = vec![NO_FACE; len];
        let mut bary = vec![[0.0; 3]; len];

        // Every band of tile rows is a disjoint slice of its frame
        let band = self.tile_size * size;
        depth
            .par_chunks_mut(frame)
            .zip(face.par_chunks_mut(frame))
            .zip(bary.par_chunks_mut(frame))
            .zip(triangles.par_iter())
            .for_each(|(((depth, face), bary), triangles)| {
                depth
                    .par_chunks_mut(band)
                    .zip(face.par_chunks_mut(band))
                    .zip(bary.par_chunks_mut(band))
                    .enumerate()
                    .for_each(|(b, ((depth, face), bary))| {
                        let y = b * self.tile_size;
                        let height = depth.len() / size;
                        for x in (0..size).step_by(self.tile_size) {
                            let tile = TileRect {
                                x,
                                y,
                                width: self.tile_size.min(size - x),
                                height,
                            };
                            let buffers = self.rasterize_tile(triangles, &tile);
                            for row in 0..height {
                                let src = row * tile.width..(row + 1) * tile.width;
                                let dst = row * size + x..row * size + x + tile.width;
                                depth[dst.clone()].copy_from_slice(&buffers.depth[src.clone()]);
                                face[dst.clone()].copy_from_slice(&buffers.face[src.clone()]);
                                bary[dst].copy_from_slice(&buffers.bary[src]);
                            }
                            self.depth_pool.checkin(buffers.depth);
                            self.face_pool.checkin(buffers.face);
                            self.bary_pool.checkin(buffers.bary);
                        }
                    });
            });

        Ok(Fragments {
            instances,
            faces: topology.face_count(),
            size,
            depth,
            face,
            bary,
        })
    }

    /// Interpolates per-corner attributes over rasterized fragments.
    ///
    /// Uncovered pixels are zero in every channel; the last channel is the visibility
    /// mask. Single-instance fragments are shared by every instance of `attributes`.
    pub fn interpolate(
        &self,
        fragments: &Fragments,
        attributes: &FaceAttributes,
    ) -> RenderResult<ImageBatch> {
        let shared = fragments.instances == 1;
        if (attributes.instances() != fragments.instances && !shared)
            || attributes.face_count() != fragments.faces
        {
            return Err(RenderError::shape(format!(
                "attributes cover {}x{} faces, fragments were rasterized from {}x{}",
                attributes.instances(),
                attributes.face_count(),
                fragments.instances,
                fragments.faces
            )));
        }

        let size = fragments.size;
        let channels = attributes.channels();
        let planes = channels + 1;
        let plane_len = size * size;
        let mut image = ImageBatch::zeros(attributes.instances(), planes, size, size);

        image
            .data_mut()
            .par_chunks_mut(plane_len)
            .enumerate()
            .for_each(|(plane, values)| {
                let n = plane / planes;
                let c = plane % planes;
                let m = if shared { 0 } else { n };
                let faces = &fragments.face[m * plane_len..(m + 1) * plane_len];
                let bary = &fragments.bary[m * plane_len..(m + 1) * plane_len];

                for (i, value) in values.iter_mut().enumerate() {
                    let face = faces[i];
                    if face == NO_FACE {
                        continue;
                    }
                    if c == channels {
                        *value = 1.0;
                        continue;
                    }
                    let face = face as usize;
                    let [w0, w1, w2] = bary[i];
                    *value = w0 * attributes.corner(n, face, 0)[c]
                        + w1 * attributes.corner(n, face, 1)[c]
                        + w2 * attributes.corner(n, face, 2)[c];
                }
            });

        Ok(image)
    }

    /// Projects the faces of one instance to pixel space, dropping degenerate ones.
    fn project(&self, vertices: &[Vec3<f32>], topology: &Topology) -> Vec<ScreenTriangle> {
        let half = self.size as f32 / 2.0;
        let to_screen = |v: Vec3<f32>| Vec3::new(v.x * half + half, v.y * half + half, v.z * half);

        topology
            .faces()
            .iter()
            .enumerate()
            .filter_map(|(face, indices)| {
                let [v0, v1, v2] = indices.map(|i| to_screen(vertices[i as usize]));
                let edges = Edges::new([v0.xy(), v1.xy(), v2.xy()])?;
                Some(ScreenTriangle {
                    face: face as u32,
                    edges,
                    depth: Vec3::new(v0.z, v1.z, v2.z),
                    min: Vec2::partial_min(Vec2::partial_min(v0.xy(), v1.xy()), v2.xy()),
                    max: Vec2::partial_max(Vec2::partial_max(v0.xy(), v1.xy()), v2.xy()),
                })
            })
            .collect()
    }

    /// Resolves the nearest face for every pixel of one tile.
    fn rasterize_tile(&self, triangles: &[ScreenTriangle], tile: &TileRect) -> TileBuffers {
        let len = tile.width * tile.height;
        let mut buffers = TileBuffers {
            depth: self.depth_pool.checkout(len, EMPTY_DEPTH),
            face: self.face_pool.checkout(len, NO_FACE),
            bary: self.bary_pool.checkout(len, [0.0; 3]),
        };

        let tile_min = Vec2::new(tile.x as f32, tile.y as f32);
        let tile_max = Vec2::new((tile.x + tile.width) as f32, (tile.y + tile.height) as f32);

        for triangle in triangles {
            // Bounding box check of the triangle against the tile
            if triangle.max.x < tile_min.x
                || triangle.min.x > tile_max.x
                || triangle.max.y < tile_min.y
                || triangle.min.y > tile_max.y
            {
                continue;
            }

            // Pixels whose centers fall inside the bounding box
            let min_x = (triangle.min.x - 0.5).ceil().max(tile_min.x) as usize;
            let max_x = ((triangle.max.x - 0.5).floor() + 1.0).min(tile_max.x) as usize;
            let min_y = (triangle.min.y - 0.5).ceil().max(tile_min.y) as usize;
            let max_y = ((triangle.max.y - 0.5).floor() + 1.0).min(tile_max.y) as usize;

            for ty in min_y..max_y {
                for tx in min_x..max_x {
                    let p = Vec2::new(tx as f32 + 0.5, ty as f32 + 0.5);
                    let Some(w) = triangle.edges.evaluate(p) else {
                        continue;
                    };

                    let z = w[0] * triangle.depth.x + w[1] * triangle.depth.y + w[2] * triangle.depth.z;
                    let idx = (ty - tile.y) * tile.width + (tx - tile.x);
                    if z < buffers.depth[idx] {
                        buffers.depth[idx] = z;
                        buffers.face[idx] = triangle.face;
                        buffers.bary[idx] = w;
                    }
                }
            }
        }

        buffers
    }
}
