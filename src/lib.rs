//! uvraster is a batched software rasterizer for deformable triangle meshes.
//! It renders meshes into image space, bakes per-vertex values into UV space and rebuilds detail normals from displacement maps.

pub mod buffer;
pub mod detail;
pub mod edge;
pub mod error;
pub mod gather;
pub mod lighting;
pub mod normals;
pub mod pool;
pub mod rasterizer;
pub mod renderer;
pub mod sample;
pub mod settings;
pub mod topology;
pub mod visualize;
pub mod wavefront;

// Re-exports
pub use crate::{
    buffer::{FaceAttributes, ImageBatch, VertexAttributes, VertexBatch},
    detail::{DetailMaps, DetailReconstructor},
    edge::Edges,
    error::{RenderError, RenderResult},
    gather::{FaceIndices, face_points, face_vertices},
    lighting::{Light, Lighting, ShCoefficients},
    normals::vertex_normals,
    rasterizer::{EMPTY_DEPTH, Fragments, NO_FACE, Rasterizer},
    renderer::{Rendering, UvGeometry, UvRenderer},
    sample::SampleMode,
    settings::RenderSettings,
    topology::{MeshAsset, Topology},
    wavefront::Wavefront,
};

// Prelude
pub mod prelude {
    pub use crate::{DetailMaps, DetailReconstructor};
    pub use crate::{FaceAttributes, ImageBatch, VertexAttributes, VertexBatch};
    pub use crate::{Fragments, Rasterizer};
    pub use crate::{Light, Lighting};
    pub use crate::{MeshAsset, Topology, Wavefront};
    pub use crate::{RenderError, RenderResult, RenderSettings};
    pub use crate::{Rendering, UvRenderer};
}
