//! Batched dense buffers flowing through the pipeline.
//!
//! All buffers are flat `Vec`s with a leading instance dimension. Images are stored
//! planar, `[instances, channels, height, width]`, so one channel of one instance is a
//! contiguous plane.

use crate::{RenderError, RenderResult};
use std::ops::Range;
use vek::Vec3;

/// Per-instance ordered 3D points, `[instances, vertices]`.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBatch {
    instances: usize,
    vertices: usize,
    data: Vec<Vec3<f32>>,
}

impl VertexBatch {
    pub fn new(instances: usize, vertices: usize, data: Vec<Vec3<f32>>) -> RenderResult<Self> {
        if data.len() != instances * vertices {
            return Err(RenderError::shape(format!(
                "vertex batch of {instances}x{vertices} needs {} points, got {}",
                instances * vertices,
                data.len()
            )));
        }
        Ok(Self {
            instances,
            vertices,
            data,
        })
    }

    /// Builds a batch from one point list per instance. All lists must have equal length.
    pub fn from_instances(instances: Vec<Vec<Vec3<f32>>>) -> RenderResult<Self> {
        let count = instances.len();
        let vertices = instances.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(count * vertices);
        for (n, points) in instances.into_iter().enumerate() {
            if points.len() != vertices {
                return Err(RenderError::shape(format!(
                    "instance {n} has {} vertices, expected {vertices}",
                    points.len()
                )));
            }
            data.extend(points);
        }
        Self::new(count, vertices, data)
    }

    /// A batch holding a single instance.
    pub fn single(vertices: Vec<Vec3<f32>>) -> Self {
        Self {
            instances: 1,
            vertices: vertices.len(),
            data: vertices,
        }
    }

    pub fn instances(&self) -> usize {
        self.instances
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices
    }

    pub fn data(&self) -> &[Vec3<f32>] {
        &self.data
    }

    #[inline(always)]
    pub fn instance(&self, n: usize) -> &[Vec3<f32>] {
        &self.data[n * self.vertices..(n + 1) * self.vertices]
    }

    pub fn iter_instances(&self) -> impl Iterator<Item = &[Vec3<f32>]> {
        (0..self.instances).map(|n| self.instance(n))
    }

    /// Returns a copy with `f` applied to every point.
    pub fn map(&self, f: impl Fn(Vec3<f32>) -> Vec3<f32>) -> Self {
        Self {
            instances: self.instances,
            vertices: self.vertices,
            data: self.data.iter().map(|p| f(*p)).collect(),
        }
    }

    /// Returns a copy with `offset` added to every z coordinate.
    pub fn offset_z(&self, offset: f32) -> Self {
        self.map(|p| Vec3::new(p.x, p.y, p.z + offset))
    }

    /// Fails with a descriptive error unless `self` and `other` have the same shape.
    pub fn expect_same_shape(&self, other: &VertexBatch, what: &str) -> RenderResult<()> {
        if self.instances != other.instances || self.vertices != other.vertices {
            return Err(RenderError::shape(format!(
                "{what}: expected {}x{} points, got {}x{}",
                self.instances, self.vertices, other.instances, other.vertices
            )));
        }
        Ok(())
    }
}

/// Per-vertex values with an arbitrary channel count, `[instances, vertices, channels]`.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttributes {
    instances: usize,
    vertices: usize,
    channels: usize,
    data: Vec<f32>,
}

impl VertexAttributes {
    pub fn new(
        instances: usize,
        vertices: usize,
        channels: usize,
        data: Vec<f32>,
    ) -> RenderResult<Self> {
        if data.len() != instances * vertices * channels {
            return Err(RenderError::shape(format!(
                "vertex attributes of {instances}x{vertices}x{channels} need {} values, got {}",
                instances * vertices * channels,
                data.len()
            )));
        }
        Ok(Self {
            instances,
            vertices,
            channels,
            data,
        })
    }

    pub fn instances(&self) -> usize {
        self.instances
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline(always)]
    pub fn value(&self, n: usize, v: usize) -> &[f32] {
        let start = (n * self.vertices + v) * self.channels;
        &self.data[start..start + self.channels]
    }
}

impl From<&VertexBatch> for VertexAttributes {
    fn from(batch: &VertexBatch) -> Self {
        let data = batch.data.iter().flat_map(|p| [p.x, p.y, p.z]).collect();
        Self {
            instances: batch.instances,
            vertices: batch.vertices,
            channels: 3,
            data,
        }
    }
}

/// Per-face-corner values, `[instances, faces, 3, channels]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceAttributes {
    instances: usize,
    faces: usize,
    channels: usize,
    data: Vec<f32>,
}

impl FaceAttributes {
    pub fn new(instances: usize, faces: usize, channels: usize, data: Vec<f32>) -> RenderResult<Self> {
        if data.len() != instances * faces * 3 * channels {
            return Err(RenderError::shape(format!(
                "face attributes of {instances}x{faces}x3x{channels} need {} values, got {}",
                instances * faces * 3 * channels,
                data.len()
            )));
        }
        Ok(Self {
            instances,
            faces,
            channels,
            data,
        })
    }

    /// Every corner of every face carries `value`.
    pub fn constant(instances: usize, faces: usize, value: &[f32]) -> Self {
        Self {
            instances,
            faces,
            channels: value.len(),
            data: value.repeat(instances * faces * 3),
        }
    }

    pub fn instances(&self) -> usize {
        self.instances
    }

    pub fn face_count(&self) -> usize {
        self.faces
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline(always)]
    pub fn corner(&self, n: usize, face: usize, k: usize) -> &[f32] {
        let start = ((n * self.faces + face) * 3 + k) * self.channels;
        &self.data[start..start + self.channels]
    }

    /// Concatenates the channels of `parts`, in order, corner by corner.
    ///
    /// Single-instance parts are shared by every instance of the result.
    pub fn concat(parts: &[&FaceAttributes]) -> RenderResult<Self> {
        let Some(first) = parts.first() else {
            return Err(RenderError::shape("cannot concatenate zero attribute buffers"));
        };
        let instances = parts.iter().map(|p| p.instances).max().unwrap_or(1);
        for part in parts {
            if (part.instances != instances && part.instances != 1) || part.faces != first.faces {
                return Err(RenderError::shape(format!(
                    "cannot concatenate attributes of {}x{} faces with {}x{} faces",
                    instances, first.faces, part.instances, part.faces
                )));
            }
        }

        let channels: usize = parts.iter().map(|p| p.channels).sum();
        let per_instance = first.faces * 3;
        let mut data = Vec::with_capacity(instances * per_instance * channels);
        for n in 0..instances {
            for corner in 0..per_instance {
                for part in parts {
                    let m = if part.instances == 1 { 0 } else { n };
                    let start = (m * per_instance + corner) * part.channels;
                    data.extend_from_slice(&part.data[start..start + part.channels]);
                }
            }
        }

        Ok(Self {
            instances,
            faces: first.faces,
            channels,
            data,
        })
    }
}

/// Planar image buffers, `[instances, channels, height, width]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBatch {
    instances: usize,
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl ImageBatch {
    pub fn new(
        instances: usize,
        channels: usize,
        height: usize,
        width: usize,
        data: Vec<f32>,
    ) -> RenderResult<Self> {
        if data.len() != instances * channels * height * width {
            return Err(RenderError::shape(format!(
                "image batch of {instances}x{channels}x{height}x{width} needs {} values, got {}",
                instances * channels * height * width,
                data.len()
            )));
        }
        Ok(Self {
            instances,
            channels,
            height,
            width,
            data,
        })
    }

    pub fn zeros(instances: usize, channels: usize, height: usize, width: usize) -> Self {
        Self::filled(instances, channels, height, width, 0.0)
    }

    pub fn filled(instances: usize, channels: usize, height: usize, width: usize, value: f32) -> Self {
        Self {
            instances,
            channels,
            height,
            width,
            data: vec![value; instances * channels * height * width],
        }
    }

    pub fn instances(&self) -> usize {
        self.instances
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline(always)]
    pub fn plane_len(&self) -> usize {
        self.height * self.width
    }

    /// The contiguous `height * width` plane of one channel of one instance.
    pub fn plane(&self, n: usize, c: usize) -> &[f32] {
        let len = self.plane_len();
        let start = (n * self.channels + c) * len;
        &self.data[start..start + len]
    }

    pub fn plane_mut(&mut self, n: usize, c: usize) -> &mut [f32] {
        let len = self.plane_len();
        let start = (n * self.channels + c) * len;
        &mut self.data[start..start + len]
    }

    #[inline(always)]
    pub fn get(&self, n: usize, c: usize, y: usize, x: usize) -> f32 {
        self.data[((n * self.channels + c) * self.height + y) * self.width + x]
    }

    #[inline(always)]
    pub fn set(&mut self, n: usize, c: usize, y: usize, x: usize, value: f32) {
        self.data[((n * self.channels + c) * self.height + y) * self.width + x] = value;
    }

    /// Copies the given channel range into a new batch.
    pub fn select(&self, channels: Range<usize>) -> RenderResult<Self> {
        if channels.start > channels.end || channels.end > self.channels {
            return Err(RenderError::shape(format!(
                "channel range {channels:?} is out of bounds for {} channels",
                self.channels
            )));
        }
        let count = channels.end - channels.start;
        let mut data = Vec::with_capacity(self.instances * count * self.plane_len());
        for n in 0..self.instances {
            for c in channels.clone() {
                data.extend_from_slice(self.plane(n, c));
            }
        }
        Self::new(self.instances, count, self.height, self.width, data)
    }

    /// Reads channels `first..first + 3` as one point per pixel, row-major.
    pub fn to_vertex_batch(&self, first: usize) -> RenderResult<VertexBatch> {
        if first + 3 > self.channels {
            return Err(RenderError::shape(format!(
                "need 3 channels from {first}, image has {}",
                self.channels
            )));
        }
        let len = self.plane_len();
        let mut data = Vec::with_capacity(self.instances * len);
        for n in 0..self.instances {
            let (x, y, z) = (
                self.plane(n, first),
                self.plane(n, first + 1),
                self.plane(n, first + 2),
            );
            data.extend((0..len).map(|i| Vec3::new(x[i], y[i], z[i])));
        }
        VertexBatch::new(self.instances, len, data)
    }

    /// Lays a batch of `height * width` points out as a 3 channel image.
    pub fn from_vertex_batch(batch: &VertexBatch, height: usize, width: usize) -> RenderResult<Self> {
        if batch.vertex_count() != height * width {
            return Err(RenderError::shape(format!(
                "{} points cannot fill a {height}x{width} image",
                batch.vertex_count()
            )));
        }
        let mut image = Self::zeros(batch.instances(), 3, height, width);
        for (n, points) in batch.iter_instances().enumerate() {
            for c in 0..3 {
                let plane = image.plane_mut(n, c);
                for (value, p) in plane.iter_mut().zip(points) {
                    *value = p[c];
                }
            }
        }
        Ok(image)
    }

    /// Element-wise product. `other` may have a single channel which is broadcast.
    pub fn mul(&self, other: &ImageBatch) -> RenderResult<Self> {
        self.combine(other, |a, b| a * b)
    }

    /// Returns a copy with `f` applied to every value.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            instances: self.instances,
            channels: self.channels,
            height: self.height,
            width: self.width,
            data: self.data.iter().map(|v| f(*v)).collect(),
        }
    }

    fn combine(&self, other: &ImageBatch, f: impl Fn(f32, f32) -> f32) -> RenderResult<Self> {
        if other.instances != self.instances
            || other.height != self.height
            || other.width != self.width
            || (other.channels != self.channels && other.channels != 1)
        {
            return Err(RenderError::shape(format!(
                "cannot combine images of {}x{}x{}x{} and {}x{}x{}x{}",
                self.instances,
                self.channels,
                self.height,
                self.width,
                other.instances,
                other.channels,
                other.height,
                other.width
            )));
        }

        let mut out = self.clone();
        for n in 0..self.instances {
            for c in 0..self.channels {
                let oc = if other.channels == 1 { 0 } else { c };
                let rhs = other.plane(n, oc);
                for (value, b) in out.plane_mut(n, c).iter_mut().zip(rhs) {
                    *value = f(*value, *b);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_batch_shape() {
        assert!(VertexBatch::new(2, 3, vec![Vec3::zero(); 5]).is_err());
        let batch = VertexBatch::from_instances(vec![
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)],
            vec![Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0)],
        ])
        .unwrap();
        assert_eq!(batch.instances(), 2);
        assert_eq!(batch.instance(1)[1], Vec3::new(0.0, 0.0, 1.0));

        let ragged = VertexBatch::from_instances(vec![vec![Vec3::zero()], vec![]]);
        assert!(ragged.is_err());
    }

    #[test]
    fn test_concat_shares_single_instance_parts() {
        let shared = FaceAttributes::constant(1, 1, &[9.0]);
        let own = FaceAttributes::new(2, 1, 1, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]).unwrap();
        let both = FaceAttributes::concat(&[&shared, &own]).unwrap();
        assert_eq!(both.instances(), 2);
        assert_eq!(both.corner(0, 0, 1), &[9.0, 1.0]);
        assert_eq!(both.corner(1, 0, 2), &[9.0, 2.0]);

        let three = FaceAttributes::constant(3, 1, &[0.0]);
        assert!(FaceAttributes::concat(&[&own, &three]).is_err());
    }

    #[test]
    fn test_concat_interleaves_channels() {
        let a = FaceAttributes::constant(1, 2, &[1.0]);
        let b = FaceAttributes::constant(1, 2, &[2.0, 3.0]);
        let both = FaceAttributes::concat(&[&a, &b]).unwrap();
        assert_eq!(both.channels(), 3);
        assert_eq!(both.corner(0, 1, 2), &[1.0, 2.0, 3.0]);

        let other = FaceAttributes::constant(1, 3, &[0.0]);
        assert!(FaceAttributes::concat(&[&a, &other]).is_err());
    }

    #[test]
    fn test_image_select_and_points() {
        let mut image = ImageBatch::zeros(1, 4, 2, 2);
        image.set(0, 1, 1, 0, 5.0);
        image.set(0, 3, 0, 1, 7.0);

        let tail = image.select(1..4).unwrap();
        assert_eq!(tail.channels(), 3);
        assert_eq!(tail.get(0, 0, 1, 0), 5.0);

        let points = tail.to_vertex_batch(0).unwrap();
        assert_eq!(points.vertex_count(), 4);
        assert_eq!(points.instance(0)[2], Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(points.instance(0)[1], Vec3::new(0.0, 0.0, 7.0));

        let back = ImageBatch::from_vertex_batch(&points, 2, 2).unwrap();
        assert_eq!(back, tail);
        assert!(image.select(2..5).is_err());
    }

    #[test]
    fn test_mul_broadcasts_single_channel() {
        let color = ImageBatch::filled(1, 3, 2, 2, 0.5);
        let mut mask = ImageBatch::zeros(1, 1, 2, 2);
        mask.set(0, 0, 0, 0, 1.0);

        let masked = color.mul(&mask).unwrap();
        assert_eq!(masked.get(0, 2, 0, 0), 0.5);
        assert_eq!(masked.get(0, 2, 1, 1), 0.0);
        assert!(color.mul(&ImageBatch::zeros(1, 2, 2, 2)).is_err());
    }
}
