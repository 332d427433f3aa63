use vek::{Vec2, Vec3};

/// Twice the smallest triangle area (in pixels²) still treated as covering anything.
const MIN_DOUBLE_AREA: f32 = 1e-10;

/// Represents pre-computed edge functions of a screen-space triangle.
///
/// Edge `k` is the edge opposite vertex `k`, so evaluating the three edge functions at a
/// point and scaling by the inverse area yields its barycentric weights directly. The
/// sign of the area is folded in, so both windings cover the same pixels.
#[derive(Debug, Clone, Copy)]
pub struct Edges {
    a: Vec3<f32>,
    b: Vec3<f32>,
    c: Vec3<f32>,
    inv_area: f32,
}

impl Edges {
    /// Create edges from the three screen-space vertices. Returns `None` for triangles
    /// with (near) zero area, which never cover a pixel.
    pub fn new(v: [Vec2<f32>; 3]) -> Option<Self> {
        let [v0, v1, v2] = v;
        let area = (v1.x - v0.x) * (v2.y - v0.y) - (v1.y - v0.y) * (v2.x - v0.x);
        if !area.is_finite() || area.abs() <= MIN_DOUBLE_AREA {
            return None;
        }

        // Edge k runs from vertex k+1 to vertex k+2.
        let from = [v1, v2, v0];
        let to = [v2, v0, v1];
        let a = Vec3::new(
            from[0].y - to[0].y,
            from[1].y - to[1].y,
            from[2].y - to[2].y,
        );
        let b = Vec3::new(
            to[0].x - from[0].x,
            to[1].x - from[1].x,
            to[2].x - from[2].x,
        );
        let c = Vec3::new(
            from[0].x * to[0].y - from[0].y * to[0].x,
            from[1].x * to[1].y - from[1].y * to[1].x,
            from[2].x * to[2].y - from[2].y * to[2].x,
        );

        Some(Edges {
            a,
            b,
            c,
            inv_area: 1.0 / area,
        })
    }

    /// Evaluate all edges for a point and return its barycentric weights if the point
    /// is inside the triangle (edges included).
    #[inline(always)]
    pub fn evaluate(&self, p: Vec2<f32>) -> Option<[f32; 3]> {
        let w = (self.a * p.x + self.b * p.y + self.c) * self.inv_area;
        if w.x < 0.0 || w.y < 0.0 || w.z < 0.0 {
            return None;
        }
        let sum = w.x + w.y + w.z;
        if sum <= 0.0 {
            return None;
        }
        Some([w.x / sum, w.y / sum, w.z / sum])
    }
}
