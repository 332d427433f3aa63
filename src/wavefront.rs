use crate::{MeshAsset, RenderError, RenderResult};
use std::path::Path;
use tracing::warn;
use vek::{Vec2, Vec3};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Wavefront {
    pub vertices: Vec<Vec3<f32>>,       // Positions
    pub texture_coords: Vec<Vec2<f32>>, // Texture coordinates
    pub normals: Vec<Vec3<f32>>,        // Normals
    pub indices: Vec<[u32; 3]>,         // Triangle vertex indices
    pub uv_indices: Vec<[u32; 3]>,      // Triangle texture coordinate indices
}

impl Wavefront {
    /// Parse an OBJ file from a given file path.
    pub fn parse_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Wavefront::parse_string(&contents)
    }

    /// Parse an OBJ file from a given string.
    ///
    /// Only triangles are accepted. Corners without a texture coordinate index reuse their
    /// vertex index.
    pub fn parse_string(contents: &str) -> RenderResult<Self> {
        let mut obj = Wavefront::default();
        let mut fallback_corners = 0;

        for (number, line) in contents.lines().enumerate() {
            let number = number + 1;
            let trimmed = line.trim();

            if trimmed.starts_with('#') || trimmed.is_empty() {
                continue; // Skip comments and empty lines
            }

            let mut items = trimmed.split_ascii_whitespace();
            let Some(keyword) = items.next() else {
                continue;
            };

            match keyword {
                "v" => {
                    let [x, y, z] = parse_floats(&mut items, number)?;
                    obj.vertices.push(Vec3::new(x, y, z));
                }
                "vn" => {
                    let [x, y, z] = parse_floats(&mut items, number)?;
                    obj.normals.push(Vec3::new(x, y, z));
                }
                "vt" => {
                    let [u, v] = parse_floats(&mut items, number)?;
                    obj.texture_coords.push(Vec2::new(u, v));
                }
                "f" => {
                    let corners: Vec<&str> = items.collect();
                    if corners.len() != 3 {
                        return Err(RenderError::parse(
                            number,
                            format!("expected a triangle, face has {} corners", corners.len()),
                        ));
                    }

                    let mut face = [0; 3];
                    let mut uv_face = [0; 3];
                    for (k, corner) in corners.iter().enumerate() {
                        let mut parts = corner.split('/');
                        let vertex = parts.next().unwrap_or_default();
                        face[k] = resolve_index(vertex, obj.vertices.len(), number)?;
                        uv_face[k] = match parts.next().filter(|part| !part.is_empty()) {
                            Some(uv) => resolve_index(uv, obj.texture_coords.len(), number)?,
                            None => {
                                fallback_corners += 1;
                                face[k]
                            }
                        };
                    }

                    obj.indices.push(face);
                    obj.uv_indices.push(uv_face);
                }
                // Groups, objects, materials and smoothing carry nothing we render
                _ => {}
            }
        }

        if fallback_corners > 0 {
            warn!(
                corners = fallback_corners,
                "face corners without texture coordinates use their vertex index"
            );
        }

        Ok(obj)
    }

    /// Convert the Wavefront object into a mesh asset.
    pub fn into_mesh_asset(self) -> MeshAsset {
        let uvcoords = if self.texture_coords.is_empty() {
            warn!("mesh has no texture coordinates, using vertex x and y");
            self.vertices.iter().map(|v| Vec2::new(v.x, v.y)).collect()
        } else {
            self.texture_coords
        };

        MeshAsset::new(self.vertices, self.indices, uvcoords, self.uv_indices)
    }
}

fn parse_floats<'a, const N: usize>(
    items: &mut impl Iterator<Item = &'a str>,
    line: usize,
) -> RenderResult<[f32; N]> {
    let mut values = [0.0; N];
    for value in &mut values {
        let item = items
            .next()
            .ok_or_else(|| RenderError::parse(line, format!("expected {N} numbers")))?;
        *value = item
            .parse()
            .map_err(|_| RenderError::parse(line, format!("`{item}` is not a number")))?;
    }
    Ok(values)
}

/// Resolves a one-based (or negative, relative) OBJ index to a zero-based one.
fn resolve_index(item: &str, count: usize, line: usize) -> RenderResult<u32> {
    let index: i64 = item
        .parse()
        .map_err(|_| RenderError::parse(line, format!("`{item}` is not an index")))?;
    let resolved = match index {
        i if i > 0 => i - 1,
        i if i < 0 => count as i64 + i,
        _ => return Err(RenderError::parse(line, "OBJ indices start at 1")),
    };
    if resolved < 0 || resolved >= count as i64 {
        return Err(RenderError::parse(
            line,
            format!("index {index} is out of range for {count} elements"),
        ));
    }
    Ok(resolved as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "
# unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
g quad
f 1/1/1 2/2/1 3/3/1
f 1/1/1 3/3/1 -1/-1/1
";

    #[test]
    fn test_parse_quad() {
        let obj = Wavefront::parse_string(QUAD).unwrap();
        assert_eq!(obj.vertices.len(), 4);
        assert_eq!(obj.texture_coords[2], Vec2::new(1.0, 1.0));
        assert_eq!(obj.normals.len(), 1);
        assert_eq!(obj.indices, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(obj.uv_indices, obj.indices);

        let asset = obj.into_mesh_asset();
        let (mesh, uv) = asset.topologies().unwrap();
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(uv.vertex_count(), 4);
    }

    #[test]
    fn test_missing_uv_indices_fall_back() {
        let obj = Wavefront::parse_string("v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nf 3 2//1 1/1\n")
            .unwrap();
        assert_eq!(obj.indices, vec![[2, 1, 0]]);
        assert_eq!(obj.uv_indices, vec![[2, 1, 0]]);
    }

    #[test]
    fn test_without_texture_coordinates() {
        let asset = Wavefront::parse_string("v 0 0 0\nv 2 0 0\nv 0 3 0\nf 1 2 3\n")
            .unwrap()
            .into_mesh_asset();
        assert_eq!(asset.uvcoords[2], Vec2::new(0.0, 3.0));
        assert!(asset.topologies().is_ok());
    }

    #[test]
    fn test_errors_report_lines() {
        let err = Wavefront::parse_string("v 0 0 0\nv 1 0\n").unwrap_err();
        assert!(matches!(err, RenderError::Parse { line: 2, .. }));

        let err = Wavefront::parse_string("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n").unwrap_err();
        assert!(matches!(err, RenderError::Parse { line: 5, .. }));

        assert!(Wavefront::parse_string("v 0 0 0\nf 1 1 2\n").is_err());
        assert!(Wavefront::parse_string("v 0 0 0\nf 0 1 1\n").is_err());
        assert!(Wavefront::parse_string("v x 0 0\n").is_err());
    }
}
