//! Text surface files: `v x y z` vertex records and `f i j k` triangles.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::GeometryBuffer;
use crate::util::{Error, Result, Vec3};

/// Vertex color applied to loaded meshes when none is given.
pub const DEFAULT_SURFACE_COLOR: Vec3 = Vec3::splat(0.5);

impl GeometryBuffer {
    /// Load a triangulated surface file and color every vertex `color`.
    ///
    /// Blank lines and `#` comments are skipped. Any other leading token
    /// than `v` or `f` is rejected with [`Error::UnknownRecord`].
    pub fn from_surface_file(path: impl AsRef<Path>, color: Vec3) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let geom = Self::from_surface_reader(BufReader::new(file), color)?;
        log::info!(
            "Loaded {}: {} vertices, {} triangles",
            path.display(),
            geom.vertex_count(),
            geom.triangle_count()
        );
        Ok(geom)
    }

    /// Parse surface records from any buffered reader.
    pub fn from_surface_reader(reader: impl BufRead, color: Vec3) -> Result<Self> {
        let mut positions = Vec::new();
        let mut faces: Vec<(usize, [i64; 3])> = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("v") => positions.push(parse_vertex(tokens, line_no)?),
                Some("f") => faces.push((line_no, parse_face(tokens, line_no)?)),
                Some(token) => {
                    return Err(Error::UnknownRecord {
                        line: line_no,
                        token: token.to_string(),
                    })
                }
                None => {}
            }
        }

        let count = positions.len();
        let mut triangles = Vec::with_capacity(faces.len());
        for (line, face) in faces {
            let mut tri = [0u32; 3];
            for (slot, &index) in tri.iter_mut().zip(&face) {
                if index < 1 || index as usize > count {
                    return Err(Error::IndexOutOfRange { line, index, count });
                }
                *slot = (index - 1) as u32;
            }
            triangles.push(tri);
        }

        let colors = vec![color; count];
        Ok(Self::from_parts(positions, colors, triangles))
    }
}

fn parse_vertex<'a>(mut tokens: impl Iterator<Item = &'a str>, line: usize) -> Result<Vec3> {
    let mut xyz = [0.0f32; 3];
    for (axis, slot) in xyz.iter_mut().enumerate() {
        let token = tokens.next().ok_or_else(|| Error::MalformedRecord {
            line,
            reason: format!("vertex has {} of 3 coordinates", axis),
        })?;
        *slot = token.parse().map_err(|_| Error::MalformedRecord {
            line,
            reason: format!("bad coordinate \"{}\"", token),
        })?;
    }
    Ok(Vec3::from_array(xyz))
}

/// Face indices are 1-based. `i/t/n` forms keep only the position index.
fn parse_face<'a>(mut tokens: impl Iterator<Item = &'a str>, line: usize) -> Result<[i64; 3]> {
    let mut face = [0i64; 3];
    for (corner, slot) in face.iter_mut().enumerate() {
        let token = tokens.next().ok_or_else(|| Error::MalformedRecord {
            line,
            reason: format!("face has {} of 3 indices", corner),
        })?;
        let index = token.split('/').next().unwrap_or(token);
        *slot = index.parse().map_err(|_| Error::MalformedRecord {
            line,
            reason: format!("bad index \"{}\"", token),
        })?;
    }
    Ok(face)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Result<GeometryBuffer> {
        GeometryBuffer::from_surface_reader(Cursor::new(text), DEFAULT_SURFACE_COLOR)
    }

    #[test]
    fn test_parse_triangle() {
        let geom = parse("# tri\n\nv 0 0 0\nv 1 0 0\nv 0 0 -1\nf 1 2 3\n").unwrap();
        assert_eq!(geom.vertex_count(), 3);
        assert_eq!(geom.triangles(), &[[0, 1, 2]]);
        assert!(geom.colors().iter().all(|c| *c == DEFAULT_SURFACE_COLOR));
        assert_eq!(geom.normals()[0], Vec3::Y);
    }

    #[test]
    fn test_slash_face_indices() {
        let geom = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/4/7 2/5/8 3/6/9\n").unwrap();
        assert_eq!(geom.triangles(), &[[0, 1, 2]]);
    }

    #[test]
    fn test_unknown_record_is_rejected() {
        let err = parse("v 0 0 0\nvn 0 1 0\n").unwrap_err();
        match err {
            Error::UnknownRecord { line, token } => {
                assert_eq!(line, 2);
                assert_eq!(token, "vn");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_out_of_range_index() {
        let err = parse("v 0 0 0\nv 1 0 0\nf 1 2 3\n").unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { line: 3, index: 3, count: 2 }));
    }

    #[test]
    fn test_zero_index_is_out_of_range() {
        let err = parse("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n").unwrap_err();
        assert!(matches!(err, Error::IndexOutOfRange { index: 0, .. }));
    }

    #[test]
    fn test_short_vertex_is_malformed() {
        let err = parse("v 0 1\n").unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { line: 1, .. }));
    }
}
