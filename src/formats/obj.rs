//! OBJ adapter: line-keyword dispatch over `v`/`vn`/`vt`/`f` plus
//! material-library references. Counts are unknown until the walk
//! finishes, so this adapter assembles its buffers directly instead of
//! going through the fixed-stride planner.

use smallvec::SmallVec;

use crate::decode::color_byte;
use crate::geom::{FaceRecord, GeometryDataset};
use crate::sniff::FormatTag;
use crate::util::{Error, Event, EventSink, Result};

/// Resolve one `f` token to a 0-based vertex index. OBJ indices are
/// 1-based; negative values count back from the vertices seen so far.
fn resolve_index(token: &str, vertex_count: usize) -> Option<u32> {
    let vertex_part = token.split('/').next()?;
    let raw: i64 = vertex_part.parse().ok()?;
    let resolved = if raw > 0 {
        raw - 1
    } else if raw < 0 {
        vertex_count as i64 + raw
    } else {
        return None;
    };
    (0..vertex_count as i64)
        .contains(&resolved)
        .then_some(resolved as u32)
}

/// Decode an OBJ buffer into a dataset.
pub fn decode(bytes: &[u8], file_name: &str, sink: &dyn EventSink) -> Result<GeometryDataset> {
    let text = String::from_utf8_lossy(bytes);

    let mut positions: Vec<f32> = Vec::new();
    let mut colors: Vec<u8> = Vec::new();
    let mut vertex_normals: Vec<f32> = Vec::new();
    let mut faces: Vec<FaceRecord> = Vec::new();
    let mut comments: Vec<String> = Vec::new();
    let mut any_color = false;
    let mut saw_geometry = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            comments.push(rest.trim().to_string());
            continue;
        }

        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                saw_geometry = true;
                let values: SmallVec<[f64; 6]> =
                    tokens.filter_map(|t| t.parse().ok()).collect();
                for component in 0..3 {
                    positions.push(values.get(component).copied().unwrap_or(0.0) as f32);
                }
                // Vertex-color extension: `v x y z r g b` with [0,1] floats.
                if values.len() >= 6 {
                    any_color = true;
                    for component in 3..6 {
                        colors.push(color_byte(values[component], true));
                    }
                } else {
                    colors.extend_from_slice(&[0, 0, 0]);
                }
            }
            Some("vn") => {
                saw_geometry = true;
                let mut values = tokens.filter_map(|t| t.parse::<f32>().ok());
                for _ in 0..3 {
                    vertex_normals.push(values.next().unwrap_or(0.0));
                }
            }
            Some("vt") => {
                // Texture coordinates have no slot in this dataset model.
                saw_geometry = true;
            }
            Some("f") => {
                saw_geometry = true;
                let vertex_count = positions.len() / 3;
                let indices: Option<FaceRecord> = tokens
                    .map(|t| resolve_index(t, vertex_count))
                    .collect();
                // A malformed index token drops this face, never the file.
                match indices {
                    Some(face) if face.len() >= 3 => faces.push(face),
                    _ => {}
                }
            }
            Some("mtllib") | Some("usemtl") => {
                comments.push(line.to_string());
            }
            Some("o") | Some("g") | Some("s") | Some("l") | Some("p") => {}
            _ => {}
        }
    }

    if !saw_geometry {
        return Err(Error::NotThisFormat("obj"));
    }

    let vertex_count = positions.len() / 3;
    // Normal indices live in their own space in this format; they only
    // line up with positions when the counts agree (the common exporter
    // case). Anything else would mis-index, so the data is dropped.
    let normals =
        (vertex_normals.len() == positions.len() && vertex_count > 0).then_some(vertex_normals);

    let face_count = faces.len();
    let dataset = GeometryDataset {
        file_name: file_name.to_string(),
        source_format: Some(FormatTag::Obj),
        vertex_count,
        decoded_vertices: vertex_count,
        face_count,
        positions,
        colors: any_color.then_some(colors),
        normals,
        faces,
        comments,
    };

    sink.emit(Event::DecodeFinished {
        file_name: file_name.to_string(),
        decoded_vertices: vertex_count,
        faces: face_count,
    });
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::NullSink;

    #[test]
    fn test_basic_triangle() {
        let text = "# a triangle\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let ds = decode(text.as_bytes(), "tri.obj", &NullSink).unwrap();
        assert_eq!(ds.vertex_count, 3);
        assert_eq!(ds.faces.len(), 1);
        assert_eq!(ds.faces[0].as_slice(), &[0, 1, 2]);
        assert_eq!(ds.comments, vec!["a triangle"]);
    }

    #[test]
    fn test_slash_and_negative_indices() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/1 2/1 -1/1\n";
        let ds = decode(text.as_bytes(), "tri.obj", &NullSink).unwrap();
        assert_eq!(ds.faces[0].as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn test_malformed_face_skipped() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 oops 3\nf 1 2 3\n";
        let ds = decode(text.as_bytes(), "tri.obj", &NullSink).unwrap();
        assert_eq!(ds.faces.len(), 1);
    }

    #[test]
    fn test_out_of_range_face_skipped() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n";
        let ds = decode(text.as_bytes(), "tri.obj", &NullSink).unwrap();
        assert!(ds.faces.is_empty());
    }

    #[test]
    fn test_vertex_colors() {
        let text = "v 0 0 0 1.0 0.0 0.5\nv 1 0 0 0.0 1.0 0.0\nv 0 1 0 0.0 0.0 1.0\nf 1 2 3\n";
        let ds = decode(text.as_bytes(), "color.obj", &NullSink).unwrap();
        let colors = ds.colors.as_deref().unwrap();
        assert_eq!(&colors[..3], &[255, 0, 128]);
        assert_eq!(&colors[3..6], &[0, 255, 0]);
    }

    #[test]
    fn test_normals_attach_when_aligned() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\n\
vn 0 0 1\nvn 0 0 1\nvn 0 0 1\nf 1 2 3\n";
        let ds = decode(text.as_bytes(), "n.obj", &NullSink).unwrap();
        assert_eq!(ds.normals.as_deref().unwrap().len(), 9);

        // Mismatched count: normals dropped rather than mis-indexed.
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1 2 3\n";
        let ds = decode(text.as_bytes(), "n.obj", &NullSink).unwrap();
        assert!(ds.normals.is_none());
    }

    #[test]
    fn test_mtllib_recorded() {
        let text = "mtllib scene.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl steel\nf 1 2 3\n";
        let ds = decode(text.as_bytes(), "m.obj", &NullSink).unwrap();
        assert!(ds.comments.iter().any(|c| c == "mtllib scene.mtl"));
        assert!(ds.comments.iter().any(|c| c == "usemtl steel"));
    }

    #[test]
    fn test_not_obj() {
        let err = decode(b"random words here\n", "x.obj", &NullSink).unwrap_err();
        assert!(matches!(err, Error::NotThisFormat("obj")));
    }
}
