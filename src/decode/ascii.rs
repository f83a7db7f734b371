//! ASCII record decoding.
//!
//! Same contract as [`binary`](super::binary) but sourced from
//! whitespace/newline-tokenized text. Tolerates blank lines and irregular
//! internal whitespace without losing record alignment; bad numeric
//! tokens coerce to 0 rather than aborting the record.

use smallvec::SmallVec;

use crate::geom::GeometryDataset;
use crate::header::VertexLayout;
use crate::util::Result;

use super::{store_component, FaceListDecl};

#[inline]
fn parse_or_zero(token: Option<&str>) -> f64 {
    let value = token.and_then(|t| t.parse::<f64>().ok()).unwrap_or(0.0);
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

/// Decode an ASCII data section into `dataset`.
///
/// Consumes up to `vertex_count` non-empty lines for vertices, then up to
/// the declared face count for faces. If fewer data lines remain than
/// declared records, decodes what is there; the shortfall is observable
/// as `dataset.decoded_vertices < dataset.vertex_count` and a short
/// `faces` vec. Missing rows are never zero-filled as if present.
pub fn decode_payload(
    text: &str,
    layout: &VertexLayout,
    vertex_count: usize,
    faces: Option<&FaceListDecl>,
    dataset: &mut GeometryDataset,
) -> Result<()> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    let mut decoded = 0;
    for record in 0..vertex_count {
        let Some(line) = lines.next() else { break };
        let mut tokens = line.split_whitespace();
        for entry in &layout.entries {
            let value = parse_or_zero(tokens.next());
            store_component(dataset, record, entry, value);
        }
        decoded = record + 1;
    }
    dataset.decoded_vertices = decoded;

    if let Some(face_decl) = faces {
        for _ in 0..face_decl.count {
            let Some(line) = lines.next() else { break };
            let mut tokens = line.split_whitespace();
            let Some(size) = tokens.next().and_then(|t| t.parse::<usize>().ok()) else {
                continue;
            };
            let indices: SmallVec<[u32; 4]> = tokens
                .by_ref()
                .take(size)
                .filter_map(|t| t.parse::<u32>().ok())
                .collect();
            // A face whose index tokens are broken is dropped, not
            // decoded short with wrong topology.
            if indices.len() == size {
                dataset.faces.push(indices);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::GeometryDataset;
    use crate::header::{ElementDecl, PropertyDecl};
    use crate::sniff::FormatTag;
    use crate::util::ScalarType;

    fn layout(names: &[&str]) -> VertexLayout {
        let element = ElementDecl {
            name: "vertex".to_string(),
            count: 0,
            properties: names
                .iter()
                .map(|n| PropertyDecl::Scalar { name: n.to_string(), ty: ScalarType::Float32 })
                .collect(),
        };
        VertexLayout::plan(&element).unwrap()
    }

    #[test]
    fn test_basic_vertices_and_faces() {
        let layout = layout(&["x", "y", "z"]);
        let text = "1 2 3\n4 5 6\n7 8 9\n3 0 1 2\n";
        let face_decl = FaceListDecl { count: 1, count_ty: ScalarType::Uint8, item_ty: ScalarType::Int32 };
        let mut ds = GeometryDataset::allocate("t.ply", FormatTag::Ply, 3, 1, false, false);

        decode_payload(text, &layout, 3, Some(&face_decl), &mut ds).unwrap();

        assert_eq!(ds.positions, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(ds.decoded_vertices, 3);
        assert_eq!(ds.faces.len(), 1);
        assert_eq!(ds.faces[0].as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn test_irregular_whitespace_and_blank_lines() {
        let layout = layout(&["x", "y", "z"]);
        let text = "\n  1\t2   3  \n\n\n4 5\t\t6\n";
        let mut ds = GeometryDataset::allocate("t.ply", FormatTag::Ply, 2, 0, false, false);

        decode_payload(text, &layout, 2, None, &mut ds).unwrap();
        assert_eq!(ds.positions, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_bad_tokens_coerce_to_zero() {
        let layout = layout(&["x", "y", "z"]);
        let text = "1 oops 3\nnan 5 6\n";
        let mut ds = GeometryDataset::allocate("t.ply", FormatTag::Ply, 2, 0, false, false);

        decode_payload(text, &layout, 2, None, &mut ds).unwrap();
        assert_eq!(ds.positions, vec![1.0, 0.0, 3.0, 0.0, 5.0, 6.0]);
        assert_eq!(ds.decoded_vertices, 2);
    }

    #[test]
    fn test_short_data_reports_actual_count() {
        let layout = layout(&["x", "y", "z"]);
        let text = "1 2 3\n";
        let mut ds = GeometryDataset::allocate("t.ply", FormatTag::Ply, 3, 0, false, false);

        decode_payload(text, &layout, 3, None, &mut ds).unwrap();
        // Buffer keeps its declared size; the decoded count tells the truth.
        assert_eq!(ds.positions.len(), 9);
        assert_eq!(ds.decoded_vertices, 1);
        assert_eq!(ds.vertex_count, 3);
    }

    #[test]
    fn test_malformed_face_line_skipped() {
        let layout = layout(&["x", "y", "z"]);
        let text = "0 0 0\n3 0 zero 0\n3 0 0 0\n";
        let face_decl = FaceListDecl { count: 2, count_ty: ScalarType::Uint8, item_ty: ScalarType::Int32 };
        let mut ds = GeometryDataset::allocate("t.ply", FormatTag::Ply, 1, 2, false, false);

        decode_payload(text, &layout, 1, Some(&face_decl), &mut ds).unwrap();
        assert_eq!(ds.faces.len(), 1);
    }

    #[test]
    fn test_colors_from_ascii() {
        let element = ElementDecl {
            name: "vertex".to_string(),
            count: 0,
            properties: vec![
                PropertyDecl::Scalar { name: "x".into(), ty: ScalarType::Float32 },
                PropertyDecl::Scalar { name: "y".into(), ty: ScalarType::Float32 },
                PropertyDecl::Scalar { name: "z".into(), ty: ScalarType::Float32 },
                PropertyDecl::Scalar { name: "red".into(), ty: ScalarType::Uint8 },
                PropertyDecl::Scalar { name: "green".into(), ty: ScalarType::Uint8 },
                PropertyDecl::Scalar { name: "blue".into(), ty: ScalarType::Uint8 },
            ],
        };
        let layout = VertexLayout::plan(&element).unwrap();
        let mut ds = GeometryDataset::allocate("t.ply", FormatTag::Ply, 1, 0, true, false);

        decode_payload("0 0 0 255 128 0\n", &layout, 1, None, &mut ds).unwrap();
        assert_eq!(ds.colors.as_deref().unwrap(), &[255, 128, 0]);
    }
}
