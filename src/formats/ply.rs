//! PLY adapter: self-describing header, ASCII or binary payload.
//!
//! This is the format the header parser and layout planner exist for; the
//! adapter just wires them to the decoders. Also carries the crate's one
//! encoder path, a minimal binary-little-endian save-back.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::decode::{ascii, binary, Endianness, FaceListDecl};
use crate::geom::GeometryDataset;
use crate::header::{self, ElementDecl, HeaderEncoding, PropertyDecl, VertexLayout};
use crate::sniff::FormatTag;
use crate::util::{Error, Event, EventSink, Result};

fn face_list_decl(element: &ElementDecl) -> Option<FaceListDecl> {
    element.properties.iter().find_map(|p| match p {
        PropertyDecl::List { count_ty, item_ty, .. } => Some(FaceListDecl {
            count: element.count,
            count_ty: *count_ty,
            item_ty: *item_ty,
        }),
        PropertyDecl::Scalar { .. } => None,
    })
}

/// Decode a PLY buffer into a dataset.
pub fn decode(bytes: &[u8], file_name: &str, sink: &dyn EventSink) -> Result<GeometryDataset> {
    let (hdr, data_offset) = header::parse(bytes)?;

    let vertex = hdr
        .vertex_element()
        .ok_or_else(|| Error::malformed("header has no vertex element"))?;
    let layout = VertexLayout::plan(vertex)?;
    let faces = hdr.face_element().and_then(face_list_decl);
    let face_count = faces.map_or(0, |f| f.count);

    sink.emit(Event::HeaderParsed {
        file_name: file_name.to_string(),
        vertices: vertex.count,
        faces: face_count,
    });

    let mut dataset = GeometryDataset::allocate(
        file_name,
        FormatTag::Ply,
        vertex.count,
        face_count,
        layout.has_colors,
        layout.has_normals,
    );
    dataset.comments = hdr.comments.clone();

    let data = &bytes[data_offset..];
    match Endianness::from_encoding(hdr.encoding) {
        None => {
            let text = String::from_utf8_lossy(data);
            ascii::decode_payload(&text, &layout, vertex.count, faces.as_ref(), &mut dataset)?;
        }
        Some(endianness) => {
            binary::decode_payload(data, &layout, vertex.count, faces.as_ref(), endianness, &mut dataset)?;
        }
    }

    sink.emit(Event::DecodeFinished {
        file_name: file_name.to_string(),
        decoded_vertices: dataset.decoded_vertices,
        faces: dataset.faces.len(),
    });
    Ok(dataset)
}

/// Write a dataset back out as binary-little-endian PLY.
///
/// Only decoded vertices are written, so a short ASCII source never
/// round-trips fabricated zero rows.
pub fn write_to<W: Write>(dataset: &GeometryDataset, mut out: W) -> Result<()> {
    let count = dataset.decoded_vertices;

    let mut header_text = String::from("ply\n");
    header_text.push_str(&format!(
        "format {} 1.0\n",
        HeaderEncoding::BinaryLittleEndian.as_str()
    ));
    for comment in &dataset.comments {
        header_text.push_str(&format!("comment {comment}\n"));
    }
    header_text.push_str(&format!("element vertex {count}\n"));
    for axis in ["x", "y", "z"] {
        header_text.push_str(&format!("property float {axis}\n"));
    }
    if dataset.has_colors() {
        for channel in ["red", "green", "blue"] {
            header_text.push_str(&format!("property uchar {channel}\n"));
        }
    }
    if dataset.has_normals() {
        for axis in ["nx", "ny", "nz"] {
            header_text.push_str(&format!("property float {axis}\n"));
        }
    }
    header_text.push_str(&format!("element face {}\n", dataset.faces.len()));
    header_text.push_str("property list uchar uint vertex_indices\n");
    header_text.push_str("end_header\n");
    out.write_all(header_text.as_bytes())?;

    for record in 0..count {
        for component in 0..3 {
            out.write_f32::<LittleEndian>(dataset.positions[record * 3 + component])?;
        }
        if let Some(colors) = &dataset.colors {
            out.write_all(&colors[record * 3..record * 3 + 3])?;
        }
        if let Some(normals) = &dataset.normals {
            for component in 0..3 {
                out.write_f32::<LittleEndian>(normals[record * 3 + component])?;
            }
        }
    }

    for face in &dataset.faces {
        out.write_u8(face.len().min(u8::MAX as usize) as u8)?;
        for &index in face.iter().take(u8::MAX as usize) {
            out.write_u32::<LittleEndian>(index)?;
        }
    }

    Ok(())
}

/// [`write_to`] into a fresh buffer.
pub fn encode(dataset: &GeometryDataset) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(256 + dataset.payload_bytes());
    write_to(dataset, &mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::NullSink;

    fn ascii_ply() -> &'static str {
        "ply\n\
format ascii 1.0\n\
comment generated\n\
element vertex 3\n\
property float x\n\
property float y\n\
property float z\n\
property uchar red\n\
property uchar green\n\
property uchar blue\n\
element face 1\n\
property list uchar int vertex_indices\n\
end_header\n\
0 0 0 255 0 0\n\
1 0 0 0 255 0\n\
0 1 0 0 0 255\n\
3 0 1 2\n"
    }

    #[test]
    fn test_decode_ascii() {
        let ds = decode(ascii_ply().as_bytes(), "tri.ply", &NullSink).unwrap();
        assert_eq!(ds.vertex_count, 3);
        assert_eq!(ds.decoded_vertices, 3);
        assert_eq!(ds.positions[3..6], [1.0, 0.0, 0.0]);
        assert_eq!(ds.colors.as_deref().unwrap()[..3], [255, 0, 0]);
        assert_eq!(ds.faces.len(), 1);
        assert_eq!(ds.comments, vec!["generated"]);
    }

    #[test]
    fn test_decode_binary_little_endian() {
        let mut bytes = b"ply\nformat binary_little_endian 1.0\n\
element vertex 2\n\
property float x\nproperty float y\nproperty float z\n\
end_header\n"
            .to_vec();
        for v in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }

        let ds = decode(&bytes, "two.ply", &NullSink).unwrap();
        assert_eq!(ds.positions, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_decode_binary_big_endian() {
        let mut bytes = b"ply\nformat binary_big_endian 1.0\n\
element vertex 1\n\
property float x\nproperty float y\nproperty float z\n\
end_header\n"
            .to_vec();
        for v in [-1.5f32, 0.25, 9.0] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }

        let ds = decode(&bytes, "one.ply", &NullSink).unwrap();
        assert_eq!(ds.positions, vec![-1.5, 0.25, 9.0]);
    }

    #[test]
    fn test_missing_vertex_element() {
        let bytes = b"ply\nformat ascii 1.0\nelement face 0\n\
property list uchar int vertex_indices\nend_header\n";
        let err = decode(bytes, "faces.ply", &NullSink).unwrap_err();
        assert!(matches!(err, Error::MalformedHeader(_)));
    }

    #[test]
    fn test_save_back_roundtrip() {
        let original = decode(ascii_ply().as_bytes(), "tri.ply", &NullSink).unwrap();
        let encoded = encode(&original).unwrap();
        let reread = decode(&encoded, "tri.ply", &NullSink).unwrap();

        assert_eq!(reread.vertex_count, original.decoded_vertices);
        assert_eq!(reread.positions, original.positions);
        assert_eq!(reread.colors, original.colors);
        assert_eq!(reread.faces, original.faces);
    }
}
