//! STL adapter: fixed binary records or the `solid … endsolid` text
//! grammar. Both variants produce triangle soup: three fresh vertices per
//! facet, the facet normal replicated onto each, faces indexing them in
//! order.

use byteorder::{ByteOrder, LittleEndian};
use smallvec::smallvec;

use crate::geom::GeometryDataset;
use crate::sniff::{stl_binary_size_matches, FormatTag, STL_HEADER_LEN, STL_RECORD_LEN};
use crate::util::{Error, Event, EventSink, RecordKind, Result};

/// Expand a 5-6-5 packed attribute word. Red sits in the top 5 bits.
fn unpack_rgb565(attr: u16) -> [u8; 3] {
    let r5 = (attr >> 11) & 0x1f;
    let g6 = (attr >> 5) & 0x3f;
    let b5 = attr & 0x1f;
    [
        (r5 as u32 * 255 / 31) as u8,
        (g6 as u32 * 255 / 63) as u8,
        (b5 as u32 * 255 / 31) as u8,
    ]
}

/// Decode the binary variant: 80-byte free-text header, little-endian
/// u32 triangle count, then 50-byte records (normal, 3 vertices,
/// attribute word). A nonzero attribute word carries packed color.
pub fn decode_binary(bytes: &[u8], file_name: &str, sink: &dyn EventSink) -> Result<GeometryDataset> {
    if bytes.len() < STL_HEADER_LEN + 4 {
        return Err(Error::NotThisFormat("stl"));
    }
    let triangle_count =
        LittleEndian::read_u32(&bytes[STL_HEADER_LEN..STL_HEADER_LEN + 4]) as usize;

    sink.emit(Event::HeaderParsed {
        file_name: file_name.to_string(),
        vertices: triangle_count * 3,
        faces: triangle_count,
    });

    let records = &bytes[STL_HEADER_LEN + 4..];

    // One cheap pass over the attribute words decides whether a color
    // buffer exists at all.
    let any_color = (0..triangle_count).any(|i| {
        records
            .get(i * STL_RECORD_LEN + 48..i * STL_RECORD_LEN + 50)
            .is_some_and(|w| LittleEndian::read_u16(w) != 0)
    });

    let mut dataset = GeometryDataset::allocate(
        file_name,
        FormatTag::StlBinary,
        triangle_count * 3,
        triangle_count,
        any_color,
        true,
    );

    for tri in 0..triangle_count {
        let start = tri * STL_RECORD_LEN;
        let Some(rec) = records.get(start..start + STL_RECORD_LEN) else {
            return Err(Error::TruncatedData { at_record: tri, kind: RecordKind::Face });
        };

        let normal = [
            LittleEndian::read_f32(&rec[0..]),
            LittleEndian::read_f32(&rec[4..]),
            LittleEndian::read_f32(&rec[8..]),
        ];
        let attr = LittleEndian::read_u16(&rec[48..]);
        let color = (attr != 0).then(|| unpack_rgb565(attr));

        for corner in 0..3 {
            let vertex = tri * 3 + corner;
            let field = 12 + corner * 12;
            for component in 0..3 {
                dataset.positions[vertex * 3 + component] =
                    LittleEndian::read_f32(&rec[field + component * 4..]);
            }
            if let Some(normals) = dataset.normals.as_mut() {
                normals[vertex * 3..vertex * 3 + 3].copy_from_slice(&normal);
            }
            if let (Some(colors), Some(rgb)) = (dataset.colors.as_mut(), color) {
                colors[vertex * 3..vertex * 3 + 3].copy_from_slice(&rgb);
            }
        }
        let base = (tri * 3) as u32;
        dataset.faces.push(smallvec![base, base + 1, base + 2]);
    }

    dataset.decoded_vertices = triangle_count * 3;
    sink.emit(Event::DecodeFinished {
        file_name: file_name.to_string(),
        decoded_vertices: dataset.decoded_vertices,
        faces: dataset.faces.len(),
    });
    Ok(dataset)
}

fn parse_triplet(tokens: &mut std::str::SplitWhitespace<'_>) -> [f32; 3] {
    let mut out = [0.0f32; 3];
    for component in &mut out {
        *component = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(0.0);
    }
    out
}

/// Decode the ASCII variant. Tolerates an immediately empty solid.
pub fn decode_ascii(bytes: &[u8], file_name: &str, sink: &dyn EventSink) -> Result<GeometryDataset> {
    let text = String::from_utf8_lossy(bytes);
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    match lines.next() {
        Some(line) if line == "solid" || line.starts_with("solid ") => {}
        _ => return Err(Error::NotThisFormat("stl")),
    }

    let mut positions: Vec<f32> = Vec::new();
    let mut normals: Vec<f32> = Vec::new();
    let mut faces = Vec::new();
    let mut facet_normal = [0.0f32; 3];

    for line in lines {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("facet") => {
                // `facet normal nx ny nz`
                let _ = tokens.next();
                facet_normal = parse_triplet(&mut tokens);
            }
            Some("vertex") => {
                let v = parse_triplet(&mut tokens);
                positions.extend_from_slice(&v);
                normals.extend_from_slice(&facet_normal);
            }
            Some("endsolid") => break,
            // `outer loop`, `endloop`, `endfacet` carry no data.
            _ => {}
        }
    }

    let vertex_count = positions.len() / 3;
    for tri in 0..vertex_count / 3 {
        let base = (tri * 3) as u32;
        faces.push(smallvec![base, base + 1, base + 2]);
    }

    let face_count = faces.len();
    let dataset = GeometryDataset {
        file_name: file_name.to_string(),
        source_format: Some(FormatTag::StlAscii),
        vertex_count,
        decoded_vertices: vertex_count,
        face_count,
        positions,
        colors: None,
        normals: Some(normals),
        faces,
        comments: Vec::new(),
    };

    sink.emit(Event::DecodeFinished {
        file_name: file_name.to_string(),
        decoded_vertices: vertex_count,
        faces: face_count,
    });
    Ok(dataset)
}

/// Decode either variant, trusting the size relation over the `solid`
/// prefix the way the sniffer does.
pub fn decode(bytes: &[u8], file_name: &str, sink: &dyn EventSink) -> Result<GeometryDataset> {
    if stl_binary_size_matches(bytes) {
        decode_binary(bytes, file_name, sink)
    } else {
        decode_ascii(bytes, file_name, sink)
    }
}
