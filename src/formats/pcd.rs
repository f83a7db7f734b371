//! PCD adapter: keyword/value header block feeding the shared layout
//! planner, with `DATA ascii` routed to the text decoder and `DATA
//! binary` to the byte decoder. The compressed variant is rejected,
//! not inflated.

use crate::decode::{ascii, binary, Endianness};
use crate::geom::GeometryDataset;
use crate::header::{ElementDecl, PropertyDecl, VertexLayout};
use crate::sniff::FormatTag;
use crate::util::{Error, Event, EventSink, Result, ScalarType};

fn scalar_for(type_code: &str, size: usize) -> Result<ScalarType> {
    let ty = match (type_code, size) {
        ("F", 4) => ScalarType::Float32,
        ("F", 8) => ScalarType::Float64,
        ("I", 1) => ScalarType::Int8,
        ("I", 2) => ScalarType::Int16,
        ("I", 4) => ScalarType::Int32,
        ("U", 1) => ScalarType::Uint8,
        ("U", 2) => ScalarType::Uint16,
        ("U", 4) => ScalarType::Uint32,
        _ => {
            return Err(Error::UnsupportedType(format!(
                "PCD field type {type_code}{size}"
            )))
        }
    };
    Ok(ty)
}

#[derive(Debug, Default)]
struct PcdHeader {
    fields: Vec<String>,
    sizes: Vec<usize>,
    type_codes: Vec<String>,
    counts: Vec<usize>,
    width: usize,
    height: usize,
    points: Option<usize>,
    data_kind: String,
    comments: Vec<String>,
}

/// Walk header lines over raw bytes, returning the parsed keywords and
/// the byte offset just past the `DATA` line.
fn parse_header(bytes: &[u8]) -> Result<(PcdHeader, usize)> {
    let mut header = PcdHeader::default();
    let mut line_start = 0usize;

    while line_start < bytes.len() {
        let line_end = bytes[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| line_start + p)
            .unwrap_or(bytes.len());
        let line = String::from_utf8_lossy(&bytes[line_start..line_end]);
        let line = line.trim();
        let next = line_end + 1;

        if let Some(rest) = line.strip_prefix('#') {
            header.comments.push(rest.trim().to_string());
            line_start = next;
            continue;
        }

        let mut tokens = line.split_whitespace();
        match tokens.next() {
            None => {}
            Some("VERSION") => {}
            Some("FIELDS") | Some("COLUMNS") => {
                header.fields = tokens.map(str::to_string).collect();
            }
            Some("SIZE") => {
                header.sizes = tokens.filter_map(|t| t.parse().ok()).collect();
            }
            Some("TYPE") => {
                header.type_codes = tokens.map(str::to_string).collect();
            }
            Some("COUNT") => {
                header.counts = tokens.filter_map(|t| t.parse().ok()).collect();
            }
            Some("WIDTH") => {
                header.width = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(0);
            }
            Some("HEIGHT") => {
                header.height = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(0);
            }
            Some("VIEWPOINT") => {}
            Some("POINTS") => {
                header.points = tokens.next().and_then(|t| t.parse().ok());
            }
            Some("DATA") => {
                header.data_kind = tokens.next().unwrap_or("").to_string();
                return Ok((header, next.min(bytes.len())));
            }
            Some(other) => {
                return Err(Error::malformed(format!("unknown PCD keyword {other:?}")));
            }
        }
        line_start = next;
    }

    Err(Error::UnterminatedHeader { scanned: bytes.len() })
}

/// Reduce the field list to a vertex element the shared planner accepts.
/// A field with COUNT > 1 expands into suffixed scalars so the stride
/// stays exact.
fn field_element(header: &PcdHeader, points: usize) -> Result<ElementDecl> {
    if header.fields.is_empty()
        || header.fields.len() != header.sizes.len()
        || header.fields.len() != header.type_codes.len()
    {
        return Err(Error::malformed("PCD FIELDS/SIZE/TYPE mismatch"));
    }

    let mut properties = Vec::with_capacity(header.fields.len());
    for (index, name) in header.fields.iter().enumerate() {
        let ty = scalar_for(&header.type_codes[index], header.sizes[index])?;
        let count = header.counts.get(index).copied().unwrap_or(1).max(1);
        if count == 1 {
            properties.push(PropertyDecl::Scalar { name: name.clone(), ty });
        } else {
            for sub in 0..count {
                properties.push(PropertyDecl::Scalar { name: format!("{name}_{sub}"), ty });
            }
        }
    }

    Ok(ElementDecl { name: "vertex".to_string(), count: points, properties })
}

/// Decode a PCD buffer into a dataset.
pub fn decode(bytes: &[u8], file_name: &str, sink: &dyn EventSink) -> Result<GeometryDataset> {
    let (header, data_offset) = parse_header(bytes)?;

    let points = header
        .points
        .unwrap_or(header.width * header.height);
    let element = field_element(&header, points)?;
    let layout = VertexLayout::plan(&element)?;

    sink.emit(Event::HeaderParsed {
        file_name: file_name.to_string(),
        vertices: points,
        faces: 0,
    });

    let mut dataset = GeometryDataset::allocate(
        file_name,
        FormatTag::Pcd,
        points,
        0,
        layout.has_colors,
        layout.has_normals,
    );
    dataset.comments = header.comments.clone();

    let data = &bytes[data_offset..];
    match header.data_kind.as_str() {
        "ascii" => {
            let text = String::from_utf8_lossy(data);
            ascii::decode_payload(&text, &layout, points, None, &mut dataset)?;
        }
        "binary" => {
            binary::decode_payload(data, &layout, points, None, Endianness::Little, &mut dataset)?;
        }
        other => {
            return Err(Error::UnsupportedType(format!("PCD DATA {other}")));
        }
    }

    sink.emit(Event::DecodeFinished {
        file_name: file_name.to_string(),
        decoded_vertices: dataset.decoded_vertices,
        faces: 0,
    });
    Ok(dataset)
}
