//! NPY depth-map adapter.
//!
//! Minimal reader for the NumPy array container: magic, version,
//! header-length field, a Python-literal header dict, then raw array
//! bytes. Depth corpora store little-endian float32/float64 2-D arrays;
//! everything else is rejected rather than guessed at.

use byteorder::{ByteOrder, LittleEndian};

use crate::geom::DepthImage;
use crate::sniff::NPY_MAGIC;
use crate::util::{Error, Event, EventSink, RecordKind, Result};

/// Pull the quoted value following `'key':` out of the header dict.
fn dict_str<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let at = header.find(&format!("'{key}'"))?;
    let rest = &header[at + key.len() + 2..];
    let colon = rest.find(':')?;
    let rest = rest[colon + 1..].trim_start();
    if let Some(stripped) = rest.strip_prefix('\'') {
        let end = stripped.find('\'')?;
        Some(&stripped[..end])
    } else {
        // Bare literal (True/False or a tuple); runs to the next comma at
        // top level or the closing brace.
        let end = rest.find(['}', ','])?;
        Some(rest[..end].trim())
    }
}

fn dict_shape(header: &str) -> Option<Vec<usize>> {
    let at = header.find("'shape'")?;
    let rest = &header[at..];
    let open = rest.find('(')?;
    let close = rest.find(')')?;
    rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse().ok())
        .collect()
}

/// Decode an NPY buffer to a depth image.
pub fn decode(bytes: &[u8], file_name: &str, sink: &dyn EventSink) -> Result<DepthImage> {
    if !bytes.starts_with(NPY_MAGIC) {
        return Err(Error::NotThisFormat("npy"));
    }
    if bytes.len() < 10 {
        return Err(Error::TruncatedData { at_record: 0, kind: RecordKind::Sample });
    }

    let major = bytes[6];
    let (header_start, header_len) = match major {
        1 => (10usize, LittleEndian::read_u16(&bytes[8..10]) as usize),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(Error::TruncatedData { at_record: 0, kind: RecordKind::Sample });
            }
            (12usize, LittleEndian::read_u32(&bytes[8..12]) as usize)
        }
        other => {
            return Err(Error::UnsupportedType(format!("NPY version {other}")));
        }
    };

    let header_bytes = bytes
        .get(header_start..header_start + header_len)
        .ok_or(Error::TruncatedData { at_record: 0, kind: RecordKind::Sample })?;
    let header = std::str::from_utf8(header_bytes)?;

    let descr = dict_str(header, "descr")
        .ok_or_else(|| Error::malformed("NPY header missing descr"))?;
    let item_width = match descr {
        "<f4" => 4usize,
        "<f8" => 8usize,
        other => return Err(Error::UnsupportedType(format!("NPY dtype {other}"))),
    };

    if dict_str(header, "fortran_order") == Some("True") {
        return Err(Error::UnsupportedType("NPY fortran_order arrays".to_string()));
    }

    let shape = dict_shape(header)
        .ok_or_else(|| Error::malformed("NPY header missing shape"))?;
    let [height, width] = shape[..] else {
        return Err(Error::UnsupportedType(format!("NPY rank-{} array", shape.len())));
    };

    sink.emit(Event::HeaderParsed {
        file_name: file_name.to_string(),
        vertices: width * height,
        faces: 0,
    });

    let data = &bytes[header_start + header_len..];
    let expected = width * height * item_width;
    if data.len() < expected {
        let row = if width * item_width == 0 { 0 } else { data.len() / (width * item_width) };
        return Err(Error::TruncatedData { at_record: row, kind: RecordKind::Sample });
    }

    let mut samples = Vec::with_capacity(width * height);
    match item_width {
        4 => {
            for field in data[..expected].chunks_exact(4) {
                samples.push(LittleEndian::read_f32(field));
            }
        }
        _ => {
            for field in data[..expected].chunks_exact(8) {
                samples.push(LittleEndian::read_f64(field) as f32);
            }
        }
    }

    sink.emit(Event::DecodeFinished {
        file_name: file_name.to_string(),
        decoded_vertices: width * height,
        faces: 0,
    });
    Ok(DepthImage::new(width, height, 1.0, samples))
}
