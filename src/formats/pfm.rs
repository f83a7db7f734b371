//! PFM depth-map adapter.
//!
//! Header is four whitespace-separated tokens: `Pf` (1-channel) or `PF`
//! (3-channel) magic, width, height, and a signed scale whose sign picks
//! the payload endianness (negative = little). Payload rows are stored
//! bottom-to-top; the produced [`DepthImage`] is top-first.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::geom::DepthImage;
use crate::util::{Error, Event, EventSink, RecordKind, Result};

fn next_token<'a>(bytes: &'a [u8], cursor: &mut usize) -> Option<&'a [u8]> {
    while *cursor < bytes.len() && bytes[*cursor].is_ascii_whitespace() {
        *cursor += 1;
    }
    let start = *cursor;
    while *cursor < bytes.len() && !bytes[*cursor].is_ascii_whitespace() {
        *cursor += 1;
    }
    (start < *cursor).then(|| &bytes[start..*cursor])
}

fn parse_token<T: std::str::FromStr>(token: Option<&[u8]>, what: &str) -> Result<T> {
    token
        .and_then(|t| std::str::from_utf8(t).ok())
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| Error::malformed(format!("bad PFM {what} token")))
}

/// Decode a PFM buffer. The 3-channel variant keeps its first channel as
/// the depth sample.
pub fn decode(bytes: &[u8], file_name: &str, sink: &dyn EventSink) -> Result<DepthImage> {
    let mut cursor = 0usize;

    let channels = match next_token(bytes, &mut cursor) {
        Some(magic) if magic == b"Pf" => 1usize,
        Some(magic) if magic == b"PF" => 3usize,
        _ => return Err(Error::NotThisFormat("pfm")),
    };
    let width: usize = parse_token(next_token(bytes, &mut cursor), "width")?;
    let height: usize = parse_token(next_token(bytes, &mut cursor), "height")?;
    let scale_token: f32 = parse_token(next_token(bytes, &mut cursor), "scale")?;

    // Exactly one whitespace byte separates the scale token from the
    // payload.
    cursor += 1;

    // Sign picks endianness; every writer in practice is little-endian,
    // so a broken 0 token falls that way too.
    let little = scale_token <= 0.0;
    let scale = if scale_token == 0.0 { 1.0 } else { scale_token.abs() };

    sink.emit(Event::HeaderParsed {
        file_name: file_name.to_string(),
        vertices: width * height,
        faces: 0,
    });

    let row_stride = width * channels * 4;
    let mut samples = vec![0.0f32; width * height];

    for row in 0..height {
        let start = cursor + row * row_stride;
        let Some(row_bytes) = bytes.get(start..start + row_stride) else {
            return Err(Error::TruncatedData { at_record: row, kind: RecordKind::Sample });
        };
        // File rows run bottom-to-top.
        let out_row = height - 1 - row;
        for column in 0..width {
            let field = &row_bytes[column * channels * 4..];
            let value = if little {
                LittleEndian::read_f32(field)
            } else {
                BigEndian::read_f32(field)
            };
            samples[out_row * width + column] = value;
        }
    }

    sink.emit(Event::DecodeFinished {
        file_name: file_name.to_string(),
        decoded_vertices: width * height,
        faces: 0,
    });
    Ok(DepthImage::new(width, height, scale, samples))
}
