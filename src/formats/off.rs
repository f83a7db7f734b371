//! OFF adapter: the free-form token polygon-list format.
//!
//! `OFF` keyword, a `vertices faces edges` counts line, then that many
//! vertex lines (xyz plus optional color columns) and face lines
//! (`n i0 i1 …`). Counts and data may be separated by comments and blank
//! lines anywhere.

use smallvec::SmallVec;

use crate::decode::color_byte;
use crate::geom::{FaceRecord, GeometryDataset};
use crate::sniff::FormatTag;
use crate::util::{Error, Event, EventSink, Result};

/// Decode an OFF buffer into a dataset.
pub fn decode(bytes: &[u8], file_name: &str, sink: &dyn EventSink) -> Result<GeometryDataset> {
    let text = String::from_utf8_lossy(bytes);
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    // The keyword line may carry the counts directly (`OFF nv nf ne`).
    let first = lines.next().ok_or(Error::NotThisFormat("off"))?;
    let mut counts_tokens: Vec<&str> = match first.split_whitespace().next() {
        Some("OFF") => first.split_whitespace().skip(1).collect(),
        _ => return Err(Error::NotThisFormat("off")),
    };
    if counts_tokens.is_empty() {
        let counts_line = lines
            .next()
            .ok_or_else(|| Error::malformed("OFF missing counts line"))?;
        counts_tokens = counts_line.split_whitespace().collect();
    }

    let mut counts = counts_tokens.iter().filter_map(|t| t.parse::<usize>().ok());
    let (vertex_count, face_count) = match (counts.next(), counts.next()) {
        (Some(v), Some(f)) => (v, f),
        _ => return Err(Error::malformed("OFF counts line is not numeric")),
    };

    sink.emit(Event::HeaderParsed {
        file_name: file_name.to_string(),
        vertices: vertex_count,
        faces: face_count,
    });

    let mut dataset = GeometryDataset::allocate(
        file_name,
        FormatTag::Off,
        vertex_count,
        face_count,
        false,
        false,
    );

    let mut colors: Vec<u8> = Vec::new();
    let mut any_color = false;
    let mut decoded = 0;
    for record in 0..vertex_count {
        let Some(line) = lines.next() else { break };
        let values: SmallVec<[f64; 7]> = line
            .split_whitespace()
            .filter_map(|t| t.parse().ok())
            .collect();
        for component in 0..3 {
            dataset.positions[record * 3 + component] =
                values.get(component).copied().unwrap_or(0.0) as f32;
        }
        // Optional color columns; [0,1] floats scale up, wider values
        // clamp as bytes.
        if values.len() >= 6 {
            any_color = true;
            let from_float = values[3..6].iter().all(|&v| v <= 1.0);
            for component in 3..6 {
                colors.push(color_byte(values[component], from_float));
            }
        } else {
            colors.extend_from_slice(&[0, 0, 0]);
        }
        decoded = record + 1;
    }
    dataset.decoded_vertices = decoded;
    if any_color {
        colors.resize(vertex_count * 3, 0);
        dataset.colors = Some(colors);
    }

    for _ in 0..face_count {
        let Some(line) = lines.next() else { break };
        let mut tokens = line.split_whitespace();
        let Some(size) = tokens.next().and_then(|t| t.parse::<usize>().ok()) else {
            continue;
        };
        let indices: FaceRecord = tokens
            .take(size)
            .filter_map(|t| t.parse::<u32>().ok())
            .collect();
        if indices.len() == size && size >= 3 {
            dataset.faces.push(indices);
        }
    }

    sink.emit(Event::DecodeFinished {
        file_name: file_name.to_string(),
        decoded_vertices: dataset.decoded_vertices,
        faces: dataset.faces.len(),
    });
    Ok(dataset)
}
