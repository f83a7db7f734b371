//! Permissive numeric-table fallback.
//!
//! Minimal grammar for buffers nothing else recognized: each non-empty
//! line is a fixed number of whitespace-delimited numbers, and the
//! dominant column count across a sample of lines picks the global
//! interpretation.

use crate::geom::GeometryDataset;
use crate::sniff::FormatTag;
use crate::util::{Error, Event, EventSink, Result};

/// Lines sampled to settle the column count.
const SAMPLE_LINES: usize = 64;

/// Column layouts the grammar accepts, by count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TableShape {
    /// xyz
    Positions,
    /// xyz + intensity
    PositionsIntensity,
    /// xyz + rgb
    PositionsRgb,
    /// xyz + intensity + rgb
    PositionsIntensityRgb,
    /// xyz + rgb + normal
    PositionsRgbNormal,
}

impl TableShape {
    fn for_columns(columns: usize) -> Option<Self> {
        match columns {
            3 => Some(Self::Positions),
            4 => Some(Self::PositionsIntensity),
            6 => Some(Self::PositionsRgb),
            7 => Some(Self::PositionsIntensityRgb),
            9 => Some(Self::PositionsRgbNormal),
            _ => None,
        }
    }

    const fn columns(self) -> usize {
        match self {
            Self::Positions => 3,
            Self::PositionsIntensity => 4,
            Self::PositionsRgb => 6,
            Self::PositionsIntensityRgb => 7,
            Self::PositionsRgbNormal => 9,
        }
    }

    /// Offset of the rgb columns, if this shape has them.
    const fn rgb_at(self) -> Option<usize> {
        match self {
            Self::Positions | Self::PositionsIntensity => None,
            Self::PositionsRgb | Self::PositionsRgbNormal => Some(3),
            Self::PositionsIntensityRgb => Some(4),
        }
    }

    /// Offset of the normal columns, if this shape has them.
    const fn normal_at(self) -> Option<usize> {
        match self {
            Self::PositionsRgbNormal => Some(6),
            _ => None,
        }
    }
}

fn numeric_columns(line: &str) -> Option<usize> {
    let mut count = 0;
    for token in line.split_whitespace() {
        token.parse::<f64>().ok()?;
        count += 1;
    }
    (count > 0).then_some(count)
}

/// Pick the dominant accepted column count across the sample.
fn dominant_shape(lines: &[&str]) -> Option<TableShape> {
    let mut votes = [0usize; 10];
    for line in lines.iter().take(SAMPLE_LINES) {
        if let Some(columns) = numeric_columns(line) {
            if columns < votes.len() && TableShape::for_columns(columns).is_some() {
                votes[columns] += 1;
            }
        }
    }
    let best = (0..votes.len()).max_by_key(|&c| votes[c])?;
    if votes[best] == 0 {
        return None;
    }
    TableShape::for_columns(best)
}

/// Decode a whitespace-delimited numeric table into a point dataset.
/// Lines whose column count disagrees with the dominant shape are
/// skipped, not zero-filled.
pub fn decode(bytes: &[u8], file_name: &str, sink: &dyn EventSink) -> Result<GeometryDataset> {
    let text = String::from_utf8_lossy(bytes);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    let shape = dominant_shape(&lines)
        .ok_or_else(|| Error::UnrecognizedFormat(file_name.to_string()))?;

    let mut positions: Vec<f32> = Vec::with_capacity(lines.len() * 3);
    let mut colors: Vec<u8> = Vec::new();
    let mut normals: Vec<f32> = Vec::new();

    for line in &lines {
        let values: Vec<f64> = line
            .split_whitespace()
            .filter_map(|t| t.parse().ok())
            .collect();
        if values.len() != shape.columns() {
            continue;
        }

        for component in 0..3 {
            positions.push(values[component] as f32);
        }
        if let Some(at) = shape.rgb_at() {
            for component in 0..3 {
                colors.push(values[at + component].round().clamp(0.0, 255.0) as u8);
            }
        }
        if let Some(at) = shape.normal_at() {
            for component in 0..3 {
                normals.push(values[at + component] as f32);
            }
        }
    }

    let vertex_count = positions.len() / 3;
    let dataset = GeometryDataset {
        file_name: file_name.to_string(),
        source_format: Some(FormatTag::Xyz),
        vertex_count,
        decoded_vertices: vertex_count,
        face_count: 0,
        positions,
        colors: shape.rgb_at().map(|_| colors),
        normals: shape.normal_at().map(|_| normals),
        faces: Vec::new(),
        comments: Vec::new(),
    };

    sink.emit(Event::DecodeFinished {
        file_name: file_name.to_string(),
        decoded_vertices: vertex_count,
        faces: 0,
    });
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::NullSink;

    #[test]
    fn test_three_columns() {
        let ds = decode(b"1 2 3\n4 5 6\n", "pts.xyz", &NullSink).unwrap();
        assert_eq!(ds.positions, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(ds.colors.is_none());
        assert!(ds.normals.is_none());
    }

    #[test]
    fn test_six_columns_is_xyz_rgb_clamped() {
        let ds = decode(b"0 0 0 300 128 -5\n1 1 1 10 20 30\n", "pts.xyz", &NullSink).unwrap();
        let colors = ds.colors.as_deref().unwrap();
        assert_eq!(&colors[..3], &[255, 128, 0]);
        assert_eq!(&colors[3..6], &[10, 20, 30]);
        assert!(ds.normals.is_none());
    }

    #[test]
    fn test_seven_columns_intensity_then_rgb() {
        let ds = decode(b"0 0 0 0.9 10 20 30\n", "pts.xyz", &NullSink).unwrap();
        assert_eq!(ds.colors.as_deref().unwrap(), &[10, 20, 30]);
    }

    #[test]
    fn test_nine_columns_with_normals() {
        let ds = decode(b"0 0 0 10 20 30 0 0 1\n", "pts.xyz", &NullSink).unwrap();
        assert_eq!(ds.colors.as_deref().unwrap(), &[10, 20, 30]);
        assert_eq!(ds.normals.as_deref().unwrap(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_dominant_count_wins_and_odd_lines_skip() {
        let text = b"1 2 3\n4 5 6\n7 8 9 10 11\n10 11 12\n";
        let ds = decode(text, "pts.xyz", &NullSink).unwrap();
        // The 5-column line is not an accepted shape and is skipped.
        assert_eq!(ds.vertex_count, 3);
    }

    #[test]
    fn test_rejects_non_numeric() {
        let err = decode(b"alpha beta gamma\n", "notes.txt", &NullSink).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedFormat(_)));
    }
}
