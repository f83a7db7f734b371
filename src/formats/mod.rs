//! Format adapters and the decode entry points.
//!
//! Each adapter reduces its grammar to the shared layout planner and
//! decoders (or assembles the columnar dataset directly when counts are
//! only known after the walk) and produces the same uniform output.

pub mod npy;
pub mod obj;
pub mod off;
pub mod pcd;
pub mod pfm;
pub mod ply;
pub mod stl;
pub mod xyz;

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use rayon::prelude::*;

use crate::geom::{DepthImage, GeometryDataset};
use crate::sniff::{self, FormatTag};
use crate::util::{Error, Event, EventSink, Result};

/// What a decode produced. Geometry formats yield a dataset; depth-map
/// containers yield a sample grid for the projection collaborator.
/// Chosen once per decode and never mixed.
#[derive(Clone, Debug)]
pub enum Decoded {
    Geometry(GeometryDataset),
    Depth(DepthImage),
}

impl Decoded {
    pub fn as_geometry(&self) -> Option<&GeometryDataset> {
        match self {
            Self::Geometry(dataset) => Some(dataset),
            Self::Depth(_) => None,
        }
    }

    pub fn into_geometry(self) -> Option<GeometryDataset> {
        match self {
            Self::Geometry(dataset) => Some(dataset),
            Self::Depth(_) => None,
        }
    }

    pub fn as_depth(&self) -> Option<&DepthImage> {
        match self {
            Self::Geometry(_) => None,
            Self::Depth(image) => Some(image),
        }
    }
}

/// Sniff and decode one in-memory buffer.
///
/// An unrecognized buffer gets one shot at the permissive numeric-table
/// fallback before the failure is surfaced.
pub fn decode_bytes(bytes: &[u8], file_name: &str, sink: &dyn EventSink) -> Result<Decoded> {
    let Some(detection) = sniff::sniff(bytes, Some(file_name)) else {
        return xyz::decode(bytes, file_name, sink)
            .map(Decoded::Geometry)
            .map_err(|_| Error::UnrecognizedFormat(file_name.to_string()));
    };

    sink.emit(Event::FormatDetected {
        file_name: file_name.to_string(),
        format: detection.tag.as_str(),
    });

    match detection.tag {
        FormatTag::Ply => ply::decode(bytes, file_name, sink).map(Decoded::Geometry),
        FormatTag::StlBinary | FormatTag::StlAscii => {
            stl::decode(bytes, file_name, sink).map(Decoded::Geometry)
        }
        FormatTag::Pcd => pcd::decode(bytes, file_name, sink).map(Decoded::Geometry),
        FormatTag::Obj => obj::decode(bytes, file_name, sink).map(Decoded::Geometry),
        FormatTag::Off => off::decode(bytes, file_name, sink).map(Decoded::Geometry),
        FormatTag::Pfm => pfm::decode(bytes, file_name, sink).map(Decoded::Depth),
        FormatTag::Npy => npy::decode(bytes, file_name, sink).map(Decoded::Depth),
        FormatTag::Xyz => xyz::decode(bytes, file_name, sink).map(Decoded::Geometry),
    }
}

/// Memory-map a file and decode it.
pub fn decode_file(path: impl AsRef<Path>, sink: &dyn EventSink) -> Result<Decoded> {
    let path = path.as_ref();
    let file = File::open(path)?;
    // Safety: mapping is read-only and dropped before this returns.
    let mmap = unsafe { Mmap::map(&file) }?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    decode_bytes(&mmap, &file_name, sink)
}

/// Decode a batch of independent files in parallel.
///
/// Each file gets its own `Result`: a malformed file never aborts its
/// siblings, and no file's dataset is touched by another's decode.
pub fn decode_batch(paths: &[PathBuf], sink: &dyn EventSink) -> Vec<(PathBuf, Result<Decoded>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), decode_file(path, sink)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{NullSink, RecordingSink};
    use std::io::Write;

    #[test]
    fn test_dispatch_ply() {
        let bytes = b"ply\nformat ascii 1.0\nelement vertex 1\n\
property float x\nproperty float y\nproperty float z\nend_header\n1 2 3\n";
        let decoded = decode_bytes(bytes, "p.ply", &NullSink).unwrap();
        let ds = decoded.as_geometry().unwrap();
        assert_eq!(ds.source_format, Some(FormatTag::Ply));
    }

    #[test]
    fn test_dispatch_pfm_yields_depth() {
        let mut bytes = b"Pf\n1 1\n-1.0\n".to_vec();
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        let decoded = decode_bytes(&bytes, "d.pfm", &NullSink).unwrap();
        assert!(decoded.as_depth().is_some());
        assert!(decoded.as_geometry().is_none());
    }

    #[test]
    fn test_fallback_to_numeric_table() {
        let decoded = decode_bytes(b"1 2 3\n4 5 6\n", "points.dat", &NullSink).unwrap();
        let ds = decoded.into_geometry().unwrap();
        assert_eq!(ds.source_format, Some(FormatTag::Xyz));
        assert_eq!(ds.vertex_count, 2);
    }

    #[test]
    fn test_unrecognized_surfaces_error() {
        let err = decode_bytes(&[0u8, 1, 2, 3], "blob.bin", &NullSink).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedFormat(_)));
    }

    #[test]
    fn test_events_emitted() {
        let sink = RecordingSink::new();
        let bytes = b"ply\nformat ascii 1.0\nelement vertex 1\n\
property float x\nproperty float y\nproperty float z\nend_header\n1 2 3\n";
        decode_bytes(bytes, "p.ply", &sink).unwrap();

        let events = sink.drain();
        assert!(matches!(events[0], Event::FormatDetected { format: "ply", .. }));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::DecodeFinished { decoded_vertices: 1, .. })));
    }

    #[test]
    fn test_decode_file_and_batch() {
        let dir = tempfile::tempdir().unwrap();

        let good = dir.path().join("tri.ply");
        let mut f = File::create(&good).unwrap();
        f.write_all(
            b"ply\nformat ascii 1.0\nelement vertex 1\n\
property float x\nproperty float y\nproperty float z\nend_header\n7 8 9\n",
        )
        .unwrap();

        let bad = dir.path().join("broken.ply");
        let mut f = File::create(&bad).unwrap();
        f.write_all(b"ply\nformat ascii 1.0\nelement vertex 1\n").unwrap();

        let results = decode_batch(&[good.clone(), bad.clone()], &NullSink);
        assert_eq!(results.len(), 2);

        let by_path = |p: &PathBuf| results.iter().find(|(rp, _)| rp == p).unwrap();
        assert!(by_path(&good).1.is_ok());
        // The broken sibling fails alone.
        assert!(matches!(
            by_path(&bad).1,
            Err(Error::UnterminatedHeader { .. })
        ));
    }
}
