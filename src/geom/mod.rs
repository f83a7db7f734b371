//! In-memory geometry: the uniform output of every format adapter.

use smallvec::SmallVec;

use crate::sniff::FormatTag;

/// Ordered vertex indices of one polygon. Most records are triangles or
/// quads, so the indices live inline.
pub type FaceRecord = SmallVec<[u32; 4]>;

/// Columnar geometry buffers for one decoded dataset.
///
/// Created by a decoder, owned exclusively by the caller until handed to
/// the transfer packager. Append-only during decode, frozen after.
#[derive(Clone, Debug, Default)]
pub struct GeometryDataset {
    /// Provenance: the file this came from.
    pub file_name: String,
    /// Provenance: the format that produced it.
    pub source_format: Option<FormatTag>,
    /// Declared vertex count; the buffers are sized from this.
    pub vertex_count: usize,
    /// Vertices actually decoded. Below `vertex_count` when an ASCII data
    /// section ran out of lines; missing rows are never fabricated.
    pub decoded_vertices: usize,
    /// Declared face count.
    pub face_count: usize,
    /// xyz triples, `3 * vertex_count` long.
    pub positions: Vec<f32>,
    /// rgb triples, `3 * vertex_count` long when present.
    pub colors: Option<Vec<u8>>,
    /// Normal triples, `3 * vertex_count` long when present.
    pub normals: Option<Vec<f32>>,
    /// Decoded polygon records.
    pub faces: Vec<FaceRecord>,
    /// Header comments, order preserved.
    pub comments: Vec<String>,
}

impl GeometryDataset {
    /// Pre-allocate every columnar buffer at full declared size. Decoders
    /// call this before the first read so the hot loop never reallocates.
    pub fn allocate(
        file_name: impl Into<String>,
        source_format: FormatTag,
        vertex_count: usize,
        face_count: usize,
        with_colors: bool,
        with_normals: bool,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            source_format: Some(source_format),
            vertex_count,
            decoded_vertices: 0,
            face_count,
            positions: vec![0.0; vertex_count * 3],
            colors: with_colors.then(|| vec![0u8; vertex_count * 3]),
            normals: with_normals.then(|| vec![0.0f32; vertex_count * 3]),
            faces: Vec::with_capacity(face_count),
            comments: Vec::new(),
        }
    }

    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Total number of face-vertex indices.
    pub fn num_indices(&self) -> usize {
        self.faces.iter().map(|f| f.len()).sum()
    }

    /// Check this holds decodable geometry (positions at minimum).
    pub fn is_valid(&self) -> bool {
        !self.positions.is_empty() && self.positions.len() == self.vertex_count * 3
    }

    /// Bytes the per-vertex and face buffers occupy, as shipped on the
    /// wire. Drives the direct-vs-chunked transfer decision.
    pub fn payload_bytes(&self) -> usize {
        let mut total = self.positions.len() * 4;
        if let Some(colors) = &self.colors {
            total += colors.len();
        }
        if let Some(normals) = &self.normals {
            total += normals.len() * 4;
        }
        total + self.num_indices() * 4
    }

    /// Axis-aligned bounds over the decoded positions.
    pub fn compute_bounds(&self) -> Option<(glam::Vec3, glam::Vec3)> {
        if self.decoded_vertices == 0 {
            return None;
        }
        let mut min = glam::Vec3::splat(f32::MAX);
        let mut max = glam::Vec3::splat(f32::MIN);
        for chunk in self.positions[..self.decoded_vertices * 3].chunks_exact(3) {
            let p = glam::Vec3::new(chunk[0], chunk[1], chunk[2]);
            min = min.min(p);
            max = max.max(p);
        }
        Some((min, max))
    }
}

/// A width×height grid of float depth samples, row-major with the top row
/// first. Produced by the PFM/NPY adapters and by the out-of-scope image
/// codecs; consumed by the (also out-of-scope) camera projection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DepthImage {
    pub width: usize,
    pub height: usize,
    /// Magnitude of the source scale token; 1 when the source declared 0.
    pub scale: f32,
    /// `width * height` samples.
    pub samples: Vec<f32>,
}

impl DepthImage {
    pub fn new(width: usize, height: usize, scale: f32, samples: Vec<f32>) -> Self {
        debug_assert_eq!(samples.len(), width * height);
        Self { width, height, scale, samples }
    }

    /// Sample at (column, row), row 0 at the top.
    #[inline]
    pub fn sample(&self, x: usize, y: usize) -> f32 {
        self.samples[y * self.width + x]
    }
}
