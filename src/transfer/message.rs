//! Wire messages for the cross-process geometry transfer.
//!
//! Four kinds: one direct transfer carrying every buffer, or a
//! `start / chunk… / complete` sequence. In-process transports hand the
//! message by value, so the buffers cross without re-encoding. For byte
//! transports there is a length-delimited binary framing; bulk buffers
//! are written as raw casts (both ends share the host byte order),
//! scalar fields as little-endian.

use byteorder::{ByteOrder, LittleEndian};
use smallvec::SmallVec;

use crate::geom::{FaceRecord, GeometryDataset};
use crate::util::{Error, Result};

/// Per-message kind discriminants on the wire.
const KIND_DIRECT: u8 = 1;
const KIND_START: u8 = 2;
const KIND_CHUNK: u8 = 3;
const KIND_COMPLETE: u8 = 4;

/// Metadata opening a chunked transfer. Faces ship here, once: they are
/// comparatively small next to the per-vertex buffers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkStart {
    pub file_name: String,
    /// Declared vertex total; the reassembler sizes its buffers from this.
    pub total_vertices: u32,
    /// Vertices the decoder actually produced (≤ `total_vertices`).
    pub decoded_vertices: u32,
    pub total_chunks: u32,
    /// Vertices per chunk this stream was sliced with.
    pub chunk_vertices: u32,
    pub has_colors: bool,
    pub has_normals: bool,
    pub format: String,
    pub comments: Vec<String>,
    pub faces: Vec<FaceRecord>,
}

/// One bounded slice of the per-vertex buffers.
///
/// `chunk_index` runs 0..`total_chunks`; delivery order is not assumed,
/// the consumer keys by index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransferChunk {
    pub file_name: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub positions: Vec<f32>,
    pub colors: Option<Vec<u8>>,
    pub normals: Option<Vec<f32>>,
}

impl TransferChunk {
    /// Vertices carried by this chunk.
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// One message crossing the process boundary.
#[derive(Clone, Debug)]
pub enum WireMessage {
    Direct(GeometryDataset),
    ChunkStart(ChunkStart),
    Chunk(TransferChunk),
    ChunkComplete { file_name: String },
}

impl WireMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Direct(_) => "direct-transfer",
            Self::ChunkStart(_) => "chunk-start",
            Self::Chunk(_) => "chunk",
            Self::ChunkComplete { .. } => "chunk-complete",
        }
    }

    /// Bytes of bulk payload this message carries. What a size-capped
    /// transport meters.
    pub fn payload_bytes(&self) -> usize {
        match self {
            Self::Direct(dataset) => dataset.payload_bytes(),
            Self::ChunkStart(start) => {
                start.faces.iter().map(|f| f.len() * 4).sum::<usize>()
            }
            Self::Chunk(chunk) => {
                chunk.positions.len() * 4
                    + chunk.colors.as_ref().map_or(0, |c| c.len())
                    + chunk.normals.as_ref().map_or(0, |n| n.len() * 4)
            }
            Self::ChunkComplete { .. } => 0,
        }
    }
}

// === Framing ===

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_string(out: &mut Vec<u8>, value: &str) {
    put_u32(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
}

fn put_strings(out: &mut Vec<u8>, values: &[String]) {
    put_u32(out, values.len() as u32);
    for value in values {
        put_string(out, value);
    }
}

fn put_f32s(out: &mut Vec<u8>, values: &[f32]) {
    put_u32(out, values.len() as u32);
    out.extend_from_slice(bytemuck::cast_slice(values));
}

fn put_bytes(out: &mut Vec<u8>, values: &[u8]) {
    put_u32(out, values.len() as u32);
    out.extend_from_slice(values);
}

fn put_opt_f32s(out: &mut Vec<u8>, values: Option<&[f32]>) {
    match values {
        Some(values) => {
            out.push(1);
            put_f32s(out, values);
        }
        None => out.push(0),
    }
}

fn put_opt_bytes(out: &mut Vec<u8>, values: Option<&[u8]>) {
    match values {
        Some(values) => {
            out.push(1);
            put_bytes(out, values);
        }
        None => out.push(0),
    }
}

fn put_faces(out: &mut Vec<u8>, faces: &[FaceRecord]) {
    put_u32(out, faces.len() as u32);
    for face in faces {
        put_u32(out, face.len() as u32);
        out.extend_from_slice(bytemuck::cast_slice(face.as_slice()));
    }
}

/// Bounds-checked cursor over a received frame.
struct FrameReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + len)
            .ok_or_else(|| Error::reassembly("truncated wire message"))?;
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    fn strings(&mut self) -> Result<Vec<String>> {
        let count = self.u32()? as usize;
        let mut out = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            out.push(self.string()?);
        }
        Ok(out)
    }

    fn f32s(&mut self) -> Result<Vec<f32>> {
        let len = self.u32()? as usize;
        Ok(bytemuck::pod_collect_to_vec(self.take(len * 4)?))
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn opt_f32s(&mut self) -> Result<Option<Vec<f32>>> {
        Ok(if self.bool()? { Some(self.f32s()?) } else { None })
    }

    fn opt_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(if self.bool()? { Some(self.bytes()?) } else { None })
    }

    fn faces(&mut self) -> Result<Vec<FaceRecord>> {
        let count = self.u32()? as usize;
        let mut out = Vec::with_capacity(count.min(1 << 20));
        for _ in 0..count {
            let len = self.u32()? as usize;
            let indices: SmallVec<[u32; 4]> =
                bytemuck::pod_collect_to_vec::<u8, u32>(self.take(len * 4)?).into();
            out.push(indices);
        }
        Ok(out)
    }
}

impl WireMessage {
    /// Serialize for a byte transport.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload_bytes() + 256);
        match self {
            Self::Direct(dataset) => {
                out.push(KIND_DIRECT);
                put_string(&mut out, &dataset.file_name);
                put_string(
                    &mut out,
                    dataset.source_format.map_or("", |f| f.as_str()),
                );
                put_u32(&mut out, dataset.vertex_count as u32);
                put_u32(&mut out, dataset.decoded_vertices as u32);
                put_strings(&mut out, &dataset.comments);
                put_f32s(&mut out, &dataset.positions);
                put_opt_bytes(&mut out, dataset.colors.as_deref());
                put_opt_f32s(&mut out, dataset.normals.as_deref());
                put_faces(&mut out, &dataset.faces);
            }
            Self::ChunkStart(start) => {
                out.push(KIND_START);
                put_string(&mut out, &start.file_name);
                put_u32(&mut out, start.total_vertices);
                put_u32(&mut out, start.decoded_vertices);
                put_u32(&mut out, start.total_chunks);
                put_u32(&mut out, start.chunk_vertices);
                out.push(start.has_colors as u8);
                out.push(start.has_normals as u8);
                put_string(&mut out, &start.format);
                put_strings(&mut out, &start.comments);
                put_faces(&mut out, &start.faces);
            }
            Self::Chunk(chunk) => {
                out.push(KIND_CHUNK);
                put_string(&mut out, &chunk.file_name);
                put_u32(&mut out, chunk.chunk_index);
                put_u32(&mut out, chunk.total_chunks);
                put_f32s(&mut out, &chunk.positions);
                put_opt_bytes(&mut out, chunk.colors.as_deref());
                put_opt_f32s(&mut out, chunk.normals.as_deref());
            }
            Self::ChunkComplete { file_name } => {
                out.push(KIND_COMPLETE);
                put_string(&mut out, file_name);
            }
        }
        out
    }

    /// Parse one frame produced by [`Self::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = FrameReader::new(bytes);
        let message = match reader.u8()? {
            KIND_DIRECT => {
                let file_name = reader.string()?;
                let format = reader.string()?;
                let vertex_count = reader.u32()? as usize;
                let decoded_vertices = reader.u32()? as usize;
                let comments = reader.strings()?;
                let positions = reader.f32s()?;
                let colors = reader.opt_bytes()?;
                let normals = reader.opt_f32s()?;
                let faces = reader.faces()?;
                let face_count = faces.len();
                Self::Direct(GeometryDataset {
                    file_name,
                    source_format: crate::sniff::FormatTag::from_tag(&format),
                    vertex_count,
                    decoded_vertices,
                    face_count,
                    positions,
                    colors,
                    normals,
                    faces,
                    comments,
                })
            }
            KIND_START => Self::ChunkStart(ChunkStart {
                file_name: reader.string()?,
                total_vertices: reader.u32()?,
                decoded_vertices: reader.u32()?,
                total_chunks: reader.u32()?,
                chunk_vertices: reader.u32()?,
                has_colors: reader.bool()?,
                has_normals: reader.bool()?,
                format: reader.string()?,
                comments: reader.strings()?,
                faces: reader.faces()?,
            }),
            KIND_CHUNK => Self::Chunk(TransferChunk {
                file_name: reader.string()?,
                chunk_index: reader.u32()?,
                total_chunks: reader.u32()?,
                positions: reader.f32s()?,
                colors: reader.opt_bytes()?,
                normals: reader.opt_f32s()?,
            }),
            KIND_COMPLETE => Self::ChunkComplete { file_name: reader.string()? },
            other => {
                return Err(Error::reassembly(format!("unknown wire message kind {other}")));
            }
        };
        Ok(message)
    }
}
