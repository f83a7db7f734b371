//! Binary record decoding.
//!
//! Decodes every record directly into pre-allocated columnar buffers
//! using per-type byte reads. One pass does both byte decoding and slot
//! routing; there is no intermediate per-record object.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use smallvec::SmallVec;

use crate::geom::GeometryDataset;
use crate::header::VertexLayout;
use crate::util::{Error, RecordKind, Result, ScalarType};

use super::{store_component, Endianness, FaceListDecl};

/// Read one scalar at the start of `bytes` as f64. Caller guarantees
/// `bytes.len() >= ty.num_bytes()`.
#[inline]
fn read_scalar<B: ByteOrder>(bytes: &[u8], ty: ScalarType) -> f64 {
    match ty {
        ScalarType::Int8 => bytes[0] as i8 as f64,
        ScalarType::Uint8 => bytes[0] as f64,
        ScalarType::Int16 => B::read_i16(bytes) as f64,
        ScalarType::Uint16 => B::read_u16(bytes) as f64,
        ScalarType::Int32 => B::read_i32(bytes) as f64,
        ScalarType::Uint32 => B::read_u32(bytes) as f64,
        ScalarType::Float32 => B::read_f32(bytes) as f64,
        ScalarType::Float64 => B::read_f64(bytes),
    }
}

fn decode_vertices<B: ByteOrder>(
    bytes: &[u8],
    layout: &VertexLayout,
    vertex_count: usize,
    dataset: &mut GeometryDataset,
) -> Result<usize> {
    let stride = layout.stride;

    for record in 0..vertex_count {
        let start = record * stride;
        let Some(rec) = bytes.get(start..start + stride) else {
            return Err(Error::TruncatedData { at_record: record, kind: RecordKind::Vertex });
        };
        for entry in &layout.entries {
            let value = read_scalar::<B>(&rec[entry.offset..], entry.ty);
            store_component(dataset, record, entry, value);
        }
    }

    dataset.decoded_vertices = vertex_count;
    Ok(vertex_count * stride)
}

fn decode_faces<B: ByteOrder>(
    bytes: &[u8],
    faces: &FaceListDecl,
    dataset: &mut GeometryDataset,
) -> Result<usize> {
    let count_width = faces.count_ty.num_bytes();
    let item_width = faces.item_ty.num_bytes();
    let mut cursor = 0usize;

    for record in 0..faces.count {
        let count_bytes = bytes
            .get(cursor..cursor + count_width)
            .ok_or(Error::TruncatedData { at_record: record, kind: RecordKind::Face })?;
        let vertex_count = read_scalar::<B>(count_bytes, faces.count_ty).max(0.0) as usize;
        cursor += count_width;

        let mut indices: SmallVec<[u32; 4]> = SmallVec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            let item_bytes = bytes
                .get(cursor..cursor + item_width)
                .ok_or(Error::TruncatedData { at_record: record, kind: RecordKind::Face })?;
            indices.push(read_scalar::<B>(item_bytes, faces.item_ty).max(0.0) as u32);
            cursor += item_width;
        }
        dataset.faces.push(indices);
    }

    Ok(cursor)
}

/// Decode a binary data section into `dataset`.
///
/// `bytes` starts at the data offset. Vertices first, then face records.
/// Returns the number of bytes consumed. Fails fast on truncation; a
/// failed decode leaves the caller to drop the dataset, so no partially
/// written row ever flows downstream.
pub fn decode_payload(
    bytes: &[u8],
    layout: &VertexLayout,
    vertex_count: usize,
    faces: Option<&FaceListDecl>,
    endianness: Endianness,
    dataset: &mut GeometryDataset,
) -> Result<usize> {
    let vertex_bytes = match endianness {
        Endianness::Little => decode_vertices::<LittleEndian>(bytes, layout, vertex_count, dataset)?,
        Endianness::Big => decode_vertices::<BigEndian>(bytes, layout, vertex_count, dataset)?,
    };

    let mut consumed = vertex_bytes;
    if let Some(face_decl) = faces {
        let rest = &bytes[consumed..];
        consumed += match endianness {
            Endianness::Little => decode_faces::<LittleEndian>(rest, face_decl, dataset)?,
            Endianness::Big => decode_faces::<BigEndian>(rest, face_decl, dataset)?,
        };
    }

    Ok(consumed)
}
