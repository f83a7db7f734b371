//! Transfer packaging.
//!
//! Per dataset the machine is `AttemptDirect → {Done | Chunk → Done}`:
//! one zero-copy message when the transport takes it, otherwise a
//! `start / chunk… / complete` sequence slicing only the per-vertex
//! buffers. Fallback is driven by the transport's typed rejection, not a
//! caught exception.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::geom::GeometryDataset;
use crate::util::{Event, EventSink, Result};

use super::message::{ChunkStart, TransferChunk, WireMessage};
use super::transport::{SendError, Transport};

/// Vertices per chunk. Large enough to bound the message count for any
/// realistic dataset while keeping each chunk well under the transport
/// ceiling; a tuning constant, not a correctness requirement (the
/// reassembler reads the actual slicing from the start message).
pub const CHUNK_VERTICES: usize = 1_048_576;

/// How a dataset crossed the boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    /// One zero-copy message.
    Direct,
    /// Start + `chunks` chunk messages + complete.
    Chunked { chunks: u32 },
    /// The consuming view went away mid-stream; the remainder was
    /// dropped without error.
    Cancelled,
}

fn slice_chunk(dataset: &GeometryDataset, index: usize, chunk_vertices: usize) -> TransferChunk {
    let start = index * chunk_vertices;
    let end = (start + chunk_vertices).min(dataset.vertex_count);
    let total_chunks = dataset.vertex_count.div_ceil(chunk_vertices) as u32;

    TransferChunk {
        file_name: dataset.file_name.clone(),
        chunk_index: index as u32,
        total_chunks,
        positions: dataset.positions[start * 3..end * 3].to_vec(),
        colors: dataset
            .colors
            .as_ref()
            .map(|c| c[start * 3..end * 3].to_vec()),
        normals: dataset
            .normals
            .as_ref()
            .map(|n| n[start * 3..end * 3].to_vec()),
    }
}

/// Ship a dataset with a caller-chosen chunk size.
///
/// Ownership of the dataset moves in; on the direct path the buffers
/// reach the transport without a copy. The `alive` flag is checked
/// before every chunk send so a disposed consumer stops the loop without
/// error; a send never yields mid-chunk.
pub fn send_dataset_with(
    dataset: GeometryDataset,
    transport: &mut dyn Transport,
    alive: &AtomicBool,
    sink: &dyn EventSink,
    chunk_vertices: usize,
) -> Result<TransferOutcome> {
    let file_name = dataset.file_name.clone();

    if !alive.load(Ordering::Acquire) {
        return Ok(TransferOutcome::Cancelled);
    }

    // AttemptDirect.
    let dataset = match transport.send(WireMessage::Direct(dataset)) {
        Ok(()) => {
            sink.emit(Event::TransferComplete { file_name, chunked: false });
            return Ok(TransferOutcome::Direct);
        }
        Err(SendError::Rejected { message, size, .. }) => {
            sink.emit(Event::TransferFallback {
                file_name: file_name.clone(),
                payload_bytes: size,
            });
            let WireMessage::Direct(dataset) = message else {
                unreachable!("direct send rejected a different message");
            };
            dataset
        }
        Err(err @ SendError::Closed) => return Err(err.into()),
    };

    // Chunk.
    let total_chunks = dataset.vertex_count.div_ceil(chunk_vertices) as u32;
    let start = ChunkStart {
        file_name: dataset.file_name.clone(),
        total_vertices: dataset.vertex_count as u32,
        decoded_vertices: dataset.decoded_vertices as u32,
        total_chunks,
        chunk_vertices: chunk_vertices as u32,
        has_colors: dataset.has_colors(),
        has_normals: dataset.has_normals(),
        format: dataset
            .source_format
            .map_or(String::new(), |f| f.as_str().to_string()),
        comments: dataset.comments.clone(),
        // Faces ship once; they are small next to the vertex buffers.
        faces: dataset.faces.clone(),
    };
    transport
        .send(WireMessage::ChunkStart(start))
        .map_err(crate::util::Error::from)?;

    for index in 0..total_chunks as usize {
        if !alive.load(Ordering::Acquire) {
            return Ok(TransferOutcome::Cancelled);
        }
        let chunk = slice_chunk(&dataset, index, chunk_vertices);
        transport
            .send(WireMessage::Chunk(chunk))
            .map_err(crate::util::Error::from)?;
        sink.emit(Event::ChunkSent {
            file_name: file_name.clone(),
            index: index as u32,
            total: total_chunks,
        });
    }

    if !alive.load(Ordering::Acquire) {
        return Ok(TransferOutcome::Cancelled);
    }
    transport
        .send(WireMessage::ChunkComplete { file_name: file_name.clone() })
        .map_err(crate::util::Error::from)?;

    sink.emit(Event::TransferComplete { file_name, chunked: true });
    Ok(TransferOutcome::Chunked { chunks: total_chunks })
}

/// [`send_dataset_with`] at the default [`CHUNK_VERTICES`].
pub fn send_dataset(
    dataset: GeometryDataset,
    transport: &mut dyn Transport,
    alive: &AtomicBool,
    sink: &dyn EventSink,
) -> Result<TransferOutcome> {
    send_dataset_with(dataset, transport, alive, sink, CHUNK_VERTICES)
}
