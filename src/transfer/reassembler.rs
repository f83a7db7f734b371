//! Consumer-side chunk reassembly.
//!
//! A [`Reassembler`] accumulates one file's chunk stream into a complete
//! dataset independent of arrival cadence: chunks land by index, so
//! delivery may be out of order and duplicates are harmless. A dropped
//! `complete` message is detectable through [`Reassembler::missing_chunks`]
//! rather than silently rendering a zero-padded partial.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::geom::GeometryDataset;
use crate::sniff::FormatTag;
use crate::util::{Error, Result};

use super::message::{ChunkStart, TransferChunk, WireMessage};

/// Accumulates one chunked transfer.
#[derive(Debug)]
pub struct Reassembler {
    file_name: String,
    total_chunks: u32,
    chunk_vertices: usize,
    received: Vec<bool>,
    received_count: u32,
    dataset: GeometryDataset,
}

impl Reassembler {
    /// Size buffers from the start message's declared totals.
    pub fn new(start: ChunkStart) -> Self {
        let total_vertices = start.total_vertices as usize;
        let mut dataset = GeometryDataset::allocate(
            start.file_name.clone(),
            FormatTag::from_tag(&start.format).unwrap_or(FormatTag::Ply),
            total_vertices,
            start.faces.len(),
            start.has_colors,
            start.has_normals,
        );
        dataset.source_format = FormatTag::from_tag(&start.format);
        dataset.decoded_vertices = start.decoded_vertices as usize;
        dataset.comments = start.comments;
        dataset.faces = start.faces;

        Self {
            file_name: start.file_name,
            total_chunks: start.total_chunks,
            chunk_vertices: start.chunk_vertices as usize,
            received: vec![false; start.total_chunks as usize],
            received_count: 0,
            dataset,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Copy one chunk's slices into their offset range. Idempotent under
    /// duplicate delivery and indifferent to arrival order.
    pub fn accept(&mut self, chunk: TransferChunk) -> Result<()> {
        if chunk.file_name != self.file_name {
            return Err(Error::reassembly(format!(
                "chunk for {:?} fed to reassembler for {:?}",
                chunk.file_name, self.file_name
            )));
        }
        let index = chunk.chunk_index as usize;
        if index >= self.received.len() {
            return Err(Error::reassembly(format!(
                "chunk index {} out of declared range {}",
                chunk.chunk_index, self.total_chunks
            )));
        }
        if self.received[index] {
            return Ok(());
        }

        let offset = index * self.chunk_vertices * 3;
        let end = offset + chunk.positions.len();
        if end > self.dataset.positions.len() {
            return Err(Error::reassembly(format!(
                "chunk {} overruns vertex buffer ({} > {})",
                index,
                end,
                self.dataset.positions.len()
            )));
        }
        self.dataset.positions[offset..end].copy_from_slice(&chunk.positions);

        if let (Some(colors), Some(slice)) = (self.dataset.colors.as_mut(), chunk.colors.as_ref()) {
            if offset + slice.len() > colors.len() {
                return Err(Error::reassembly(format!("chunk {index} overruns color buffer")));
            }
            colors[offset..offset + slice.len()].copy_from_slice(slice);
        }
        if let (Some(normals), Some(slice)) = (self.dataset.normals.as_mut(), chunk.normals.as_ref())
        {
            if offset + slice.len() > normals.len() {
                return Err(Error::reassembly(format!("chunk {index} overruns normal buffer")));
            }
            normals[offset..offset + slice.len()].copy_from_slice(slice);
        }

        self.received[index] = true;
        self.received_count += 1;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.received_count == self.total_chunks
    }

    /// Chunks still outstanding; nonzero after `complete` means the
    /// stream was lossy and the dataset must not be rendered.
    pub fn missing_chunks(&self) -> u32 {
        self.total_chunks - self.received_count
    }

    /// Hand out the finished dataset.
    pub fn finish(self) -> Result<GeometryDataset> {
        if !self.is_complete() {
            return Err(Error::reassembly(format!(
                "{}: {} of {} chunks missing",
                self.file_name,
                self.missing_chunks(),
                self.total_chunks
            )));
        }
        Ok(self.dataset)
    }
}

/// Consumer-side dispatcher over a raw message stream, keyed by file
/// name. Guarded because message delivery and dataset pickup may
/// interleave from different call sites.
#[derive(Default)]
pub struct ReassemblyRegistry {
    in_flight: Mutex<HashMap<String, Reassembler>>,
}

impl ReassemblyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one message. Returns a dataset when one finishes: a direct
    /// transfer immediately, a chunked one at its `complete` message.
    pub fn handle(&self, message: WireMessage) -> Result<Option<GeometryDataset>> {
        match message {
            WireMessage::Direct(dataset) => Ok(Some(dataset)),
            WireMessage::ChunkStart(start) => {
                let mut in_flight = self.in_flight.lock();
                // A restarted transfer for the same file supersedes the
                // stale one.
                in_flight.insert(start.file_name.clone(), Reassembler::new(start));
                Ok(None)
            }
            WireMessage::Chunk(chunk) => {
                let mut in_flight = self.in_flight.lock();
                let reassembler = in_flight.get_mut(&chunk.file_name).ok_or_else(|| {
                    Error::reassembly(format!("chunk for unknown transfer {:?}", chunk.file_name))
                })?;
                reassembler.accept(chunk)?;
                Ok(None)
            }
            WireMessage::ChunkComplete { file_name } => {
                let reassembler = self
                    .in_flight
                    .lock()
                    .remove(&file_name)
                    .ok_or_else(|| {
                        Error::reassembly(format!("complete for unknown transfer {file_name:?}"))
                    })?;
                reassembler.finish().map(Some)
            }
        }
    }

    /// Transfers started but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Drop a transfer whose view went away.
    pub fn abandon(&self, file_name: &str) -> bool {
        self.in_flight.lock().remove(file_name).is_some()
    }
}
