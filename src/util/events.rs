//! Structured progress events.
//!
//! Decoders and the transfer layer report through an [`EventSink`] passed
//! by reference instead of logging directly, so they stay pure and can be
//! tested without a logging double. [`TracingSink`] bridges events to the
//! `tracing` subscriber for production use.

use parking_lot::Mutex;

/// One observable step of a decode or transfer.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Sniffer settled on a format for a buffer.
    FormatDetected { file_name: String, format: &'static str },
    /// Header parsed; counts are the declared ones.
    HeaderParsed { file_name: String, vertices: usize, faces: usize },
    /// A decode finished. `decoded_vertices` may be below the declared
    /// count for short ASCII data.
    DecodeFinished { file_name: String, decoded_vertices: usize, faces: usize },
    /// Direct transfer was rejected and the packager fell back to chunks.
    TransferFallback { file_name: String, payload_bytes: usize },
    /// One chunk left the packager.
    ChunkSent { file_name: String, index: u32, total: u32 },
    /// The whole dataset crossed the boundary.
    TransferComplete { file_name: String, chunked: bool },
}

/// Capability for receiving [`Event`]s.
pub trait EventSink: Sync {
    fn emit(&self, event: Event);
}

/// Sink that drops everything. The default for callers that do not care.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// Sink that forwards events to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: Event) {
        match event {
            Event::FormatDetected { file_name, format } => {
                tracing::debug!(file = %file_name, format, "format detected");
            }
            Event::HeaderParsed { file_name, vertices, faces } => {
                tracing::debug!(file = %file_name, vertices, faces, "header parsed");
            }
            Event::DecodeFinished { file_name, decoded_vertices, faces } => {
                tracing::info!(file = %file_name, decoded_vertices, faces, "decode finished");
            }
            Event::TransferFallback { file_name, payload_bytes } => {
                tracing::debug!(file = %file_name, payload_bytes, "direct transfer rejected, chunking");
            }
            Event::ChunkSent { file_name, index, total } => {
                tracing::trace!(file = %file_name, index, total, "chunk sent");
            }
            Event::TransferComplete { file_name, chunked } => {
                tracing::info!(file = %file_name, chunked, "transfer complete");
            }
        }
    }
}

/// Sink that records events for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything recorded so far.
    pub fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut self.events.lock())
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.emit(Event::FormatDetected { file_name: "a.ply".into(), format: "ply" });
        sink.emit(Event::TransferComplete { file_name: "a.ply".into(), chunked: false });

        let events = sink.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::FormatDetected { .. }));
        assert!(sink.drain().is_empty());
    }
}
