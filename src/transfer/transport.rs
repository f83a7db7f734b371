//! Transport capability.
//!
//! The packager talks to the presentation process through this trait;
//! rejection is a typed outcome handing the message back, never a caught
//! exception. [`ChannelTransport`] is the built-in in-process
//! implementation (and the test double); [`FramedTransport`] writes
//! encoded frames to any byte sink for a real process boundary.

use std::io::{Read, Write};
use std::sync::mpsc::{channel, Receiver, Sender};

use byteorder::{ByteOrder, LittleEndian};

use crate::util::{Error, Result};

use super::message::WireMessage;

/// Default per-message ceiling. Real host transports reject somewhere in
/// the tens-to-hundreds of megabytes; this stays safely below that.
pub const DEFAULT_MESSAGE_CEILING: usize = 64 * 1024 * 1024;

/// Why a send did not go through.
#[derive(Debug)]
pub enum SendError {
    /// Message too large for this transport. The message comes back so
    /// the caller can repackage it; this is the chunking trigger.
    Rejected {
        message: WireMessage,
        size: usize,
        limit: usize,
    },
    /// Consumer is gone.
    Closed,
}

impl From<SendError> for Error {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Rejected { size, limit, .. } => Error::TransferRejected { size, limit },
            SendError::Closed => Error::TransportClosed,
        }
    }
}

/// One-way message channel to the presentation process.
pub trait Transport {
    fn send(&mut self, message: WireMessage) -> std::result::Result<(), SendError>;
}

/// In-process transport over an mpsc channel with a byte ceiling.
/// Ownership of the buffers moves through the channel untouched; this is
/// the zero-copy path.
pub struct ChannelTransport {
    tx: Sender<WireMessage>,
    max_message_bytes: usize,
}

impl ChannelTransport {
    pub fn new(tx: Sender<WireMessage>, max_message_bytes: usize) -> Self {
        Self { tx, max_message_bytes }
    }

    /// Build a connected transport/receiver pair.
    pub fn pair(max_message_bytes: usize) -> (Self, Receiver<WireMessage>) {
        let (tx, rx) = channel();
        (Self::new(tx, max_message_bytes), rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, message: WireMessage) -> std::result::Result<(), SendError> {
        let size = message.payload_bytes();
        if size > self.max_message_bytes {
            return Err(SendError::Rejected { message, size, limit: self.max_message_bytes });
        }
        self.tx.send(message).map_err(|_| SendError::Closed)
    }
}

/// Byte-stream transport: each message goes out as a little-endian u32
/// frame length followed by the encoded frame.
pub struct FramedTransport<W: Write> {
    writer: W,
    max_message_bytes: usize,
}

impl<W: Write> FramedTransport<W> {
    pub fn new(writer: W, max_message_bytes: usize) -> Self {
        Self { writer, max_message_bytes }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Transport for FramedTransport<W> {
    fn send(&mut self, message: WireMessage) -> std::result::Result<(), SendError> {
        let size = message.payload_bytes();
        if size > self.max_message_bytes {
            return Err(SendError::Rejected { message, size, limit: self.max_message_bytes });
        }
        let frame = message.encode();
        let mut prefix = [0u8; 4];
        LittleEndian::write_u32(&mut prefix, frame.len() as u32);
        self.writer
            .write_all(&prefix)
            .and_then(|_| self.writer.write_all(&frame))
            .map_err(|_| SendError::Closed)
    }
}

/// Read the next length-prefixed frame from a byte stream. `Ok(None)` at
/// a clean end of stream.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<WireMessage>> {
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = LittleEndian::read_u32(&prefix) as usize;
    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame)?;
    WireMessage::decode(&frame).map(Some)
}
