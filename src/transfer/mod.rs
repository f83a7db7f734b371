//! Cross-process geometry transfer.
//!
//! A decoded dataset leaves the host process either as one zero-copy
//! message or, when the transport rejects the size, as an ordered
//! sequence of bounded chunks the consumer reassembles losslessly:
//!
//! - [`message`] - the wire message kinds and their binary framing
//! - [`transport`] - the capability the packager sends through
//! - [`packager`] - producer-side direct-or-chunk state machine
//! - [`reassembler`] - consumer-side accumulation and completeness
//!   accounting

pub mod message;
pub mod packager;
pub mod reassembler;
pub mod transport;

pub use message::{ChunkStart, TransferChunk, WireMessage};
pub use packager::{send_dataset, send_dataset_with, TransferOutcome, CHUNK_VERTICES};
pub use reassembler::{Reassembler, ReassemblyRegistry};
pub use transport::{
    read_frame, ChannelTransport, FramedTransport, SendError, Transport, DEFAULT_MESSAGE_CEILING,
};
