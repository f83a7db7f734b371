//! Error types for the meshport library.

use thiserror::Error;

/// Which record population a decoder was walking when it failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    Vertex,
    Face,
    /// A depth-image sample row.
    Sample,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vertex => write!(f, "vertex"),
            Self::Face => write!(f, "face"),
            Self::Sample => write!(f, "sample"),
        }
    }
}

/// Main error type for meshport operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Buffer does not start with the magic/keyword of the attempted format.
    /// Recoverable: the caller may try the next adapter.
    #[error("Not a {0} file")]
    NotThisFormat(&'static str),

    /// No adapter recognized the buffer.
    #[error("Unrecognized format: {0}")]
    UnrecognizedFormat(String),

    /// Header terminator keyword never appeared within the scan window.
    #[error("Malformed header: missing terminator after scanning {scanned} bytes")]
    UnterminatedHeader { scanned: usize },

    /// Header present but a declaration line is broken.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// Binary cursor would read past the end of the buffer.
    #[error("Truncated data: buffer ended at {kind} record {at_record}")]
    TruncatedData { at_record: usize, kind: RecordKind },

    /// Unknown scalar/list-item type token.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Transport rejected a message for size. Recovered locally by
    /// chunking; never surfaced to the user.
    #[error("Transfer rejected: {size} bytes exceeds transport limit of {limit}")]
    TransferRejected { size: usize, limit: usize },

    /// Transport consumer is gone.
    #[error("Transport closed")]
    TransportClosed,

    /// Chunk stream incomplete or out of declared range.
    #[error("Reassembly failed: {0}")]
    Reassembly(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl Error {
    /// Create a malformed-header error from a message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedHeader(msg.into())
    }

    /// Create a reassembly error from a message.
    pub fn reassembly(msg: impl Into<String>) -> Self {
        Self::Reassembly(msg.into())
    }

    /// True for errors a caller recovers from by trying another adapter.
    pub fn is_not_this_format(&self) -> bool {
        matches!(self, Self::NotThisFormat(_) | Self::UnrecognizedFormat(_))
    }
}

/// Result type alias for meshport operations.
pub type Result<T> = std::result::Result<T, Error>;
