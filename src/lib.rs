//! # meshport
//!
//! Decoder for 3D geometry and depth-image file formats with a chunked
//! cross-process transfer protocol.
//!
//! Raw bytes are classified, parsed against a self-describing or fixed
//! schema, and decoded in one pass into columnar buffers. The packager
//! then ships a dataset to a size-constrained presentation process as one
//! zero-copy message, falling back to an ordered chunk sequence the
//! consumer reassembles losslessly.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (scalar table, errors, event sink)
//! - [`sniff`] - Format classification from magic bytes / leading text
//! - [`header`] - Self-describing header parsing and layout planning
//! - [`decode`] - Binary and ASCII record decoders
//! - [`geom`] - Columnar datasets and depth images
//! - [`formats`] - Per-format adapters and the decode entry points
//! - [`transfer`] - Wire messages, transports, packager, reassembler
//! - [`settings`] - Persisted user defaults
//!
//! ## Example
//!
//! ```ignore
//! use meshport::prelude::*;
//!
//! let decoded = meshport::formats::decode_file("scan.ply", &NullSink)?;
//! if let Some(dataset) = decoded.as_geometry() {
//!     println!("{} vertices", dataset.decoded_vertices);
//! }
//! ```

pub mod decode;
pub mod formats;
pub mod geom;
pub mod header;
pub mod settings;
pub mod sniff;
pub mod transfer;
pub mod util;

// Re-export commonly used types
pub use formats::{decode_batch, decode_bytes, decode_file, Decoded};
pub use geom::{DepthImage, FaceRecord, GeometryDataset};
pub use sniff::{sniff, Detection, FormatTag};
pub use util::{Error, Result, ScalarType};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::formats::{decode_bytes, decode_file, Decoded};
    pub use crate::geom::{DepthImage, GeometryDataset};
    pub use crate::header::{GeometryHeader, VertexLayout};
    pub use crate::sniff::{sniff, FormatTag};
    pub use crate::transfer::{
        send_dataset, ChannelTransport, ReassemblyRegistry, Transport, WireMessage,
    };
    pub use crate::util::{Error, EventSink, NullSink, Result, ScalarType, TracingSink};
}
