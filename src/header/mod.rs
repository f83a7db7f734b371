//! Self-describing geometry headers.
//!
//! A header is a block of text lines declaring an encoding, comments, and
//! an ordered list of elements, each with an ordered list of typed
//! properties. Parsing stops at the terminator keyword; the byte offset
//! just past it is where the data section begins.

mod layout;

pub use layout::{LayoutEntry, Slot, VertexLayout};

use crate::util::{Error, Result, ScalarType};

/// Leading keyword identifying the header family.
pub const MAGIC: &str = "ply";

/// Keyword terminating the header.
pub const END_HEADER: &str = "end_header";

/// First scan window for the terminator. Expanded once to
/// [`HEADER_SCAN_MAX`] before giving up, so header-scan cost is bounded
/// independent of file size.
pub const HEADER_SCAN: usize = 4 * 1024;

/// Expanded (and final) scan window.
pub const HEADER_SCAN_MAX: usize = 16 * 1024;

/// Declared encoding of the data section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HeaderEncoding {
    Ascii,
    #[default]
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl HeaderEncoding {
    /// Header token for this encoding.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::BinaryLittleEndian => "binary_little_endian",
            Self::BinaryBigEndian => "binary_big_endian",
        }
    }

    /// Parse the `format` line token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ascii" => Some(Self::Ascii),
            "binary_little_endian" => Some(Self::BinaryLittleEndian),
            "binary_big_endian" => Some(Self::BinaryBigEndian),
            _ => None,
        }
    }
}

/// One named, typed field within an element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyDecl {
    /// Fixed-width scalar property.
    Scalar { name: String, ty: ScalarType },
    /// Variable-length list property: a count value followed by that many
    /// items. Not part of the fixed per-record stride.
    List { name: String, count_ty: ScalarType, item_ty: ScalarType },
}

impl PropertyDecl {
    /// Property name regardless of shape.
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar { name, .. } | Self::List { name, .. } => name,
        }
    }
}

/// A named, counted group of records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementDecl {
    pub name: String,
    pub count: usize,
    pub properties: Vec<PropertyDecl>,
}

/// Parsed header. Immutable once built.
#[derive(Clone, Debug, Default)]
pub struct GeometryHeader {
    pub encoding: HeaderEncoding,
    pub version: String,
    pub comments: Vec<String>,
    pub elements: Vec<ElementDecl>,
}

impl GeometryHeader {
    /// The element receiving vertex semantics, if declared.
    pub fn vertex_element(&self) -> Option<&ElementDecl> {
        self.elements.iter().find(|e| e.name == "vertex")
    }

    /// The element receiving face semantics, if declared.
    pub fn face_element(&self) -> Option<&ElementDecl> {
        self.elements.iter().find(|e| e.name == "face")
    }

    /// Look up any element by name.
    pub fn element(&self, name: &str) -> Option<&ElementDecl> {
        self.elements.iter().find(|e| e.name == name)
    }
}

/// Find the byte offset just past the terminator line, scanning at most
/// `window` bytes. Returns (offset of terminator keyword, offset of data).
fn find_terminator(bytes: &[u8], window: usize) -> Option<(usize, usize)> {
    let scan = &bytes[..bytes.len().min(window)];
    let needle = END_HEADER.as_bytes();

    let mut line_start = 0;
    while line_start < scan.len() {
        let line_end = scan[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| line_start + p)
            .unwrap_or(scan.len());

        let line = &scan[line_start..line_end];
        let trimmed = trim_ascii(line);
        if trimmed == needle {
            // Data starts past the line ending. A terminator at EOF
            // without a newline still yields a valid (empty) data section.
            let mut data = line_end;
            if data < bytes.len() && bytes[data] == b'\n' {
                data += 1;
            }
            return Some((line_start, data));
        }
        line_start = line_end + 1;
    }
    None
}

fn trim_ascii(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(line.len());
    let end = line.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |p| p + 1);
    &line[start..end]
}

/// Parse a self-describing header.
///
/// Returns the header and the byte offset where the data section begins.
/// Scans a small prefix first, expanding once, so classification never
/// pays for the payload.
pub fn parse(bytes: &[u8]) -> Result<(GeometryHeader, usize)> {
    let (term_at, data_offset) = find_terminator(bytes, HEADER_SCAN)
        .or_else(|| find_terminator(bytes, HEADER_SCAN_MAX))
        .ok_or(Error::UnterminatedHeader { scanned: bytes.len().min(HEADER_SCAN_MAX) })?;

    // Header lines are ASCII by construction; decode lossily so a stray
    // high byte in a comment cannot abort the parse.
    let text = String::from_utf8_lossy(&bytes[..term_at]);
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    match lines.next().map(str::trim) {
        Some(MAGIC) => {}
        _ => return Err(Error::NotThisFormat("ply")),
    }

    let mut header = GeometryHeader::default();
    let mut open_element: Option<ElementDecl> = None;

    for line in lines {
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else { continue };

        match keyword {
            "format" => {
                let enc = tokens
                    .next()
                    .and_then(HeaderEncoding::from_token)
                    .ok_or_else(|| Error::malformed(format!("bad format line: {line:?}")))?;
                header.encoding = enc;
                header.version = tokens.next().unwrap_or("1.0").to_string();
            }
            "comment" | "obj_info" => {
                // Verbatim remainder, order preserved.
                let rest = line.splitn(2, char::is_whitespace).nth(1).unwrap_or("");
                header.comments.push(rest.trim_end().to_string());
            }
            "element" => {
                if let Some(done) = open_element.take() {
                    header.elements.push(done);
                }
                let name = tokens
                    .next()
                    .ok_or_else(|| Error::malformed("element line missing name"))?;
                let count: usize = tokens
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| Error::malformed(format!("bad element count: {line:?}")))?;
                open_element = Some(ElementDecl { name: name.to_string(), count, properties: Vec::new() });
            }
            "property" => {
                let element = open_element
                    .as_mut()
                    .ok_or_else(|| Error::malformed("property before any element"))?;
                let first = tokens
                    .next()
                    .ok_or_else(|| Error::malformed("property line missing type"))?;
                let decl = if first == "list" {
                    let count_ty = ScalarType::require(
                        tokens.next().ok_or_else(|| Error::malformed("list missing count type"))?,
                    )?;
                    let item_ty = ScalarType::require(
                        tokens.next().ok_or_else(|| Error::malformed("list missing item type"))?,
                    )?;
                    let name = tokens
                        .next()
                        .ok_or_else(|| Error::malformed("list missing name"))?;
                    PropertyDecl::List { name: name.to_string(), count_ty, item_ty }
                } else {
                    let ty = ScalarType::require(first)?;
                    let name = tokens
                        .next()
                        .ok_or_else(|| Error::malformed("property line missing name"))?;
                    PropertyDecl::Scalar { name: name.to_string(), ty }
                };
                element.properties.push(decl);
            }
            // Unknown keywords are preserved as comments rather than
            // aborting; real files in the wild carry vendor extensions.
            _ => header.comments.push(line.trim_end().to_string()),
        }
    }

    if let Some(done) = open_element.take() {
        header.elements.push(done);
    }

    Ok((header, data_offset))
}
